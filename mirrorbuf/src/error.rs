use thiserror::Error;

#[derive(Error, Debug)]
pub enum RingBufError {
    #[error("buffer capacity must be greater than zero")]
    ZeroCapacity,

    #[error("capacity of {0} bytes cannot be rounded and mapped twice")]
    CapacityTooLarge(usize),

    #[error("failed to {stage}: {source}")]
    AllocationFailed {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to release ring buffer mapping: {0}")]
    ReleaseFailed(#[source] std::io::Error),

    #[error("no terminator {terminator:#04x} within {window} readable bytes")]
    IncompleteRecord { terminator: u8, window: usize },
}

impl RingBufError {
    pub(crate) fn allocation(stage: &'static str, errno: nix::errno::Errno) -> Self {
        RingBufError::AllocationFailed {
            stage,
            source: errno.into(),
        }
    }

    /// True for the one error a caller is expected to retry after.
    pub fn is_incomplete_record(&self) -> bool {
        matches!(self, RingBufError::IncompleteRecord { .. })
    }
}
