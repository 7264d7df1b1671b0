//! Read framing for the three buffer modes.

use crate::RingBufError;
use serde::{Deserialize, Serialize};

/// Selects how [`RingBuffer::read`](crate::RingBuffer::read) cuts the byte
/// stream into results. Writes are never checked against the mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Raw bytes, no framing.
    #[default]
    Byte,
    /// NUL-terminated strings. Writes append the NUL.
    String,
    /// Records ending in the buffer's terminator byte.
    Stream,
}

/// Outcome of framing one read: how many bytes leave the buffer and how many
/// the caller is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Framed {
    pub(crate) consumed: usize,
    pub(crate) returned: usize,
}

impl Framed {
    fn whole(len: usize) -> Self {
        Framed {
            consumed: len,
            returned: len,
        }
    }
}

impl Mode {
    /// Capacity a write of `len` bytes needs in this mode.
    pub(crate) fn write_len(self, len: usize) -> usize {
        match self {
            Mode::String => len.saturating_add(1),
            Mode::Byte | Mode::Stream => len,
        }
    }

    /// Copies the framed prefix of `window` into `out`.
    ///
    /// `window` is the readable data already clipped to `out.len()`.
    pub(crate) fn frame(
        self,
        window: &[u8],
        out: &mut [u8],
        terminator: u8,
    ) -> Result<Framed, RingBufError> {
        debug_assert!(window.len() <= out.len());

        match self {
            Mode::Byte => {
                out[..window.len()].copy_from_slice(window);
                Ok(Framed::whole(window.len()))
            }
            Mode::String => {
                if window.is_empty() {
                    return Ok(Framed::whole(0));
                }
                match window.iter().position(|&b| b == 0) {
                    Some(nul) => {
                        out[..=nul].copy_from_slice(&window[..=nul]);
                        Ok(Framed::whole(nul + 1))
                    }
                    None => {
                        let len = window.len();
                        out[..len].copy_from_slice(window);
                        out[len - 1] = 0;
                        Ok(Framed::whole(len))
                    }
                }
            }
            Mode::Stream => match window.iter().position(|&b| b == terminator) {
                Some(end) => {
                    out[..end].copy_from_slice(&window[..end]);
                    out[end] = 0;
                    Ok(Framed {
                        consumed: end + 1,
                        returned: end,
                    })
                }
                None => Err(RingBufError::IncompleteRecord {
                    terminator,
                    window: window.len(),
                }),
            },
        }
    }
}
