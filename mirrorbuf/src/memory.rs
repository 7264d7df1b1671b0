//! The doubled mapping: one backing object mapped twice, back to back.

use crate::RingBufError;
use core::ptr::NonNull;
use nix::sys::memfd::{memfd_create, MFdFlags};
use nix::sys::mman::{mmap, mmap_anonymous, munmap, MapFlags, ProtFlags};
use nix::unistd::ftruncate;
use serde::{Deserialize, Serialize};
use std::ffi::c_void;
use std::num::NonZero;
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use tracing::warn;

/// Where the pages behind a ring buffer come from.
///
/// Neither variant leaves anything visible in the filesystem: the temporary
/// file is unlinked as soon as it is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backing {
    /// Anonymous `memfd_create` object.
    #[default]
    Memfd,
    /// Unlinked temporary file created in `dir` (e.g. `/dev/shm` or `/tmp`).
    TempFile { dir: PathBuf },
}

impl Backing {
    fn create(&self) -> Result<OwnedFd, RingBufError> {
        match self {
            Backing::Memfd => memfd_create(c"mirrorbuf", MFdFlags::MFD_CLOEXEC)
                .map_err(|errno| RingBufError::allocation("create backing memfd", errno)),
            Backing::TempFile { dir } => tempfile::tempfile_in(dir)
                .map(OwnedFd::from)
                .map_err(|source| RingBufError::AllocationFailed {
                    stage: "create backing file",
                    source,
                }),
        }
    }
}

pub(crate) struct Memory {
    ptr: NonNull<u8>,
    size: usize,
    fd: OwnedFd,
    mapped: bool,
}

impl Memory {
    /// Maps `size` bytes of fresh backing storage twice into one reserved
    /// range of `2 * size` bytes.
    ///
    /// `size` must already be a non-zero multiple of the page size. Any
    /// partial reservation is unmapped before an error is returned, and the
    /// backing descriptor is closed on every error path.
    pub(crate) fn new(size: usize, backing: &Backing) -> Result<Self, RingBufError> {
        let len = NonZero::new(size).ok_or(RingBufError::ZeroCapacity)?;
        let total = size
            .checked_mul(2)
            .and_then(NonZero::new)
            .ok_or(RingBufError::CapacityTooLarge(size))?;
        let file_len =
            libc::off_t::try_from(size).map_err(|_| RingBufError::CapacityTooLarge(size))?;

        let fd = backing.create()?;
        ftruncate(&fd, file_len)
            .map_err(|errno| RingBufError::allocation("size backing store", errno))?;

        let reservation = unsafe {
            mmap_anonymous(
                None,
                total,
                ProtFlags::PROT_NONE,
                MapFlags::MAP_PRIVATE | MapFlags::MAP_ANONYMOUS,
            )
            .map_err(|errno| RingBufError::allocation("reserve address space", errno))?
        };

        if let Err(err) = unsafe { map_halves(reservation, len, &fd) } {
            if let Err(errno) = unsafe { munmap(reservation, total.get()) } {
                warn!(error = %errno, size, "failed to unmap reservation after failed open");
            }
            return Err(err);
        }

        Ok(Memory {
            ptr: reservation.cast(),
            size,
            fd,
            mapped: true,
        })
    }

    #[cfg(test)]
    pub(crate) fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    #[cfg(test)]
    pub(crate) fn fd(&self) -> std::os::fd::BorrowedFd<'_> {
        use std::os::fd::AsFd;
        self.fd.as_fd()
    }

    /// Contiguous view of `len` bytes starting at `offset` in the doubled range.
    pub(crate) fn slice(&self, offset: usize, len: usize) -> &[u8] {
        assert!(offset <= self.size && len <= self.size);
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().add(offset), len) }
    }

    pub(crate) fn slice_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        assert!(offset <= self.size && len <= self.size);
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr().add(offset), len) }
    }

    /// Discards the contents and unmaps both halves. Later calls are no-ops.
    pub(crate) fn release(&mut self) -> Result<(), RingBufError> {
        if !self.mapped {
            return Ok(());
        }
        self.mapped = false;

        // Nothing needs to survive, so drop the pages before unmapping.
        if let Err(errno) = ftruncate(&self.fd, 0) {
            warn!(error = %errno, size = self.size, "failed to truncate ring buffer backing");
        }
        unsafe { munmap(self.ptr.cast(), self.size * 2) }
            .map_err(|errno| RingBufError::ReleaseFailed(errno.into()))
    }
}

/// # Safety
///
/// `base` must be the start of a live reservation of at least `2 * len` bytes
/// and `fd` must be at least `len` bytes long.
unsafe fn map_halves(
    base: NonNull<c_void>,
    len: NonZero<usize>,
    fd: &OwnedFd,
) -> Result<(), RingBufError> {
    for (offset, stage) in [(0, "map first half"), (len.get(), "map second half")] {
        let addr = NonZero::new(base.as_ptr() as usize + offset);
        mmap(
            addr,
            len,
            ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
            MapFlags::MAP_SHARED | MapFlags::MAP_FIXED,
            fd,
            0,
        )
        .map_err(|errno| RingBufError::allocation(stage, errno))?;
    }
    Ok(())
}

impl Drop for Memory {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(error = %err, size = self.size, "ring buffer release failed on drop");
        }
    }
}

unsafe impl Send for Memory {}
unsafe impl Sync for Memory {}
