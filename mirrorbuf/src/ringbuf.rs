use crate::{
    common::{page_size, round_to_pages, unlikely},
    memory::{Backing, Memory},
    mode::Mode,
    RingBufError,
};
use std::fmt;
use tracing::{debug, trace};

/// Default record terminator for [`Mode::Stream`].
pub const DEFAULT_TERMINATOR: u8 = b'\n';

/// Fixed-capacity byte ring over a doubled mapping.
///
/// Both cursors are unbounded `u64` counters. The byte at offset `x` of the
/// mapping and the byte at `x + capacity` are the same physical byte, so any
/// access of up to `capacity` bytes starting below `capacity` is a single
/// contiguous copy.
///
/// The buffer does no locking of its own. Every mutating call takes
/// `&mut self`; sharing one buffer between a producer and a consumer thread
/// needs external synchronization such as a `Mutex`.
pub struct RingBuffer {
    memory: Memory,
    mode: Mode,
    terminator: u8,
    write_count: u64,
    read_count: u64,
}

impl RingBuffer {
    /// Opens a buffer backed by an anonymous memfd.
    ///
    /// `requested` is rounded up to a multiple of the page size; the actual
    /// capacity is available from [`capacity`](Self::capacity).
    pub fn open(requested: usize, mode: Mode) -> Result<Self, RingBufError> {
        Self::open_with(requested, mode, &Backing::default())
    }

    /// Opens a buffer whose pages come from `backing`.
    pub fn open_with(
        requested: usize,
        mode: Mode,
        backing: &Backing,
    ) -> Result<Self, RingBufError> {
        let capacity = round_to_pages(requested, page_size())?;
        let memory = Memory::new(capacity, backing)?;

        debug!(
            requested = requested,
            capacity = capacity,
            ?mode,
            ?backing,
            "ring buffer opened"
        );

        Ok(RingBuffer {
            memory,
            mode,
            terminator: DEFAULT_TERMINATOR,
            write_count: 0,
            read_count: 0,
        })
    }

    /// Unmaps the buffer and releases its backing store.
    ///
    /// A failure here is worth reporting but not acting on: whatever could be
    /// released has been.
    pub fn close(mut self) -> Result<(), RingBufError> {
        debug!(
            capacity = self.capacity(),
            write_count = self.write_count,
            read_count = self.read_count,
            "ring buffer closing"
        );
        self.memory.release()
    }

    pub fn capacity(&self) -> usize {
        self.memory.size()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn terminator(&self) -> u8 {
        self.terminator
    }

    /// Changes the [`Mode::Stream`] record terminator. Takes effect on the
    /// next read; bytes already buffered are not rescanned.
    pub fn set_terminator(&mut self, terminator: u8) {
        self.terminator = terminator;
    }

    /// Bytes written and not yet read.
    pub fn occupancy(&self) -> usize {
        (self.write_count - self.read_count) as usize
    }

    pub fn free_space(&self) -> usize {
        self.capacity() - self.occupancy()
    }

    pub fn is_empty(&self) -> bool {
        self.write_count == self.read_count
    }

    pub fn is_full(&self) -> bool {
        self.occupancy() == self.capacity()
    }

    /// Total bytes ever written.
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    /// Total bytes ever read.
    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    fn offset(&self, count: u64) -> usize {
        (count % self.capacity() as u64) as usize
    }

    /// Appends as much of `data` as fits and returns the number of bytes of
    /// capacity used.
    ///
    /// In [`Mode::String`] a NUL is stored after `data`, so a complete write
    /// uses `data.len() + 1` bytes. When space runs out the write is cut
    /// short without error; a short string write may lose its NUL.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let wanted = self.mode.write_len(data.len());
        let len = wanted.min(self.free_space());
        let copied = len.min(data.len());

        let dst = &mut self.writable()[..len];
        dst[..copied].copy_from_slice(&data[..copied]);
        if len > copied {
            dst[copied] = 0;
        }
        self.write_count += len as u64;

        trace!(
            write_count = self.write_count,
            read_count = self.read_count,
            wanted = wanted,
            written = len,
            "ring buffer write"
        );

        len
    }

    /// Reads at most `out.len()` bytes, framed according to the mode.
    ///
    /// | mode | result |
    /// |---|---|
    /// | [`Mode::Byte`] | up to `out.len()` raw bytes |
    /// | [`Mode::String`] | bytes through the first NUL; without one, the window with its last byte forced to NUL |
    /// | [`Mode::Stream`] | the record length, terminator excluded; the terminator's slot in `out` holds NUL |
    ///
    /// Stream mode returns [`RingBufError::IncompleteRecord`] and consumes
    /// nothing when no terminator appears within `out.len()` readable bytes.
    /// An empty `out` is always `Ok(0)`.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize, RingBufError> {
        if unlikely(out.is_empty()) {
            return Ok(0);
        }

        let window_len = out.len().min(self.occupancy());
        let window = &self.readable()[..window_len];
        let framed = self.mode.frame(window, out, self.terminator)?;
        self.read_count += framed.consumed as u64;

        trace!(
            write_count = self.write_count,
            read_count = self.read_count,
            requested = out.len(),
            consumed = framed.consumed,
            "ring buffer read"
        );

        Ok(framed.returned)
    }

    /// All unread bytes, as one contiguous slice.
    pub fn readable(&self) -> &[u8] {
        self.memory
            .slice(self.offset(self.read_count), self.occupancy())
    }

    /// Marks up to `len` unread bytes as read and returns how many were.
    pub fn consume(&mut self, len: usize) -> usize {
        let len = len.min(self.occupancy());
        self.read_count += len as u64;
        len
    }

    /// All free space, as one contiguous slice. Bytes placed here become
    /// readable after [`commit`](Self::commit).
    pub fn writable(&mut self) -> &mut [u8] {
        let offset = self.offset(self.write_count);
        let free = self.free_space();
        self.memory.slice_mut(offset, free)
    }

    /// Publishes up to `len` bytes previously filled through
    /// [`writable`](Self::writable) and returns how many were.
    pub fn commit(&mut self, len: usize) -> usize {
        let len = len.min(self.free_space());
        self.write_count += len as u64;
        len
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("mode", &self.mode)
            .field("terminator", &self.terminator)
            .field("write_count", &self.write_count)
            .field("read_count", &self.read_count)
            .finish()
    }
}
