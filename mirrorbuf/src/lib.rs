//! # mirrorbuf - Doubled-Mapping Byte Ring Buffer
//!
//! Fixed-capacity circular byte buffer for producer/consumer byte streams.
//!
//! One backing object (a `memfd`, or an unlinked temporary file) is mapped
//! twice, back to back, into a single reserved range of virtual memory. The
//! second half aliases the first, so a read or write that runs past the end of
//! the buffer keeps going in the alias instead of wrapping. Every access is one
//! contiguous copy.
//!
//! ## Opening a Buffer
//!
//! ```rust
//! use mirrorbuf::{Mode, RingBuffer};
//!
//! let buffer = RingBuffer::open(1000, Mode::Byte)?;
//! // Capacity is rounded up to whole pages.
//! assert!(buffer.capacity() >= 1000);
//! assert_eq!(buffer.capacity() % mirrorbuf::page_size(), 0);
//! buffer.close()?;
//! # Ok::<(), mirrorbuf::RingBufError>(())
//! ```
//!
//! ## Modes
//!
//! The mode only changes how [`RingBuffer::read`] frames its result.
//!
//! ### Byte
//!
//! ```rust
//! # use mirrorbuf::{Mode, RingBuffer};
//! let mut buffer = RingBuffer::open(4096, Mode::Byte)?;
//! assert_eq!(buffer.write(b"hello"), 5);
//!
//! let mut out = [0u8; 3];
//! assert_eq!(buffer.read(&mut out)?, 3);
//! assert_eq!(&out, b"hel");
//! # Ok::<(), mirrorbuf::RingBufError>(())
//! ```
//!
//! ### String
//!
//! Writes append a NUL; reads stop after the first NUL.
//!
//! ```rust
//! # use mirrorbuf::{Mode, RingBuffer};
//! let mut buffer = RingBuffer::open(4096, Mode::String)?;
//! assert_eq!(buffer.write(b"abc"), 4);
//!
//! let mut out = [0u8; 10];
//! assert_eq!(buffer.read(&mut out)?, 4);
//! assert_eq!(&out[..4], b"abc\0");
//! # Ok::<(), mirrorbuf::RingBufError>(())
//! ```
//!
//! ### Stream
//!
//! Reads return one terminator-delimited record, or
//! [`RingBufError::IncompleteRecord`] without consuming anything.
//!
//! ```rust
//! # use mirrorbuf::{Mode, RingBuffer};
//! let mut buffer = RingBuffer::open(4096, Mode::Stream)?;
//! let mut out = [0u8; 10];
//!
//! buffer.write(b"line");
//! assert!(buffer.read(&mut out).unwrap_err().is_incomplete_record());
//!
//! buffer.write(b"1\n");
//! assert_eq!(buffer.read(&mut out)?, 5);
//! assert_eq!(&out[..6], b"line1\0");
//! # Ok::<(), mirrorbuf::RingBufError>(())
//! ```
//!
//! ## Zero-Copy Access
//!
//! [`RingBuffer::readable`] and [`RingBuffer::writable`] hand out the unread
//! data and the free space as single slices, whatever the cursor positions.
//!
//! ```rust
//! # use mirrorbuf::{Mode, RingBuffer};
//! let mut buffer = RingBuffer::open(4096, Mode::Byte)?;
//! let free = buffer.writable();
//! free[..2].copy_from_slice(b"hi");
//! buffer.commit(2);
//!
//! assert_eq!(buffer.readable(), b"hi");
//! buffer.consume(2);
//! # Ok::<(), mirrorbuf::RingBufError>(())
//! ```
//!
//! ## Threading
//!
//! There is no internal synchronization. A [`RingBuffer`] can move between
//! threads, but a producer and consumer sharing one must coordinate through
//! their own lock.

pub use common::page_size;
pub use config::Config;
pub use error::RingBufError;
pub use memory::Backing;
pub use mode::Mode;
pub use ringbuf::{RingBuffer, DEFAULT_TERMINATOR};

pub(crate) mod common;
pub mod config;
pub mod error;
pub(crate) mod memory;
pub(crate) mod mode;
pub(crate) mod ringbuf;
