// Copyright (C) 2025 Category Labs, Inc.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Common internal helpers for mirrorbuf.

use crate::RingBufError;

#[inline]
#[cold]
fn cold() {}

#[inline(always)]
pub(crate) fn unlikely(b: bool) -> bool {
    if b {
        cold();
    }
    b
}

/// Size of a virtual memory page on this machine.
pub fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

/// Rounds `requested` up to the next multiple of `page_size`.
///
/// The result is guaranteed to fit twice in the address space, since the
/// region is mapped back to back. A page size that is not a power of two
/// means `sysconf` failed, and nothing can be mapped.
pub(crate) fn round_to_pages(requested: usize, page_size: usize) -> Result<usize, RingBufError> {
    if requested == 0 {
        return Err(RingBufError::ZeroCapacity);
    }
    if unlikely(!page_size.is_power_of_two()) {
        return Err(RingBufError::CapacityTooLarge(requested));
    }
    requested
        .checked_next_multiple_of(page_size)
        .filter(|size| size.checked_mul(2).is_some())
        .ok_or(RingBufError::CapacityTooLarge(requested))
}
