//! Descriptor accounting lives in its own test binary: every other test opens
//! buffers too, and would race the `/proc/self/fd` counts.

use mirrorbuf::{Mode, RingBufError, RingBuffer};

fn open_fds() -> usize {
    std::fs::read_dir("/proc/self/fd")
        .expect("read /proc/self/fd")
        .count()
}

#[test]
fn test_failed_and_closed_buffers_release_descriptors() {
    // Rounds and doubles within usize and the memfd accepts the size, so this
    // fails only when the doubled range is reserved.
    let huge = usize::MAX / 4;
    match RingBuffer::open(huge, Mode::Byte) {
        Err(RingBufError::AllocationFailed { stage, .. }) => {
            assert_eq!(stage, "reserve address space")
        }
        other => panic!("expected a failed reservation, got {:?}", other),
    }

    let before = open_fds();

    for _ in 0..200 {
        assert!(RingBuffer::open(huge, Mode::Byte).is_err());
    }
    assert_eq!(open_fds(), before, "failed opens leaked descriptors");

    for _ in 0..200 {
        let buffer = RingBuffer::open(1, Mode::Stream).expect("open");
        buffer.close().expect("close");
    }
    assert_eq!(open_fds(), before, "closed buffers leaked descriptors");

    for _ in 0..200 {
        let mut buffer = RingBuffer::open(1, Mode::String).expect("open");
        buffer.write(b"dropped");
    }
    assert_eq!(open_fds(), before, "dropped buffers leaked descriptors");
}
