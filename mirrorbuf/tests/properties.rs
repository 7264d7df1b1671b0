use mirrorbuf::{page_size, Backing, Mode, RingBufError, RingBuffer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::{fixture, rstest};
use std::sync::{Arc, Mutex};
use std::thread;

#[fixture]
fn page() -> usize {
    page_size()
}

fn pattern(start: usize, len: usize) -> Vec<u8> {
    (start..start + len).map(|i| (i % 251) as u8).collect()
}

#[rstest]
#[case::half_page(page_size() / 2, 1)]
#[case::half_page_plus_one(page_size() / 2 + 1, 1)]
#[case::one_page(page_size(), 1)]
#[case::two_pages(2 * page_size(), 2)]
#[case::three_pages(3 * page_size(), 3)]
#[case::two_thirds_short(3 * page_size() - page_size() / 3, 3)]
fn test_capacity_rounding(
    page: usize,
    #[case] requested: usize,
    #[case] expected_pages: usize,
) -> Result<(), RingBufError> {
    let buffer = RingBuffer::open(requested, Mode::Byte)?;
    assert_eq!(buffer.capacity(), page * expected_pages);
    buffer.close()
}

#[rstest]
fn test_rounding_is_smallest_page_multiple(page: usize) -> Result<(), RingBufError> {
    for requested in [1, page / 2 + 1, page - 1, page + 1, 3 * page - page / 3] {
        let buffer = RingBuffer::open(requested, Mode::Byte)?;
        let capacity = buffer.capacity();
        assert!(capacity >= requested);
        assert_eq!(capacity % page, 0);
        assert!(capacity - requested < page);
        buffer.close()?;
    }
    Ok(())
}

#[test]
fn test_open_zero_capacity() {
    assert!(matches!(
        RingBuffer::open(0, Mode::String),
        Err(RingBufError::ZeroCapacity)
    ));
}

#[test]
fn test_no_overwrite_when_full() -> Result<(), RingBufError> {
    let mut buffer = RingBuffer::open(1, Mode::Byte)?;
    let capacity = buffer.capacity();

    assert_eq!(buffer.write(&pattern(0, capacity)), capacity);
    assert_eq!(buffer.write(b"more"), 0);
    assert_eq!(buffer.occupancy(), capacity);
    assert_eq!(buffer.readable(), pattern(0, capacity).as_slice());

    buffer.close()
}

#[rstest]
#[case::single(1)]
#[case::small(100)]
#[case::whole(0)]
fn test_byte_round_trip(#[case] len: usize) -> Result<(), RingBufError> {
    let mut buffer = RingBuffer::open(1, Mode::Byte)?;
    let len = if len == 0 { buffer.capacity() } else { len };
    let data = pattern(7, len);

    assert_eq!(buffer.write(&data), len);
    let mut out = vec![0u8; len];
    assert_eq!(buffer.read(&mut out)?, len);
    assert_eq!(out, data);
    assert!(buffer.is_empty());

    buffer.close()
}

#[test]
fn test_byte_read_never_exceeds_occupancy() -> Result<(), RingBufError> {
    let mut buffer = RingBuffer::open(1, Mode::Byte)?;
    buffer.write(b"four");

    let mut out = [0xaau8; 16];
    assert_eq!(buffer.read(&mut out)?, 4);
    assert_eq!(&out[..4], b"four");
    assert!(out[4..].iter().all(|&b| b == 0xaa));

    buffer.close()
}

#[test]
fn test_string_framing() -> Result<(), RingBufError> {
    let mut buffer = RingBuffer::open(1, Mode::String)?;
    assert_eq!(buffer.write(b"abc"), 4);

    let mut out = [0u8; 10];
    assert_eq!(buffer.read(&mut out)?, 4);
    assert_eq!(&out[..4], b"abc\0");

    buffer.close()
}

#[test]
fn test_stream_complete_record() -> Result<(), RingBufError> {
    let mut buffer = RingBuffer::open(1, Mode::Stream)?;
    buffer.write(b"line1\n");

    let mut out = [0u8; 10];
    assert_eq!(buffer.read(&mut out)?, 5);
    assert_eq!(&out[..6], b"line1\0");
    assert!(buffer.is_empty());

    buffer.close()
}

#[test]
fn test_stream_incomplete_record() -> Result<(), RingBufError> {
    let mut buffer = RingBuffer::open(1, Mode::Stream)?;
    buffer.write(b"partial");

    let mut out = [0u8; 10];
    match buffer.read(&mut out) {
        Err(RingBufError::IncompleteRecord { terminator, window }) => {
            assert_eq!(terminator, b'\n');
            assert_eq!(window, 7);
        }
        other => panic!("expected incomplete record, got {:?}", other),
    }
    assert_eq!(buffer.read_count(), 0);
    assert_eq!(buffer.occupancy(), 7);

    buffer.write(b"\n");
    assert_eq!(buffer.read(&mut out)?, 7);
    assert_eq!(&out[..8], b"partial\0");

    buffer.close()
}

#[test]
fn test_wraparound_is_contiguous() -> Result<(), RingBufError> {
    let mut buffer = RingBuffer::open(1, Mode::Byte)?;
    let capacity = buffer.capacity();
    let chunk = capacity / 3 + 17;
    let mut written = 0;
    let mut read = 0;

    // Enough rounds for the cursors to lap the buffer many times.
    for _ in 0..(capacity / chunk + 1) * 20 {
        let data = pattern(written, chunk);
        assert_eq!(buffer.write(&data), chunk);
        written += chunk;

        let start = (buffer.read_count() % capacity as u64) as usize;
        let readable = buffer.readable();
        assert_eq!(readable.len(), chunk);
        assert_eq!(readable, pattern(read, chunk).as_slice());

        let mut out = vec![0u8; chunk];
        assert_eq!(buffer.read(&mut out)?, chunk);
        assert_eq!(out, data, "chunk starting at offset {} corrupted", start);
        read += chunk;
    }

    assert!(buffer.write_count() > 10 * capacity as u64);
    buffer.close()
}

#[test]
fn test_string_record_across_boundary() -> Result<(), RingBufError> {
    let mut buffer = RingBuffer::open(1, Mode::String)?;
    let capacity = buffer.capacity();

    buffer.commit(capacity - 3);
    buffer.consume(capacity - 3);

    assert_eq!(buffer.write(b"spanning"), 9);
    let mut out = [0u8; 32];
    assert_eq!(buffer.read(&mut out)?, 9);
    assert_eq!(&out[..9], b"spanning\0");

    buffer.close()
}

#[rstest]
#[case::byte(Mode::Byte, 1)]
#[case::string(Mode::String, 2)]
#[case::stream(Mode::Stream, 3)]
fn test_randomized_invariants(#[case] mode: Mode, #[case] seed: u64) -> Result<(), RingBufError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut buffer = RingBuffer::open(1, mode)?;
    let capacity = buffer.capacity();
    let mut out = vec![0u8; capacity * 2];

    for step in 0..20_000 {
        if rng.gen_bool(0.5) {
            let len = rng.gen_range(0..capacity / 2);
            let mut data = pattern(step, len);
            if len > 0 && rng.gen_bool(0.3) {
                data[len - 1] = b'\n';
            }
            let before = buffer.free_space();
            let written = buffer.write(&data);
            assert!(written <= before);
        } else {
            let len = rng.gen_range(0..capacity * 2);
            match buffer.read(&mut out[..len]) {
                Ok(n) => assert!(n <= len),
                Err(err) => assert!(err.is_incomplete_record()),
            }
        }

        assert!(buffer.read_count() <= buffer.write_count());
        assert!(buffer.write_count() - buffer.read_count() <= capacity as u64);
        assert_eq!(buffer.occupancy() + buffer.free_space(), capacity);
    }

    buffer.close()
}

#[test]
fn test_tempfile_backing() -> Result<(), RingBufError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let backing = Backing::TempFile {
        dir: dir.path().to_path_buf(),
    };
    let mut buffer = RingBuffer::open_with(10, Mode::Stream, &backing)?;
    assert_eq!(buffer.capacity(), page_size());

    buffer.write(b"from a file\n");
    let mut out = [0u8; 16];
    assert_eq!(buffer.read(&mut out)?, 11);
    assert_eq!(&out[..12], b"from a file\0");

    buffer.close()
}

#[test]
fn test_many_buffers_open_and_close() -> Result<(), RingBufError> {
    let buffers = (1..=16)
        .map(|pages| RingBuffer::open(pages * page_size(), Mode::Byte))
        .collect::<Result<Vec<_>, _>>()?;

    for (i, buffer) in buffers.into_iter().enumerate() {
        assert_eq!(buffer.capacity(), (i + 1) * page_size());
        buffer.close()?;
    }
    Ok(())
}

#[test]
fn test_producer_consumer_with_external_lock() -> Result<(), RingBufError> {
    let buffer = Arc::new(Mutex::new(RingBuffer::open(1, Mode::Stream)?));
    let num_messages = 2_000;

    let producer = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || {
            for i in 0..num_messages {
                let record = format!("message_{}\n", i);
                loop {
                    let mut buffer = buffer.lock().unwrap();
                    if buffer.free_space() >= record.len() {
                        assert_eq!(buffer.write(record.as_bytes()), record.len());
                        break;
                    }
                    drop(buffer);
                    thread::yield_now();
                }
            }
        })
    };

    let mut received = Vec::with_capacity(num_messages);
    let mut out = [0u8; 64];
    while received.len() < num_messages {
        let mut guard = buffer.lock().unwrap();
        match guard.read(&mut out) {
            Ok(n) => received.push(String::from_utf8(out[..n].to_vec()).unwrap()),
            Err(err) if err.is_incomplete_record() => {
                drop(guard);
                thread::yield_now();
            }
            Err(err) => panic!("unexpected error: {:?}", err),
        }
    }

    producer.join().expect("producer thread panicked");

    for (i, message) in received.iter().enumerate() {
        assert_eq!(message, &format!("message_{}", i));
    }
    Ok(())
}
