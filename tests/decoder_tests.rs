use device_event_log::{
    emit_event, format_message, lprintf, Body, EventEmitter, EventHeader, Geometry, HostLog,
    RecordCursor, EVT_EOF, EVT_MSGLOST, EVT_PRINTF, LOST_MESSAGE, MAX_MSG_LEN,
};

#[test]
fn test_int_double_string_roundtrip() {
    let mut host = HostLog::new(Geometry::new(4, 4));
    let value = -0.1f64;
    assert_eq!(emit_event!(host, 7, 11, 123456789i32, value, "exact bytes"), Some(0));

    let generation = host.generation();
    let mut stream = generation.stream();
    assert_eq!(stream.advance(), 7);
    assert_eq!(stream.thread_id(), 11);
    assert_eq!(stream.header().arg_count, 3);
    assert_eq!(stream.read_scalar::<i32>(), 123456789);
    assert_eq!(stream.read_scalar::<f64>().to_bits(), value.to_bits());
    assert_eq!(stream.read_string(), "exact bytes");
    assert_eq!(stream.advance(), EVT_EOF);
}

#[test]
fn test_end_of_message_yields_defaults() {
    let mut host = HostLog::new(Geometry::new(4, 4));
    emit_event!(host, 3, 0, 5u16);

    let generation = host.generation();
    let mut stream = generation.stream();
    stream.advance();
    assert_eq!(stream.read_scalar::<u16>(), 5);
    assert!(stream.record().is_end_of_message());
    assert_eq!(stream.read_scalar::<i64>(), 0);
    assert_eq!(stream.read_scalar::<f64>(), 0.0);
    assert_eq!(stream.read_string(), "");
    assert!(stream.read_blob().is_empty());
}

#[test]
fn test_reads_before_advance_start_the_stream() {
    let mut host = HostLog::new(Geometry::new(4, 4));
    emit_event!(host, 9, 0, 77i64);
    emit_event!(host, 9, 0, 78i64);

    let generation = host.generation();
    let mut stream = generation.stream();
    assert_eq!(stream.read_scalar::<i64>(), 77);
    assert_eq!(stream.advance(), 9);
    assert_eq!(stream.read_scalar::<i64>(), 78);
    assert_eq!(stream.advance(), EVT_EOF);
    assert_eq!(stream.advance(), EVT_EOF);
}

#[test]
fn test_records_iterator() {
    let mut host = HostLog::new(Geometry::new(8, 4));
    for kind in 1..=3 {
        emit_event!(host, kind, 0, kind);
    }

    let generation = host.generation();
    let mut stream = generation.stream();
    let kinds: Vec<i32> = stream
        .records()
        .map(|mut record| {
            assert_eq!(record.read_scalar::<i32>(), record.kind());
            record.kind()
        })
        .collect();
    assert_eq!(kinds, vec![1, 2, 3]);
    assert_eq!(stream.event_count(), 3);
}

#[test]
fn test_dropped_counts_and_bodies() {
    let mut host = HostLog::new(Geometry::new(2, 1));
    for _ in 0..3 {
        emit_event!(host, 4, 0);
    }
    let bodies = [
        Body { index: 0, ..Body::default() },
        Body { index: 1, ..Body::default() },
    ];
    host.emit_snapshot(&bodies);

    let generation = host.generation();
    let stream = generation.stream();
    assert_eq!(stream.dropped_event_count(), 1);
    assert_eq!(stream.dropped_body_count(), 1);
    assert_eq!(stream.bodies(), &bodies[..1]);
}

#[test]
fn test_raw_record_skips_remaining_fields() {
    let mut host = HostLog::new(Geometry::new(4, 4));
    emit_event!(host, 6, 2, 1i32, 2i32);

    let generation = host.generation();
    let mut stream = generation.stream();
    stream.advance();
    let raw = stream.raw_record();
    assert_eq!(raw.len(), 40);
    assert_eq!(EventHeader::decode(raw).unwrap().kind, 6);
    assert_eq!(stream.read_scalar::<i32>(), 0);
}

#[test]
fn test_oversized_message_becomes_lost_marker() {
    let mut host = HostLog::new(Geometry::new(4, 4));
    let huge = "x".repeat(2 * MAX_MSG_LEN);
    assert_eq!(lprintf!(host, 5, "%s", huge), Some(0));

    let generation = host.generation();
    let mut stream = generation.stream();
    assert_eq!(stream.advance(), EVT_MSGLOST);
    assert_eq!(stream.thread_id(), 5);
    assert_eq!(format_message(stream.record()).as_deref(), Some(LOST_MESSAGE));
}

#[test]
fn test_lost_non_message_is_not_rendered() {
    let mut host = HostLog::new(Geometry::new(4, 4));
    let blob = vec![0u8; MAX_MSG_LEN];
    emit_event!(host, 12, 0, &blob[..]);

    let generation = host.generation();
    let mut stream = generation.stream();
    assert_eq!(stream.advance(), EVT_MSGLOST);
    let mut record = stream.record().clone();
    assert_eq!(format_message(&mut record), None);
    assert_eq!(record.read_scalar::<i32>(), 12);
}

#[test]
#[should_panic(expected = "Programmer error")]
fn test_string_with_wrong_size_panics() {
    let mut host = HostLog::new(Geometry::new(4, 4));
    emit_event!(host, EVT_PRINTF, 0, &b"ab\0cd"[..]);

    let generation = host.generation();
    let mut stream = generation.stream();
    stream.read_string();
}

#[test]
#[should_panic(expected = "Programmer error")]
fn test_read_past_record_boundary_panics() {
    let mut bytes = [0u8; 64];
    EventHeader {
        kind: 5,
        length: 32,
        thread_id: 0,
        arg_count: 1,
        sequence: 0,
    }
    .encode(&mut bytes);
    // an 8-byte scalar whose payload would end at 40
    bytes[24..28].copy_from_slice(&8i32.to_le_bytes());

    let mut cursor = RecordCursor::new(&bytes);
    cursor.read_scalar::<f64>();
}

#[test]
#[should_panic(expected = "Programmer error")]
fn test_blob_read_as_scalar_panics() {
    let mut host = HostLog::new(Geometry::new(4, 4));
    emit_event!(host, 8, 0, "not a number");

    let generation = host.generation();
    let mut stream = generation.stream();
    stream.read_scalar::<i32>();
}
