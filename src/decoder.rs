//! Forward-only decoding of drained generations.
//!
//! A [`Generation`] is a read-only view of one arena's retained records. An
//! [`EventStream`] walks its occupied slots in slot order and hands out a
//! [`RecordCursor`] per record; the cursor reads the typed fields back in the
//! order they were appended.
//!
//! Reads that disagree with the stored layout (a scalar read over a blob, a
//! field that runs past the record's declared length, a string whose
//! terminator is missing) mean the producer and consumer disagree about the
//! record schema. They panic: the stream cannot be resynchronised.

use crate::arena::Counters;
use crate::body::Body;
use crate::record_format::{
    align_up, payload_align, EventHeader, EventSlot, Scalar, EVT_EOF, HEADER_SIZE, PREFIX_SIZE,
};

/// One generation of records as retained by an arena.
#[derive(Clone, Copy)]
pub struct Generation<'a> {
    events: &'a [EventSlot],
    bodies: &'a [Body],
    counters: Counters,
}

impl<'a> Generation<'a> {
    pub(crate) fn new(events: &'a [EventSlot], bodies: &'a [Body], counters: Counters) -> Self {
        let retained_events = counters.events.min(events.len());
        let retained_bodies = counters.bodies.min(bodies.len());
        Self {
            events: &events[..retained_events],
            bodies: &bodies[..retained_bodies],
            counters,
        }
    }

    /// Produced counts, drops included.
    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Event slots that were actually stored.
    pub fn events(&self) -> &'a [EventSlot] {
        self.events
    }

    /// Body records that were actually stored, in slot order.
    pub fn bodies(&self) -> &'a [Body] {
        self.bodies
    }

    pub fn dropped_event_count(&self) -> usize {
        self.counters.events - self.events.len()
    }

    pub fn dropped_body_count(&self) -> usize {
        self.counters.bodies - self.bodies.len()
    }

    pub fn stream(&self) -> EventStream<'a> {
        EventStream::new(*self)
    }
}

/// A single field as stored in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    /// True for blobs (negative prefix), false for fixed scalars.
    pub variable: bool,
    /// The payload, without prefix, padding or terminator.
    pub bytes: &'a [u8],
    pub(crate) terminated: bool,
}

/// Field cursor over a single encoded record.
#[derive(Debug, Clone)]
pub struct RecordCursor<'a> {
    record: &'a [u8],
    header: EventHeader,
    offset: usize,
    end_of_message: bool,
}

impl<'a> RecordCursor<'a> {
    /// Positions a cursor just past the header of `record`.
    ///
    /// # Panics
    ///
    /// Panics if `record` does not start with a valid header.
    pub fn new(record: &'a [u8]) -> Self {
        match Self::try_new(record) {
            Some(cursor) => cursor,
            None => panic!(
                "Programmer error: malformed event record ({} bytes available)",
                record.len()
            ),
        }
    }

    /// Like [`RecordCursor::new`], returning `None` for a malformed header.
    pub fn try_new(record: &'a [u8]) -> Option<Self> {
        let header = EventHeader::decode(record)?;
        let length = header.length as usize;
        if length < HEADER_SIZE || length > record.len() {
            return None;
        }
        Some(Self {
            record: &record[..length],
            header,
            offset: HEADER_SIZE,
            end_of_message: length == HEADER_SIZE,
        })
    }

    fn empty() -> Self {
        Self {
            record: &[],
            header: EventHeader::default(),
            offset: HEADER_SIZE,
            end_of_message: true,
        }
    }

    pub fn header(&self) -> EventHeader {
        self.header
    }

    pub fn kind(&self) -> i32 {
        self.header.kind
    }

    pub fn is_end_of_message(&self) -> bool {
        self.end_of_message
    }

    /// The encoded record, header included, trimmed to its declared length.
    pub fn raw(&self) -> &'a [u8] {
        self.record
    }

    /// Reads the next field, or `None` once every field has been consumed.
    ///
    /// # Panics
    ///
    /// Panics if the field extends past the record's declared length.
    pub fn read_field(&mut self) -> Option<Field<'a>> {
        if self.end_of_message {
            return None;
        }

        let record = self.record;
        let prefix_at = align_up(self.offset, PREFIX_SIZE);
        if prefix_at + PREFIX_SIZE > record.len() {
            self.overrun(prefix_at + PREFIX_SIZE);
        }
        let prefix = i32::read_le(&record[prefix_at..]);

        let field = if prefix > 0 {
            let size = prefix as usize;
            let payload_at = align_up(prefix_at + PREFIX_SIZE, payload_align(size));
            let end = payload_at + size;
            if end > record.len() {
                self.overrun(end);
            }
            self.offset = end;
            Field {
                variable: false,
                bytes: &record[payload_at..end],
                terminated: false,
            }
        } else if prefix < 0 {
            let total = prefix.unsigned_abs() as usize;
            if total < PREFIX_SIZE + 1 {
                panic!("Programmer error: blob prefix {} is shorter than its own header", prefix);
            }
            let payload_at = prefix_at + PREFIX_SIZE;
            let end = prefix_at + total;
            if end > record.len() {
                self.overrun(end);
            }
            self.offset = end;
            Field {
                variable: true,
                bytes: &record[payload_at..end - 1],
                terminated: record[end - 1] == 0,
            }
        } else {
            panic!(
                "Programmer error: zero-length field at offset {} of event #{}",
                prefix_at, self.header.sequence
            );
        };

        if self.offset >= record.len() {
            self.end_of_message = true;
        }
        Some(field)
    }

    /// Reads a fixed-width scalar, or `T::default()` at end of message.
    ///
    /// # Panics
    ///
    /// Panics if the next field is a blob or has a different width than `T`.
    pub fn read_scalar<T: Scalar>(&mut self) -> T {
        let Some(field) = self.read_field() else {
            return T::default();
        };
        if field.variable || field.bytes.len() != T::SIZE {
            panic!(
                "Programmer error: expected a {}-byte scalar in event #{}, found a {} of {} bytes",
                T::SIZE,
                self.header.sequence,
                if field.variable { "blob" } else { "scalar" },
                field.bytes.len()
            );
        }
        T::read_le(field.bytes)
    }

    /// Reads a variable-length field without copying, or `&[]` at end of message.
    ///
    /// # Panics
    ///
    /// Panics if the next field is a fixed scalar.
    pub fn read_blob(&mut self) -> &'a [u8] {
        let Some(field) = self.read_field() else {
            return &[];
        };
        if !field.variable {
            panic!(
                "Programmer error: expected a blob in event #{}, found a {}-byte scalar",
                self.header.sequence,
                field.bytes.len()
            );
        }
        field.bytes
    }

    /// Reads a string field, or `""` at end of message.
    ///
    /// # Panics
    ///
    /// Panics unless the payload is exactly the prefix-implied size: valid
    /// UTF-8 with no interior NUL, followed by one terminating zero byte.
    pub fn read_string(&mut self) -> &'a str {
        let Some(field) = self.read_field() else {
            return "";
        };
        if !field.variable || !field.terminated || field.bytes.contains(&0) {
            panic!(
                "Programmer error: string field in event #{} does not match its declared size",
                self.header.sequence
            );
        }
        match std::str::from_utf8(field.bytes) {
            Ok(text) => text,
            Err(err) => panic!(
                "Programmer error: string field in event #{} is not UTF-8: {}",
                self.header.sequence, err
            ),
        }
    }

    /// Discards the remaining fields.
    pub fn skip_to_end(&mut self) {
        self.offset = self.record.len().max(HEADER_SIZE);
        self.end_of_message = true;
    }

    #[cold]
    fn overrun(&self, end: usize) -> ! {
        panic!(
            "Programmer error: read past the end of event #{} (field ends at {}, record length {})",
            self.header.sequence,
            end,
            self.record.len()
        );
    }
}

/// Forward-only cursor over the events of one generation.
///
/// Not restartable: decoding the same generation again takes a fresh stream.
pub struct EventStream<'a> {
    generation: Generation<'a>,
    current: isize,
    cursor: RecordCursor<'a>,
}

impl<'a> EventStream<'a> {
    pub fn new(generation: Generation<'a>) -> Self {
        Self {
            generation,
            current: -1,
            cursor: RecordCursor::empty(),
        }
    }

    /// Moves to the next stored record and returns its kind.
    ///
    /// Returns [`EVT_EOF`] once every record has been visited, and keeps
    /// returning it without moving further.
    pub fn advance(&mut self) -> i32 {
        let retained = self.generation.events.len() as isize;
        if self.current >= retained {
            return EVT_EOF;
        }
        self.current += 1;
        if self.current == retained {
            self.cursor = RecordCursor::empty();
            return EVT_EOF;
        }

        let slot = &self.generation.events[self.current as usize];
        self.cursor = RecordCursor::new(slot.as_bytes());
        self.cursor.kind()
    }

    fn ensure_started(&mut self) {
        if self.current < 0 {
            self.advance();
        }
    }

    /// The cursor of the current record.
    pub fn record(&mut self) -> &mut RecordCursor<'a> {
        self.ensure_started();
        &mut self.cursor
    }

    pub fn header(&mut self) -> EventHeader {
        self.record().header()
    }

    pub fn kind(&mut self) -> i32 {
        self.record().kind()
    }

    pub fn sequence(&mut self) -> u64 {
        self.record().header().sequence
    }

    pub fn thread_id(&mut self) -> u32 {
        self.record().header().thread_id
    }

    pub fn read_field(&mut self) -> Option<Field<'a>> {
        self.record().read_field()
    }

    pub fn read_scalar<T: Scalar>(&mut self) -> T {
        self.record().read_scalar()
    }

    pub fn read_blob(&mut self) -> &'a [u8] {
        self.record().read_blob()
    }

    pub fn read_string(&mut self) -> &'a str {
        self.record().read_string()
    }

    /// The whole encoded record. Consumes any fields not read yet.
    pub fn raw_record(&mut self) -> &'a [u8] {
        let cursor = self.record();
        cursor.skip_to_end();
        cursor.raw()
    }

    pub fn event_count(&self) -> usize {
        self.generation.events.len()
    }

    pub fn dropped_event_count(&self) -> usize {
        self.generation.dropped_event_count()
    }

    pub fn dropped_body_count(&self) -> usize {
        self.generation.dropped_body_count()
    }

    /// Body records of the generation, in slot order.
    pub fn bodies(&self) -> &'a [Body] {
        self.generation.bodies
    }

    /// Iterates over the records not yet visited.
    pub fn records(&mut self) -> Records<'_, 'a> {
        Records { stream: self }
    }
}

/// Iterator returned by [`EventStream::records`].
pub struct Records<'s, 'a> {
    stream: &'s mut EventStream<'a>,
}

impl<'a> Iterator for Records<'_, 'a> {
    type Item = RecordCursor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stream.advance() == EVT_EOF {
            return None;
        }
        Some(self.stream.cursor.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_format::{encode_record, EVT_PRINTF};

    fn slot_with<F: FnOnce(&mut crate::RecordEncoder<'_>)>(kind: i32, seq: u64, fill: F) -> EventSlot {
        let mut slot = EventSlot::EMPTY;
        encode_record(&mut slot, kind, 0, seq, fill);
        slot
    }

    #[test]
    fn test_cursor_reads_fields_in_order() {
        let slot = slot_with(4, 0, |enc| {
            enc.push_scalar(7u8);
            enc.push_scalar(-3i64);
            enc.push_str("x");
        });
        let mut cursor = RecordCursor::new(slot.as_bytes());
        assert_eq!(cursor.read_scalar::<u8>(), 7);
        assert_eq!(cursor.read_scalar::<i64>(), -3);
        assert!(!cursor.is_end_of_message());
        assert_eq!(cursor.read_string(), "x");
        assert!(cursor.is_end_of_message());
        assert_eq!(cursor.read_scalar::<i32>(), 0);
        assert_eq!(cursor.read_blob(), b"");
    }

    #[test]
    fn test_try_new_rejects_bad_length() {
        let mut bytes = [0u8; 32];
        EventHeader {
            kind: 1,
            length: 64,
            ..EventHeader::default()
        }
        .encode(&mut bytes);
        assert!(RecordCursor::try_new(&bytes).is_none());
        assert!(RecordCursor::try_new(&bytes[..8]).is_none());
    }

    #[test]
    #[should_panic(expected = "Programmer error")]
    fn test_scalar_width_mismatch_panics() {
        let slot = slot_with(4, 0, |enc| enc.push_scalar(1i32));
        RecordCursor::new(slot.as_bytes()).read_scalar::<f64>();
    }

    #[test]
    fn test_generation_counts_drops() {
        let slots = [
            slot_with(EVT_PRINTF, 0, |enc| enc.push_str("a")),
            slot_with(EVT_PRINTF, 1, |enc| enc.push_str("b")),
        ];
        let generation = Generation::new(&slots, &[], Counters { events: 5, bodies: 1 });
        assert_eq!(generation.events().len(), 2);
        assert_eq!(generation.dropped_event_count(), 3);
        assert_eq!(generation.dropped_body_count(), 1);

        let mut stream = generation.stream();
        assert_eq!(stream.advance(), EVT_PRINTF);
        assert_eq!(stream.advance(), EVT_PRINTF);
        assert_eq!(stream.advance(), EVT_EOF);
        assert_eq!(stream.advance(), EVT_EOF);
    }
}
