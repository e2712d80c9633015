use std::fmt;

use crate::body::Body;
use crate::decoder::RecordCursor;
use crate::formatter::format_message;
use crate::record_format::{align_up, EventHeader};

/// Reader and utilities for decoding the files written by the binary sink.
///
/// The binary sink produces two streams:
///
/// 1. An event file: every non-message record, header included, padded with
///    zeros to a multiple of 8 bytes so the next header stays aligned.
/// 2. A body file: fixed [`Body::SIZE`]-byte records in slot order.
///
/// Neither file carries a preamble, so the streams of several runs can be
/// concatenated and still read back.

/// A single record read back from an event file.
///
/// Wraps a [`RecordCursor`] positioned on the first field, so the caller can
/// decode the record exactly as a writer would during a flush.
#[derive(Debug, Clone)]
pub struct EventEntry<'a> {
    /// Decoded header of the record.
    pub header: EventHeader,

    /// Cursor over the record's fields.
    pub fields: RecordCursor<'a>,
}

impl EventEntry<'_> {
    /// Renders the entry the way the console echo does.
    ///
    /// Messages are rendered from their template; any other event is shown
    /// by kind, field count and length.
    ///
    /// # Returns
    ///
    /// A one-line human-readable description of the record
    ///
    /// # Examples
    ///
    /// ```
    /// # use device_event_log::EventFileReader;
    /// # use std::fs;
    /// # fn example() -> std::io::Result<()> {
    /// let data = fs::read("events.bin")?;
    /// for entry in EventFileReader::new(&data) {
    ///     println!("{}", entry.describe());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn describe(&self) -> String {
        let mut fields = self.fields.clone();
        match format_message(&mut fields) {
            Some(text) => format!(
                "[Event #{} from thread {}]: {}",
                self.header.sequence,
                self.header.thread_id,
                text.trim_end_matches('\n')
            ),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for EventEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Event #{} from thread {}] EVT={}, with {} data elements ({} bytes)",
            self.header.sequence,
            self.header.thread_id,
            self.header.kind,
            self.header.arg_count,
            self.header.length
        )
    }
}

/// Sequential reader over the contents of an event file.
///
/// # How It Works
///
/// Each entry starts with a header whose `length` field gives the size of
/// the record; the reader then skips to the next 8-byte boundary. Reading
/// stops at the first truncated or malformed header.
///
/// # Examples
///
/// ```
/// # use device_event_log::EventFileReader;
/// # fn example() -> std::io::Result<()> {
/// let data = std::fs::read("events.bin")?;
/// let mut reader = EventFileReader::new(&data);
///
/// while let Some(mut entry) = reader.read_entry() {
///     let time: f64 = entry.fields.read_scalar();
///     println!("event {} at t={}", entry.header.kind, time);
/// }
/// # Ok(())
/// # }
/// ```
pub struct EventFileReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> EventFileReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Byte offset of the next entry.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Reads the next entry.
    ///
    /// # Returns
    ///
    /// * `Some(EventEntry)` - The next record
    /// * `None` - At the end of the data, or if the remaining bytes do not
    ///   hold a complete record
    pub fn read_entry(&mut self) -> Option<EventEntry<'a>> {
        let remaining = self.data.get(self.pos..)?;
        let fields = RecordCursor::try_new(remaining)?;
        let header = fields.header();
        self.pos += align_up(header.length as usize, 8).min(remaining.len());
        Some(EventEntry { header, fields })
    }
}

impl<'a> Iterator for EventFileReader<'a> {
    type Item = EventEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_entry()
    }
}

/// Sequential reader over the contents of a body file.
///
/// A trailing partial record, e.g. from a run that was killed mid-write, is
/// ignored.
pub struct BodyFileReader<'a> {
    chunks: std::slice::ChunksExact<'a, u8>,
}

impl<'a> BodyFileReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            chunks: data.chunks_exact(Body::SIZE),
        }
    }

    /// Number of complete records left to read.
    pub fn remaining(&self) -> usize {
        self.chunks.len()
    }
}

impl Iterator for BodyFileReader<'_> {
    type Item = Body;

    fn next(&mut self) -> Option<Body> {
        self.chunks.next().map(Body::decode)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.chunks.len(), Some(self.chunks.len()))
    }
}
