//! Byte-level layout of a single event record.
//!
//! Every event lives in its own fixed-size [`EventSlot`] of [`MAX_MSG_LEN`]
//! bytes. A slot starts with a 24-byte header followed by self-delimiting
//! typed fields:
//!
//! ```text
//! [kind(4) | length(4) | thread_id(4) | arg_count(4) | sequence(8)]
//! [prefix(4) | payload ...] [prefix(4) | payload ...] ...
//! ```
//!
//! A positive prefix is the byte width of a fixed scalar whose payload is
//! aligned to its natural alignment. A negative prefix marks a variable-length
//! blob: `|prefix|` counts the prefix, the payload and one terminating zero
//! byte. All multi-byte values are little-endian.

use std::fmt;

/// Size of one event slot in bytes.
pub const MAX_MSG_LEN: usize = 1024;

/// Size of the event header at the start of every slot.
pub const HEADER_SIZE: usize = 24;

/// Size of the length prefix in front of every field.
pub(crate) const PREFIX_SIZE: usize = 4;

/// End of stream. Never stored in a slot.
pub const EVT_EOF: i32 = 0;
/// A printf-style message: a template string followed by its arguments.
pub const EVT_PRINTF: i32 = -1;
/// A record that did not fit in its slot. Carries the original kind as an `i32`.
pub const EVT_MSGLOST: i32 = -2;
/// Snapshot of a whole system of bodies.
pub const EVT_SNAPSHOT: i32 = 1;
/// A body ejected from its system.
pub const EVT_EJECTION: i32 = 2;

#[inline]
pub(crate) const fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

/// Natural alignment of a scalar payload, capped at 8 bytes.
#[inline]
pub(crate) const fn payload_align(size: usize) -> usize {
    if size >= 8 {
        8
    } else if size >= 4 {
        4
    } else if size >= 2 {
        2
    } else {
        1
    }
}

/// Fixed-width values that can be stored as scalar fields.
pub trait Scalar: Copy + Default {
    /// Width of the encoded value in bytes.
    const SIZE: usize;

    /// Writes the little-endian encoding into the first `SIZE` bytes of `out`.
    fn write_le(self, out: &mut [u8]);

    /// Reads a value from the first `SIZE` bytes of `bytes`.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl Scalar for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                #[inline]
                fn write_le(self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(&bytes[..Self::SIZE]);
                    <$t>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Header stored at the start of every occupied slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventHeader {
    /// Event discriminator. Negative kinds are reserved for the system.
    pub kind: i32,
    /// Bytes used in the slot, header included.
    pub length: u32,
    /// Identity of the worker thread that emitted the record.
    pub thread_id: u32,
    /// Number of typed fields after the header.
    pub arg_count: u32,
    /// Global sequence number (`reference base + slot index`).
    pub sequence: u64,
}

impl EventHeader {
    /// Writes the header into the first [`HEADER_SIZE`] bytes of `out`.
    pub fn encode(&self, out: &mut [u8]) {
        self.kind.write_le(&mut out[0..]);
        self.length.write_le(&mut out[4..]);
        self.thread_id.write_le(&mut out[8..]);
        self.arg_count.write_le(&mut out[12..]);
        self.sequence.write_le(&mut out[16..]);
    }

    /// Reads a header, or `None` if `bytes` is too short to hold one.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            kind: i32::read_le(&bytes[0..]),
            length: u32::read_le(&bytes[4..]),
            thread_id: u32::read_le(&bytes[8..]),
            arg_count: u32::read_le(&bytes[12..]),
            sequence: u64::read_le(&bytes[16..]),
        })
    }
}

/// One fixed-size storage unit for a single event record.
#[derive(Clone, Copy)]
#[repr(C, align(8))]
pub struct EventSlot {
    bytes: [u8; MAX_MSG_LEN],
}

impl EventSlot {
    pub const EMPTY: Self = Self {
        bytes: [0; MAX_MSG_LEN],
    };

    pub fn as_bytes(&self) -> &[u8; MAX_MSG_LEN] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; MAX_MSG_LEN] {
        &mut self.bytes
    }

    /// Decodes the header currently stored in the slot.
    pub fn header(&self) -> EventHeader {
        EventHeader::decode(&self.bytes).unwrap_or_default()
    }
}

impl Default for EventSlot {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for EventSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSlot")
            .field("header", &self.header())
            .finish()
    }
}

/// Appends typed fields to a slot.
///
/// The encoder never writes past the end of its slot. A field that does not
/// fit marks the record as overflowed and every later push is ignored, so
/// [`encode_record`] can replace the record with an [`EVT_MSGLOST`] marker.
pub struct RecordEncoder<'a> {
    buf: &'a mut [u8],
    pos: usize,
    arg_count: u32,
    overflowed: bool,
}

impl<'a> RecordEncoder<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            pos: HEADER_SIZE,
            arg_count: 0,
            overflowed: false,
        }
    }

    /// Appends a fixed-width scalar field.
    pub fn push_scalar<T: Scalar>(&mut self, value: T) {
        if self.overflowed {
            return;
        }
        let prefix_at = align_up(self.pos, PREFIX_SIZE);
        let payload_at = align_up(prefix_at + PREFIX_SIZE, payload_align(T::SIZE));
        let end = payload_at + T::SIZE;
        if end > self.buf.len() {
            self.overflowed = true;
            return;
        }

        self.buf[self.pos..payload_at].fill(0);
        (T::SIZE as i32).write_le(&mut self.buf[prefix_at..]);
        value.write_le(&mut self.buf[payload_at..]);
        self.pos = end;
        self.arg_count += 1;
    }

    /// Appends a variable-length field of `len` bytes filled in place by `fill`.
    pub fn push_blob_with<F>(&mut self, len: usize, fill: F)
    where
        F: FnOnce(&mut [u8]),
    {
        if self.overflowed {
            return;
        }
        let prefix_at = align_up(self.pos, PREFIX_SIZE);
        let payload_at = prefix_at + PREFIX_SIZE;
        let end = payload_at + len + 1;
        if end > self.buf.len() {
            self.overflowed = true;
            return;
        }

        self.buf[self.pos..prefix_at].fill(0);
        let total = (PREFIX_SIZE + len + 1) as i32;
        (-total).write_le(&mut self.buf[prefix_at..]);
        fill(&mut self.buf[payload_at..payload_at + len]);
        self.buf[payload_at + len] = 0;
        self.pos = end;
        self.arg_count += 1;
    }

    /// Appends a raw byte blob.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.push_blob_with(bytes.len(), |dst| dst.copy_from_slice(bytes));
    }

    /// Appends a string. Strings must not contain interior NUL bytes.
    pub fn push_str(&mut self, text: &str) {
        self.push_bytes(text.as_bytes());
    }

    /// Bytes used so far, header included.
    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.arg_count == 0
    }

    pub fn arg_count(&self) -> u32 {
        self.arg_count
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }
}

/// Encodes a complete record into `slot`.
///
/// Returns `false` when the slot now holds an [`EVT_MSGLOST`] marker naming
/// `kind` instead: either the fields did not fit, or `kind` is [`EVT_EOF`],
/// which would end the stream early if it were stored.
pub fn encode_record<F>(
    slot: &mut EventSlot,
    kind: i32,
    thread_id: u32,
    sequence: u64,
    fill: F,
) -> bool
where
    F: FnOnce(&mut RecordEncoder<'_>),
{
    let encoded = if kind == EVT_EOF {
        None
    } else {
        let mut encoder = RecordEncoder::new(&mut slot.bytes);
        fill(&mut encoder);
        (!encoder.overflowed).then_some((encoder.pos, encoder.arg_count))
    };

    if let Some((length, arg_count)) = encoded {
        EventHeader {
            kind,
            length: length as u32,
            thread_id,
            arg_count,
            sequence,
        }
        .encode(&mut slot.bytes);
        return true;
    }

    let (length, arg_count) = {
        let mut marker = RecordEncoder::new(&mut slot.bytes);
        marker.push_scalar(kind);
        (marker.pos, marker.arg_count)
    };
    EventHeader {
        kind: EVT_MSGLOST,
        length: length as u32,
        thread_id,
        arg_count,
        sequence,
    }
    .encode(&mut slot.bytes);
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = EventHeader {
            kind: -1,
            length: 48,
            thread_id: 7,
            arg_count: 2,
            sequence: 0x0102_0304_0506_0708,
        };
        let mut buf = [0u8; HEADER_SIZE];
        header.encode(&mut buf);

        assert_eq!(&buf[0..4], &(-1i32).to_le_bytes());
        assert_eq!(&buf[4..8], &48u32.to_le_bytes());
        assert_eq!(&buf[16..24], &0x0102_0304_0506_0708u64.to_le_bytes());
        assert_eq!(EventHeader::decode(&buf), Some(header));
        assert_eq!(EventHeader::decode(&buf[..10]), None);
    }

    #[test]
    fn test_scalar_alignment() {
        let mut slot = EventSlot::EMPTY;
        assert!(encode_record(&mut slot, 5, 1, 0, |enc| {
            enc.push_scalar(3i32);
            enc.push_scalar(2.5f64);
        }));

        let bytes = slot.as_bytes();
        // i32: prefix at 24, payload at 28
        assert_eq!(&bytes[24..28], &4i32.to_le_bytes());
        assert_eq!(&bytes[28..32], &3i32.to_le_bytes());
        // f64: prefix at 32, payload padded to 40
        assert_eq!(&bytes[32..36], &8i32.to_le_bytes());
        assert_eq!(&bytes[40..48], &2.5f64.to_le_bytes());
        assert_eq!(slot.header().length, 48);
        assert_eq!(slot.header().arg_count, 2);
    }

    #[test]
    fn test_blob_prefix_is_negative() {
        let mut slot = EventSlot::EMPTY;
        encode_record(&mut slot, 5, 1, 0, |enc| enc.push_str("abc"));

        let bytes = slot.as_bytes();
        // prefix + "abc" + terminator
        assert_eq!(&bytes[24..28], &(-8i32).to_le_bytes());
        assert_eq!(&bytes[28..31], b"abc");
        assert_eq!(bytes[31], 0);
        assert_eq!(slot.header().length, 32);
    }

    #[test]
    fn test_overflow_becomes_lost_marker() {
        let mut slot = EventSlot::EMPTY;
        let big = vec![b'x'; MAX_MSG_LEN];
        let stored = encode_record(&mut slot, EVT_PRINTF, 9, 41, |enc| {
            enc.push_str("prefix");
            enc.push_bytes(&big);
            enc.push_scalar(1i32);
        });

        assert!(!stored);
        let header = slot.header();
        assert_eq!(header.kind, EVT_MSGLOST);
        assert_eq!(header.thread_id, 9);
        assert_eq!(header.sequence, 41);
        assert_eq!(header.arg_count, 1);
        assert_eq!(&slot.as_bytes()[28..32], &EVT_PRINTF.to_le_bytes());
    }

    #[test]
    fn test_eof_kind_stored_as_lost_marker() {
        let mut slot = EventSlot::EMPTY;
        let stored = encode_record(&mut slot, EVT_EOF, 2, 7, |enc| enc.push_scalar(1i32));

        assert!(!stored);
        let header = slot.header();
        assert_eq!(header.kind, EVT_MSGLOST);
        assert_eq!(header.sequence, 7);
        assert_eq!(&slot.as_bytes()[28..32], &EVT_EOF.to_le_bytes());
    }

    #[test]
    fn test_exact_fit() {
        let mut slot = EventSlot::EMPTY;
        // header(24) + prefix(4) + payload + terminator fills the slot
        let payload = vec![b'y'; MAX_MSG_LEN - HEADER_SIZE - PREFIX_SIZE - 1];
        assert!(encode_record(&mut slot, 3, 0, 0, |enc| enc.push_bytes(&payload)));
        assert_eq!(slot.header().length as usize, MAX_MSG_LEN);
    }
}
