//! Structured events emitted by integrators.
//!
//! Besides free-form messages, integrators log two kinds of records with a
//! fixed schema: a snapshot of a whole system and the ejection of one body.
//! Each schema is written by one `emit_*` function and read back by the
//! matching `decode`, so the field order lives in exactly one place.

use std::fmt;

use crate::arena::EventEmitter;
use crate::body::Body;
use crate::decoder::RecordCursor;
use crate::loggable::Loggable;
use crate::record_format::{EVT_EJECTION, EVT_SNAPSHOT};

/// Logs the state of every body of `system` at `time`.
///
/// The bodies travel inline in the event record, so a snapshot holds at most
/// nine bodies; larger systems become a lost-message marker. Use
/// [`EventEmitter::emit_snapshot`] for the body slab instead.
pub fn emit_system_snapshot<L: EventEmitter + ?Sized>(
    log: &L,
    thread_id: u32,
    time: f64,
    system: i32,
    flags: i32,
    bodies: &[Body],
) -> Option<u64> {
    log.emit_with(EVT_SNAPSHOT, thread_id, |encoder| {
        time.encode(encoder);
        system.encode(encoder);
        flags.encode(encoder);
        (bodies.len() as i32).encode(encoder);
        bodies.encode(encoder);
    })
}

/// Logs that `body` left `system` at `time`.
pub fn emit_ejection<L: EventEmitter + ?Sized>(
    log: &L,
    thread_id: u32,
    time: f64,
    system: i32,
    body: &Body,
) -> Option<u64> {
    log.emit_with(EVT_EJECTION, thread_id, |encoder| {
        time.encode(encoder);
        system.encode(encoder);
        body.encode(encoder);
    })
}

/// A decoded [`EVT_SNAPSHOT`] record.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemSnapshot {
    pub sequence: u64,
    pub time: f64,
    pub system: i32,
    pub flags: i32,
    pub bodies: Vec<Body>,
}

impl SystemSnapshot {
    /// Decodes `record`, or returns `None` if it is not a snapshot.
    pub fn decode(record: &mut RecordCursor<'_>) -> Option<Self> {
        if record.kind() != EVT_SNAPSHOT {
            return None;
        }
        let time = record.read_scalar::<f64>();
        let system = record.read_scalar::<i32>();
        let flags = record.read_scalar::<i32>();
        let count = record.read_scalar::<i32>().max(0) as usize;
        let bodies: Vec<Body> = Body::decode_all(record.read_blob()).collect();
        assert_eq!(
            bodies.len(),
            count,
            "Programmer error: snapshot declares {} bodies but carries {}",
            count,
            bodies.len()
        );
        Some(Self {
            sequence: record.header().sequence,
            time,
            system,
            flags,
            bodies,
        })
    }
}

impl fmt::Display for SystemSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, body) in self.bodies.iter().enumerate() {
            if index != 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{:>10} {}  {:>5} {:>5}  {}  {:>9.5} {:>9.5} {:>9.5}  {:>9.5} {:>9.5} {:>9.5}  {}",
                self.sequence,
                self.time,
                self.system,
                index,
                body.mass,
                body.position[0],
                body.position[1],
                body.position[2],
                body.velocity[0],
                body.velocity[1],
                body.velocity[2],
                self.flags
            )?;
        }
        Ok(())
    }
}

/// A decoded [`EVT_EJECTION`] record.
#[derive(Debug, Clone, PartialEq)]
pub struct Ejection {
    pub sequence: u64,
    pub time: f64,
    pub system: i32,
    pub body: Body,
}

impl Ejection {
    pub fn decode(record: &mut RecordCursor<'_>) -> Option<Self> {
        if record.kind() != EVT_EJECTION {
            return None;
        }
        let time = record.read_scalar::<f64>();
        let system = record.read_scalar::<i32>();
        let blob = record.read_blob();
        assert_eq!(
            blob.len(),
            Body::SIZE,
            "Programmer error: ejection carries {} body bytes",
            blob.len()
        );
        Some(Self {
            sequence: record.header().sequence,
            time,
            system,
            body: Body::decode(blob),
        })
    }
}

impl fmt::Display for Ejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>10} {}  {:>5}  {}  {:>9.5} {:>9.5} {:>9.5}  {:>9.5} {:>9.5} {:>9.5}",
            self.sequence,
            self.time,
            self.system,
            self.body.mass,
            self.body.position[0],
            self.body.position[1],
            self.body.position[2],
            self.body.velocity[0],
            self.body.velocity[1],
            self.body.velocity[2]
        )
    }
}
