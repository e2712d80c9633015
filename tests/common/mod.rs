#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::Arc;

use device_event_log::{format_message, Body, EventHeader, EventStream, Writer, EVT_EOF};
use parking_lot::Mutex;

/// One record as seen by a writer.
#[derive(Debug, Clone)]
pub struct Collected {
    pub header: EventHeader,
    pub message: Option<String>,
    pub raw: Vec<u8>,
}

/// Keeps everything it is handed, for inspection after a flush.
#[derive(Debug, Default)]
pub struct CollectingWriter {
    pub records: Vec<Collected>,
    pub bodies: Vec<Body>,
    pub generations: usize,
    pub dropped_events: usize,
    pub dropped_bodies: usize,
}

impl CollectingWriter {
    pub fn sequences(&self) -> Vec<u64> {
        self.records.iter().map(|r| r.header.sequence).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records.iter().filter_map(|r| r.message.clone()).collect()
    }
}

impl Writer for CollectingWriter {
    fn process(&mut self, stream: &mut EventStream<'_>) -> io::Result<()> {
        self.generations += 1;
        while stream.advance() != EVT_EOF {
            let record = stream.record();
            let header = record.header();
            let raw = record.raw().to_vec();
            let message = format_message(record);
            self.records.push(Collected { header, message, raw });
        }
        self.bodies.extend_from_slice(stream.bodies());
        self.dropped_events += stream.dropped_event_count();
        self.dropped_bodies += stream.dropped_body_count();
        Ok(())
    }
}

/// Reads every record, then reports an I/O failure.
#[derive(Debug, Default)]
pub struct FailingWriter {
    pub calls: usize,
}

impl Writer for FailingWriter {
    fn process(&mut self, stream: &mut EventStream<'_>) -> io::Result<()> {
        self.calls += 1;
        while stream.advance() != EVT_EOF {}
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }
}

/// An in-memory `Write` that can be cloned into a writer and read back.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
