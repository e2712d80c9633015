//! Writers that consume drained generations.
//!
//! A [`Writer`] receives one [`EventStream`] per non-empty generation and
//! must read it to the end. The sinks share one drain loop: messages are
//! rendered and echoed, every other event is persisted (by the binary sink)
//! and summarised on the echo channel, and dropped-record counts are reported
//! through `tracing` rather than treated as failures.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::body::Body;
use crate::config::SinkSpec;
use crate::decoder::EventStream;
use crate::formatter::format_message;
use crate::record_format::{align_up, EVT_EOF};

/// Consumer of drained generations.
///
/// Implementations determine what happens with records after a flush, such
/// as writing them to disk or echoing them to a terminal. The flush
/// coordinator never retries a generation: once `process` returns, the
/// records are gone, whatever the result.
///
/// # Usage
///
/// ```
/// # use device_event_log::{EventStream, Writer};
/// # use std::io;
/// // Counts events without keeping them
/// #[derive(Default)]
/// struct Counter(usize);
///
/// impl Writer for Counter {
///     fn process(&mut self, stream: &mut EventStream<'_>) -> io::Result<()> {
///         self.0 += stream.event_count();
///         while stream.advance() != 0 {}
///         Ok(())
///     }
/// }
/// ```
pub trait Writer {
    /// Consumes every record of `stream`.
    fn process(&mut self, stream: &mut EventStream<'_>) -> io::Result<()>;
}

impl<W: Writer + ?Sized> Writer for Box<W> {
    fn process(&mut self, stream: &mut EventStream<'_>) -> io::Result<()> {
        (**self).process(stream)
    }
}

const ZERO_PAD: [u8; 8] = [0; 8];

/// The drain loop shared by the built-in sinks.
///
/// `events` receives the raw non-message records, `echo` the console lines.
fn drain(
    stream: &mut EventStream<'_>,
    mut events: Option<&mut dyn Write>,
    mut echo: Option<&mut dyn Write>,
) -> io::Result<()> {
    while stream.advance() != EVT_EOF {
        let record = stream.record();
        let header = record.header();

        if let Some(text) = format_message(record) {
            if let Some(out) = echo.as_deref_mut() {
                writeln!(
                    out,
                    "[Event #{} from thread {}]: {}",
                    header.sequence,
                    header.thread_id,
                    text.trim_end_matches('\n')
                )?;
            }
            continue;
        }

        let raw = stream.raw_record();
        if let Some(out) = events.as_deref_mut() {
            out.write_all(raw)?;
            let padded = align_up(raw.len(), 8);
            out.write_all(&ZERO_PAD[..padded - raw.len()])?;
        }
        if let Some(out) = echo.as_deref_mut() {
            writeln!(
                out,
                "[Event #{} from thread {}] EVT={}, with {} data elements ({} bytes)",
                header.sequence, header.thread_id, header.kind, header.arg_count, header.length
            )?;
        }
    }

    report_drops(stream);
    Ok(())
}

fn report_drops(stream: &EventStream<'_>) {
    let dropped_events = stream.dropped_event_count();
    if dropped_events > 0 {
        warn!("{} event records dropped", dropped_events);
    }
    let dropped_bodies = stream.dropped_body_count();
    if dropped_bodies > 0 {
        warn!("{} body records dropped", dropped_bodies);
    }
}

fn write_bodies(out: &mut dyn Write, bodies: &[Body]) -> io::Result<()> {
    let mut record = [0u8; Body::SIZE];
    for body in bodies {
        body.encode_into(&mut record);
        out.write_all(&record)?;
    }
    Ok(())
}

/// Persists events and bodies to two files and echoes messages.
///
/// Both files are appended to in drain order; see
/// [`EventFileReader`](crate::EventFileReader) and
/// [`BodyFileReader`](crate::BodyFileReader) for reading them back.
pub struct BinaryWriter {
    events: BufWriter<File>,
    bodies: BufWriter<File>,
    echo: Box<dyn Write + Send>,
    events_path: PathBuf,
    bodies_path: PathBuf,
}

impl BinaryWriter {
    /// Creates (or truncates) both output files. Console lines go to stdout.
    pub fn create(events_path: impl AsRef<Path>, bodies_path: impl AsRef<Path>) -> io::Result<Self> {
        let events_path = events_path.as_ref().to_path_buf();
        let bodies_path = bodies_path.as_ref().to_path_buf();
        debug!(
            "binary writer: events -> {}, bodies -> {}",
            events_path.display(),
            bodies_path.display()
        );
        Ok(Self {
            events: BufWriter::new(File::create(&events_path)?),
            bodies: BufWriter::new(File::create(&bodies_path)?),
            echo: Box::new(io::stdout()),
            events_path,
            bodies_path,
        })
    }

    /// Replaces the console echo channel.
    pub fn with_echo(mut self, echo: impl Write + Send + 'static) -> Self {
        self.echo = Box::new(echo);
        self
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    pub fn bodies_path(&self) -> &Path {
        &self.bodies_path
    }
}

impl Writer for BinaryWriter {
    fn process(&mut self, stream: &mut EventStream<'_>) -> io::Result<()> {
        drain(stream, Some(&mut self.events), Some(&mut self.echo))?;
        write_bodies(&mut self.bodies, stream.bodies())?;
        self.events.flush()?;
        self.bodies.flush()?;
        self.echo.flush()
    }
}

/// Echoes messages and event summaries; persists nothing.
pub struct ConsoleWriter {
    echo: Box<dyn Write + Send>,
}

impl ConsoleWriter {
    pub fn new() -> Self {
        Self::with_echo(io::stdout())
    }

    pub fn with_echo(echo: impl Write + Send + 'static) -> Self {
        Self {
            echo: Box::new(echo),
        }
    }
}

impl Default for ConsoleWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer for ConsoleWriter {
    fn process(&mut self, stream: &mut EventStream<'_>) -> io::Result<()> {
        drain(stream, None, Some(&mut self.echo))?;
        self.echo.flush()
    }
}

/// Discards every record. Drops are still reported.
#[derive(Debug, Default)]
pub struct NullWriter;

impl Writer for NullWriter {
    fn process(&mut self, stream: &mut EventStream<'_>) -> io::Result<()> {
        drain(stream, None, None)
    }
}

/// The closed set of sinks a [`LogConfig`](crate::LogConfig) can select.
pub enum Sink {
    Binary(BinaryWriter),
    Console(ConsoleWriter),
    Null(NullWriter),
}

impl Sink {
    /// Opens the sink described by `spec`.
    pub fn open(spec: &SinkSpec) -> io::Result<Sink> {
        Ok(match spec {
            SinkSpec::Binary {
                events_path,
                bodies_path,
            } => Sink::Binary(BinaryWriter::create(events_path, bodies_path)?),
            SinkSpec::Console => Sink::Console(ConsoleWriter::new()),
            SinkSpec::Null => Sink::Null(NullWriter),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Sink::Binary(_) => "binary",
            Sink::Console(_) => "console",
            Sink::Null(_) => "null",
        }
    }
}

impl Writer for Sink {
    fn process(&mut self, stream: &mut EventStream<'_>) -> io::Result<()> {
        match self {
            Sink::Binary(writer) => writer.process(stream),
            Sink::Console(writer) => writer.process(stream),
            Sink::Null(writer) => writer.process(stream),
        }
    }
}
