//! # Device Event Log
//!
//! An append-only event log for massively parallel workers, with a host-side
//! drain that turns the raw records into files and human-readable messages:
//!
//! * **Lock-free producers**: a record costs one atomic increment plus a
//!   write into a slot no other thread can touch
//! * **Bounded memory**: fixed-capacity slabs; overflow is counted and
//!   reported, never blocks
//! * **Globally ordered**: every record carries a sequence number that keeps
//!   increasing across flushes, drops included
//!
//! ## Key Features
//!
//! * Self-describing binary records of typed fields (`emit_event!`)
//! * printf-style messages rendered on the host, not by the workers (`lprintf!`)
//! * Body snapshots stored in their own slab
//! * Pluggable sinks: binary files, console echo or nothing
//!
//! ## Main Components
//!
//! * `DeviceLog`: the append buffer shared by worker threads
//! * `HostLog`: the host mirror each flush downloads into
//! * `EventLog`: the flush coordinator that keeps sequence numbers monotonic
//! * `EventStream`: forward-only decoding of one drained generation
//! * `Writer` / `Sink`: consumers of drained generations
//! * `LogManager`: configuration and the init/flush/shutdown lifecycle
//!
//! ## Quick Start
//!
//! ```
//! use device_event_log::{emit_event, lprintf, Body, EventEmitter, EventLog, Geometry, NullWriter};
//!
//! let mut log = EventLog::new(Geometry::new(1024, 256), NullWriter);
//!
//! // Workers write to the device arena concurrently
//! log.device_scope(|device| {
//!     std::thread::scope(|scope| {
//!         for thread in 0..4u32 {
//!             scope.spawn(move || {
//!                 lprintf!(device, thread, "worker %d at t=%f", thread as i32, 0.25f64);
//!                 emit_event!(device, 10, thread, 0.25f64, thread as i32);
//!                 device.emit_snapshot(&[Body::default()]);
//!             });
//!         }
//!     });
//! })?;
//!
//! // Drain everything, device records first numbered after host records
//! log.flush()?;
//! assert_eq!(log.host().ref_bases().event, 8);
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod arena;
pub mod body;
pub mod config;
pub mod decoder;
pub mod device_log;
pub mod error;
pub mod events;
pub mod flush;
pub mod formatter;
pub mod host_log;
pub mod log_reader;
pub mod loggable;
pub mod manager;
pub mod record_format;
pub mod writer;

pub use arena::{Counters, EventEmitter, Geometry, MirrorStatus, RefBases};
pub use body::Body;
pub use config::{LogConfig, SinkSpec};
pub use decoder::{EventStream, Field, Generation, RecordCursor};
pub use device_log::DeviceLog;
pub use error::{LogError, TransferError};
pub use events::{emit_ejection, emit_system_snapshot, Ejection, SystemSnapshot};
pub use flush::EventLog;
pub use formatter::{format_message, next_message, LOST_MESSAGE};
pub use host_log::HostLog;
pub use log_reader::{BodyFileReader, EventEntry, EventFileReader};
pub use loggable::Loggable;
pub use manager::{FlushFlags, LogManager};
pub use record_format::{
    EventHeader, EventSlot, RecordEncoder, EVT_EJECTION, EVT_EOF, EVT_MSGLOST, EVT_PRINTF,
    EVT_SNAPSHOT, MAX_MSG_LEN,
};
pub use writer::{BinaryWriter, ConsoleWriter, NullWriter, Sink, Writer};
