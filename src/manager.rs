use std::io;
use std::ops::BitOr;

use lazy_static::lazy_static;
use parking_lot::Mutex;
use tracing::info;

use crate::arena::MirrorStatus;
use crate::config::LogConfig;
use crate::device_log::DeviceLog;
use crate::error::LogError;
use crate::flush::EventLog;
use crate::host_log::HostLog;
use crate::writer::Sink;

/// Selects what [`LogManager::flush`] does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushFlags(u8);

impl FlushFlags {
    /// Drain both mirrors unconditionally.
    pub const MEMORY: FlushFlags = FlushFlags(0x01);
    /// Drain only if a mirror has reached capacity.
    pub const IF_FULL: FlushFlags = FlushFlags(0x02);

    pub fn contains(self, other: FlushFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl Default for FlushFlags {
    fn default() -> Self {
        FlushFlags::MEMORY
    }
}

impl BitOr for FlushFlags {
    type Output = FlushFlags;

    fn bitor(self, rhs: FlushFlags) -> FlushFlags {
        FlushFlags(self.0 | rhs.0)
    }
}

/// Owns the mirrors and the configured sink for the lifetime of a run.
///
/// # Examples
///
/// ```
/// # use device_event_log::{lprintf, FlushFlags, LogConfig, LogManager};
/// let config = LogConfig::parse("log_writer = null\nlog_host_buffer_size = 1048576")?;
/// let mut manager = LogManager::init(&config)?;
///
/// manager.device_scope(|device| lprintf!(device, 0, "hello from %s", "a worker"))?;
/// manager.flush(FlushFlags::MEMORY)?;
/// manager.shutdown()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct LogManager {
    log: EventLog<Sink>,
}

impl LogManager {
    /// Allocates both mirrors and opens the configured sink.
    pub fn init(config: &LogConfig) -> Result<Self, LogError> {
        let sink = Sink::open(&config.writer)?;
        let manager = Self::with_sink(config, sink);
        let geometry = manager.log.host().geometry();
        info!(
            "event log initialized: {} writer, {} event slots, {} body slots",
            manager.log.writer().name(),
            geometry.event_capacity,
            geometry.body_capacity
        );
        Ok(manager)
    }

    /// Like [`LogManager::init`], with an already opened sink.
    pub fn with_sink(config: &LogConfig, sink: Sink) -> Self {
        Self {
            log: EventLog::new(config.geometry(), sink),
        }
    }

    /// Drains pending records as selected by `flags`.
    ///
    /// Returns whether anything was drained.
    pub fn flush(&mut self, flags: FlushFlags) -> io::Result<bool> {
        if flags.contains(FlushFlags::MEMORY) {
            self.log.flush()?;
            return Ok(true);
        }
        if flags.contains(FlushFlags::IF_FULL) {
            return self.log.flush_if_needed(false);
        }
        Ok(false)
    }

    /// Drains everything still pending and releases the mirrors and the sink.
    pub fn shutdown(mut self) -> io::Result<()> {
        let result = self.log.flush();
        let next = self.log.host().ref_bases();
        info!(
            "event log shut down after {} events and {} bodies",
            next.event, next.body
        );
        result
    }

    pub fn device(&self) -> MirrorStatus {
        self.log.device()
    }

    pub fn host(&self) -> MirrorStatus {
        self.log.host()
    }

    /// See [`EventLog::device_scope`].
    pub fn device_scope<R, F>(&mut self, work: F) -> io::Result<R>
    where
        F: FnOnce(&DeviceLog) -> R,
    {
        self.log.device_scope(work)
    }

    /// See [`EventLog::host_for_write`].
    pub fn host_for_write(&mut self) -> io::Result<&HostLog> {
        self.log.host_for_write()
    }

    pub fn event_log(&self) -> &EventLog<Sink> {
        &self.log
    }

    pub fn event_log_mut(&mut self) -> &mut EventLog<Sink> {
        &mut self.log
    }
}

lazy_static! {
    /// The process-wide log. `None` before `init` and after `shutdown`.
    static ref DEFAULT_LOG: Mutex<Option<LogManager>> = Mutex::new(None);
}

/// Initializes the process-wide log.
///
/// Fails with [`LogError::AlreadyInitialized`] if it is already running.
pub fn init(config: &LogConfig) -> Result<(), LogError> {
    let mut slot = DEFAULT_LOG.lock();
    if slot.is_some() {
        return Err(LogError::AlreadyInitialized);
    }
    *slot = Some(LogManager::init(config)?);
    Ok(())
}

pub fn is_initialized() -> bool {
    DEFAULT_LOG.lock().is_some()
}

/// Runs `f` with the process-wide log locked.
///
/// # Panics
///
/// Panics if called before [`init`] or after [`shutdown`].
pub fn with_default_log<R>(f: impl FnOnce(&mut LogManager) -> R) -> R {
    let mut slot = DEFAULT_LOG.lock();
    match slot.as_mut() {
        Some(manager) => f(manager),
        None => panic!("default event log used before init() or after shutdown()"),
    }
}

/// Flushes the process-wide log. Panics if it is not initialized.
pub fn flush(flags: FlushFlags) -> io::Result<bool> {
    with_default_log(|manager| manager.flush(flags))
}

/// Drains and tears down the process-wide log.
///
/// # Panics
///
/// Panics if the log is not initialized.
pub fn shutdown() -> io::Result<()> {
    let manager = DEFAULT_LOG.lock().take();
    match manager {
        Some(manager) => manager.shutdown(),
        None => panic!("default event log shut down before init() or twice"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let both = FlushFlags::MEMORY | FlushFlags::IF_FULL;
        assert!(both.contains(FlushFlags::MEMORY));
        assert!(both.contains(FlushFlags::IF_FULL));
        assert!(!FlushFlags::IF_FULL.contains(FlushFlags::MEMORY));
        assert_eq!(FlushFlags::default().bits(), 0x01);
    }
}
