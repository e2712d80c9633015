//! Moving generations from the mirrors to the writer.
//!
//! Between flushes exactly one mirror is the one being written: either the
//! host mirror, written directly by host code, or the device arena, written
//! concurrently by worker threads. `last_written_on_device` records which.
//!
//! Sequence numbers stay globally increasing because the host mirror owns the
//! reference bases: before the device may be written it receives the bases
//! just past everything already on the host, and every drain advances the
//! bases by the generation's produced count, dropped records included.

use std::io;

use tracing::{debug, trace};

use crate::arena::{Counters, Geometry, MirrorStatus};
use crate::device_log::DeviceLog;
use crate::host_log::HostLog;
use crate::writer::Writer;

/// The pair of mirrors plus the writer that drains them.
pub struct EventLog<W: Writer> {
    host: HostLog,
    device: DeviceLog,
    writer: W,
    last_written_on_device: bool,
}

impl<W: Writer> EventLog<W> {
    /// Allocates both mirrors with the same `geometry`.
    pub fn new(geometry: Geometry, writer: W) -> Self {
        Self::with_mirrors(HostLog::new(geometry), DeviceLog::new(geometry), writer)
    }

    /// Builds a log from existing mirrors.
    ///
    /// The mirrors are not checked against each other here; a geometry
    /// mismatch surfaces as a fatal transfer failure on the first flush that
    /// downloads the device.
    ///
    /// # Panics
    ///
    /// Panics if `device` already holds records: the host starts out as the
    /// write target, so they could never be drained.
    pub fn with_mirrors(host: HostLog, device: DeviceLog, writer: W) -> Self {
        assert_device_empty(&device);
        Self {
            host,
            device,
            writer,
            last_written_on_device: false,
        }
    }

    /// State of the host mirror. Host records are emitted through
    /// [`EventLog::host_for_write`].
    pub fn host(&self) -> MirrorStatus {
        self.host.status()
    }

    /// State of the device arena. Device records are emitted through
    /// [`EventLog::device_for_write`] or [`EventLog::device_scope`].
    pub fn device(&self) -> MirrorStatus {
        self.device.status()
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// True if the device was the last mirror handed out for writing.
    pub fn last_written_on_device(&self) -> bool {
        self.last_written_on_device
    }

    /// Makes the device arena the write target.
    ///
    /// Pushes the reference bases just past the host's pending records so that
    /// device records are numbered after them. Idempotent.
    pub fn prepare_for_device_write(&mut self) {
        if self.last_written_on_device {
            return;
        }
        assert_device_empty(&self.device);
        let bases = self.host.ref_bases().advanced_by(self.host.counters());
        self.device.upload_ref_bases(bases);
        self.last_written_on_device = true;
    }

    /// Prepares the device and borrows it for a round of worker writes.
    pub fn device_for_write(&mut self) -> &DeviceLog {
        self.prepare_for_device_write();
        &self.device
    }

    /// Makes the host mirror the write target.
    ///
    /// If the device was written last, its records are drained first so that
    /// nothing remains on the device once host code starts writing.
    pub fn prepare_for_host_write(&mut self) -> io::Result<()> {
        if !self.last_written_on_device {
            return Ok(());
        }
        self.flush()
    }

    /// Prepares the host and borrows it for direct writes.
    pub fn host_for_write(&mut self) -> io::Result<&HostLog> {
        self.prepare_for_host_write()?;
        Ok(&self.host)
    }

    /// Runs `work` against the device arena, then flushes if either mirror
    /// filled up.
    ///
    /// `work` typically spawns scoped worker threads; they are all joined by
    /// the time it returns, so the arena is quiescent when it is drained.
    ///
    /// # Examples
    ///
    /// ```
    /// # use device_event_log::{lprintf, EventLog, Geometry, NullWriter};
    /// let mut log = EventLog::new(Geometry::new(128, 16), NullWriter);
    /// log.device_scope(|device| {
    ///     std::thread::scope(|scope| {
    ///         for thread in 0..8u32 {
    ///             scope.spawn(move || lprintf!(device, thread, "step %d", thread as i32));
    ///         }
    ///     });
    /// })?;
    /// assert_eq!(log.device().counters().events, 8);
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn device_scope<R, F>(&mut self, work: F) -> io::Result<R>
    where
        F: FnOnce(&DeviceLog) -> R,
    {
        self.prepare_for_device_write();
        let result = work(&self.device);
        self.flush_if_needed(false)?;
        Ok(result)
    }

    /// True if the device arena has filled either of its slabs.
    pub fn needs_device_flush(&self) -> bool {
        self.device.is_over_threshold()
    }

    /// Flushes when the host mirror, or unless `host_only` the device arena,
    /// is at capacity. Returns whether a flush ran.
    pub fn flush_if_needed(&mut self, host_only: bool) -> io::Result<bool> {
        let needs_flush =
            self.host.is_over_threshold() || (!host_only && self.needs_device_flush());
        if !needs_flush {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    /// Drains every pending record to the writer.
    ///
    /// Host records are drained before device records. Afterwards both
    /// mirrors are empty and the host is the write target. An I/O error from
    /// the writer is returned only once this accounting has completed; the
    /// generation is not retried.
    ///
    /// # Panics
    ///
    /// Panics if the device generation cannot be copied into the host mirror,
    /// or if the device holds records while the host is the write target.
    pub fn flush(&mut self) -> io::Result<()> {
        let mut result = Ok(());

        if self.last_written_on_device {
            result = result.and(self.drain_host("host"));
            self.host.advance_ref_bases();

            if let Err(err) = self.device.download_into(&mut self.host) {
                panic!("fatal: failed to download the device event log: {}", err);
            }
            result = result.and(self.drain_host("device"));
        } else {
            assert_device_empty(&self.device);
            result = result.and(self.drain_host("host"));
        }

        self.host.advance_ref_bases();
        self.host.reset_counters();
        self.device.upload_counters(Counters::default());
        self.last_written_on_device = false;
        trace!(
            "flush complete, next event sequence {}",
            self.host.ref_bases().event
        );
        result
    }

    /// Hands the host mirror's current generation to the writer.
    fn drain_host(&mut self, origin: &str) -> io::Result<()> {
        let generation = self.host.generation();
        if generation.is_empty() {
            return Ok(());
        }
        let counters = generation.counters();
        debug!(
            "draining {} generation: {} events, {} bodies",
            origin, counters.events, counters.bodies
        );
        let mut stream = generation.stream();
        self.writer.process(&mut stream)
    }
}

/// Records on the device while the host is the write target would be
/// discarded by the next flush without being counted.
fn assert_device_empty(device: &DeviceLog) {
    let counters = device.counters();
    assert!(
        counters.is_empty(),
        "fatal: device arena holds {} events and {} bodies while the host is the write target",
        counters.events,
        counters.bodies
    );
}
