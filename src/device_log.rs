use crate::arena::{Arena, Counters, EventEmitter, Geometry, MirrorStatus, RefBases};
use crate::body::Body;
use crate::error::TransferError;
use crate::host_log::HostLog;
use crate::record_format::RecordEncoder;

/// The device-side append buffer.
///
/// Shared by reference with every worker thread between flushes. Workers
/// only ever append; the host reads it back through [`DeviceLog::download_into`],
/// which requires exclusive access and therefore cannot overlap a write.
///
/// # Examples
///
/// ```
/// use device_event_log::{lprintf, DeviceLog, Geometry};
///
/// let device = DeviceLog::new(Geometry::new(64, 16));
/// std::thread::scope(|scope| {
///     for thread in 0..4u32 {
///         let device = &device;
///         scope.spawn(move || {
///             lprintf!(device, thread, "thread %d checking in", thread as i32);
///         });
///     }
/// });
/// assert_eq!(device.counters().events, 4);
/// ```
pub struct DeviceLog {
    arena: Arena,
    ref_bases: RefBases,
}

impl DeviceLog {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            arena: Arena::new(geometry),
            ref_bases: RefBases::default(),
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.arena.geometry()
    }

    /// Atomically claims the next event slot and returns its index.
    ///
    /// The index may lie past capacity; such a slot is counted as dropped.
    pub fn reserve_event_slot(&self) -> usize {
        self.arena.reserve_event_slot()
    }

    /// Atomically claims the next body slot and returns its index.
    pub fn reserve_body_slot(&self) -> usize {
        self.arena.reserve_body_slots(1)
    }

    /// Atomically claims `count` consecutive body slots and returns the first index.
    pub fn reserve_body_slots(&self, count: usize) -> usize {
        self.arena.reserve_body_slots(count)
    }

    /// Current counter values, as the host would download them.
    pub fn counters(&self) -> Counters {
        self.arena.counters()
    }

    /// Reference bases the device stamps on new records.
    pub fn ref_bases(&self) -> RefBases {
        self.ref_bases
    }

    pub fn is_over_threshold(&self) -> bool {
        self.arena.is_over_threshold()
    }

    /// Snapshot of geometry, counters and reference bases.
    pub fn status(&self) -> MirrorStatus {
        MirrorStatus::new(self.geometry(), self.counters(), self.ref_bases)
    }

    pub(crate) fn upload_ref_bases(&mut self, ref_bases: RefBases) {
        self.ref_bases = ref_bases;
    }

    pub(crate) fn upload_counters(&mut self, counters: Counters) {
        self.arena.set_counters(counters);
    }

    /// Copies counters, events and bodies into `host`, overwriting its generation.
    pub(crate) fn download_into(&mut self, host: &mut HostLog) -> Result<(), TransferError> {
        host.arena_mut().copy_from(&mut self.arena)
    }
}

impl EventEmitter for DeviceLog {
    #[inline]
    fn emit_with<F>(&self, kind: i32, thread_id: u32, fill: F) -> Option<u64>
    where
        F: FnOnce(&mut RecordEncoder<'_>),
    {
        self.arena.emit_with(self.ref_bases, kind, thread_id, fill)
    }

    fn emit_snapshot(&self, bodies: &[Body]) -> u64 {
        self.arena.emit_snapshot(self.ref_bases, bodies)
    }
}
