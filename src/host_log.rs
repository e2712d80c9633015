use crate::arena::{Arena, Counters, EventEmitter, Geometry, MirrorStatus, RefBases};
use crate::body::Body;
use crate::decoder::Generation;
use crate::record_format::RecordEncoder;

/// Host-memory mirror of the device append buffer.
///
/// Host-side integrators write here directly; during a flush it also receives
/// the downloaded device generation. The host mirror owns the authoritative
/// reference bases.
pub struct HostLog {
    arena: Arena,
    ref_bases: RefBases,
}

impl HostLog {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            arena: Arena::new(geometry),
            ref_bases: RefBases::default(),
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.arena.geometry()
    }

    pub fn counters(&self) -> Counters {
        self.arena.counters()
    }

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

    /// Read-only view of the records currently held by the mirror.
    pub fn generation(&mut self) -> Generation<'_> {
        self.arena.generation()
    }

    /// Moves the reference bases past the current generation.
    pub(crate) fn advance_ref_bases(&mut self) {
        self.ref_bases = self.ref_bases.advanced_by(self.counters());
    }

    pub(crate) fn reset_counters(&mut self) {
        self.arena.set_counters(Counters::default());
    }

    pub(crate) fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }
}

impl EventEmitter for HostLog {
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
