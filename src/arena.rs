//! Fixed-capacity slabs shared by the device append buffer and the host mirror.
//!
//! An arena holds one generation of records: an events slab, a bodies slab
//! and a pair of counters. Writers reserve a slot with a single atomic
//! post-increment and then own that slot exclusively, so the write path takes
//! no lock and never synchronises with other writers.
//!
//! Counters may run past capacity when many writers race for the last slots.
//! Those reservations still consume a sequence number but their records are
//! not stored; readers only ever look at `min(count, capacity)` slots.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::body::Body;
use crate::decoder::Generation;
use crate::error::TransferError;
use crate::record_format::{encode_record, EventSlot, RecordEncoder, MAX_MSG_LEN};

/// Capacities of one arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub event_capacity: usize,
    pub body_capacity: usize,
}

impl Geometry {
    pub const fn new(event_capacity: usize, body_capacity: usize) -> Self {
        Self {
            event_capacity,
            body_capacity,
        }
    }

    /// Splits a byte budget evenly between event slots and body records.
    pub fn for_bytes(bytes: usize) -> Self {
        let half = bytes / 2;
        Self {
            event_capacity: (half / MAX_MSG_LEN).max(1),
            body_capacity: (half / Body::SIZE).max(1),
        }
    }

    /// Bytes needed to hold both slabs.
    pub fn byte_size(&self) -> usize {
        self.event_capacity * MAX_MSG_LEN + self.body_capacity * Body::SIZE
    }
}

/// Number of records produced in the current generation, drops included.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub events: usize,
    pub bodies: usize,
}

impl Counters {
    pub fn is_empty(&self) -> bool {
        self.events == 0 && self.bodies == 0
    }
}

/// Global offsets that turn per-generation slot indices into sequence numbers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefBases {
    pub event: u64,
    pub body: u64,
}

impl RefBases {
    /// Bases for the generation that follows one with `counters` records.
    pub fn advanced_by(self, counters: Counters) -> Self {
        Self {
            event: self.event + counters.events as u64,
            body: self.body + counters.bodies as u64,
        }
    }
}

/// Point-in-time state of one mirror, for inspection only.
///
/// Holding a `MirrorStatus` grants no way to emit: records reach a mirror only
/// through the write handles of [`EventLog`](crate::EventLog).
///
/// ```compile_fail
/// # use device_event_log::{lprintf, EventLog, Geometry, NullWriter};
/// let log = EventLog::new(Geometry::new(4, 4), NullWriter);
/// lprintf!(log.device(), 0, "not a write handle");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorStatus {
    geometry: Geometry,
    counters: Counters,
    ref_bases: RefBases,
}

impl MirrorStatus {
    pub(crate) fn new(geometry: Geometry, counters: Counters, ref_bases: RefBases) -> Self {
        Self {
            geometry,
            counters,
            ref_bases,
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn ref_bases(&self) -> RefBases {
        self.ref_bases
    }

    /// True once either slab had been filled to capacity.
    pub fn is_over_threshold(&self) -> bool {
        self.counters.events >= self.geometry.event_capacity
            || self.counters.bodies >= self.geometry.body_capacity
    }
}

/// The producer interface exposed to integrators.
pub trait EventEmitter {
    /// Reserves a slot and lets `fill` append the record's fields.
    ///
    /// Returns the record's sequence number, or `None` when the slot lies past
    /// capacity and the record was dropped. A record that does not fit in
    /// one slot, or whose kind is `EVT_EOF`, is kept as an `EVT_MSGLOST`
    /// marker and still returns `Some`.
    fn emit_with<F>(&self, kind: i32, thread_id: u32, fill: F) -> Option<u64>
    where
        F: FnOnce(&mut RecordEncoder<'_>);

    /// Stores `bodies` in consecutive body slots.
    ///
    /// Returns the sequence number of the first body. Bodies that land past
    /// capacity are dropped.
    fn emit_snapshot(&self, bodies: &[Body]) -> u64;
}

/// A fixed run of cells that concurrent writers fill at disjoint indices.
struct Slab<T> {
    cells: Box<[UnsafeCell<T>]>,
}

// SAFETY: a cell is only written through `slot_mut` by the single writer that
// reserved its index, and only read through `&mut self`.
unsafe impl<T: Send> Sync for Slab<T> {}

impl<T: Copy> Slab<T> {
    fn new(len: usize, fill: T) -> Self {
        Self {
            cells: (0..len).map(|_| UnsafeCell::new(fill)).collect(),
        }
    }

    /// # Safety
    ///
    /// The caller must hold the unique reservation for `index`.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    unsafe fn slot_mut(&self, index: usize) -> &mut T {
        &mut *self.cells[index].get()
    }

    fn as_slice(&mut self) -> &[T] {
        // SAFETY: UnsafeCell<T> has the layout of T and `&mut self` excludes writers.
        unsafe { std::slice::from_raw_parts(self.cells.as_ptr() as *const T, self.cells.len()) }
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as above.
        unsafe {
            std::slice::from_raw_parts_mut(self.cells.as_mut_ptr() as *mut T, self.cells.len())
        }
    }
}

pub(crate) struct Arena {
    geometry: Geometry,
    events: Slab<EventSlot>,
    bodies: Slab<Body>,
    event_count: CachePadded<AtomicUsize>,
    body_count: CachePadded<AtomicUsize>,
}

impl Arena {
    pub(crate) fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            events: Slab::new(geometry.event_capacity, EventSlot::EMPTY),
            bodies: Slab::new(geometry.body_capacity, Body::default()),
            event_count: CachePadded::new(AtomicUsize::new(0)),
            body_count: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn geometry(&self) -> Geometry {
        self.geometry
    }

    // Relaxed is enough: the host only reads slots after the writers have
    // been joined, which already orders their writes before the read.
    #[inline]
    pub(crate) fn reserve_event_slot(&self) -> usize {
        self.event_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn reserve_body_slots(&self, count: usize) -> usize {
        self.body_count.fetch_add(count, Ordering::Relaxed)
    }

    pub(crate) fn counters(&self) -> Counters {
        Counters {
            events: self.event_count.load(Ordering::Relaxed),
            bodies: self.body_count.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn set_counters(&mut self, counters: Counters) {
        self.event_count.store(counters.events, Ordering::Relaxed);
        self.body_count.store(counters.bodies, Ordering::Relaxed);
    }

    /// True once either slab has been filled to capacity.
    pub(crate) fn is_over_threshold(&self) -> bool {
        let counters = self.counters();
        counters.events >= self.geometry.event_capacity
            || counters.bodies >= self.geometry.body_capacity
    }

    pub(crate) fn emit_with<F>(&self, bases: RefBases, kind: i32, thread_id: u32, fill: F) -> Option<u64>
    where
        F: FnOnce(&mut RecordEncoder<'_>),
    {
        let index = self.reserve_event_slot();
        if index >= self.geometry.event_capacity {
            return None;
        }
        let sequence = bases.event + index as u64;

        // SAFETY: `index` came from the atomic counter, so no other writer holds it.
        let slot = unsafe { self.events.slot_mut(index) };
        encode_record(slot, kind, thread_id, sequence, fill);
        Some(sequence)
    }

    pub(crate) fn emit_snapshot(&self, bases: RefBases, bodies: &[Body]) -> u64 {
        let start = self.reserve_body_slots(bodies.len());
        let stored = self.geometry.body_capacity.saturating_sub(start).min(bodies.len());
        for (offset, body) in bodies[..stored].iter().enumerate() {
            // SAFETY: the whole range [start, start + len) was reserved above.
            unsafe { *self.bodies.slot_mut(start + offset) = *body };
        }
        bases.body + start as u64
    }

    /// Read-only view of the current generation.
    pub(crate) fn generation(&mut self) -> Generation<'_> {
        let counters = self.counters();
        Generation::new(self.events.as_slice(), self.bodies.as_slice(), counters)
    }

    /// Overwrites this arena with the counters and occupied slots of `source`.
    pub(crate) fn copy_from(&mut self, source: &mut Arena) -> Result<(), TransferError> {
        if self.geometry != source.geometry {
            return Err(TransferError {
                device: source.geometry,
                host: self.geometry,
            });
        }

        let counters = source.counters();
        let events = counters.events.min(self.geometry.event_capacity);
        let bodies = counters.bodies.min(self.geometry.body_capacity);
        self.events.as_mut_slice()[..events].copy_from_slice(&source.events.as_slice()[..events]);
        self.bodies.as_mut_slice()[..bodies].copy_from_slice(&source.bodies.as_slice()[..bodies]);
        self.set_counters(counters);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_for_bytes() {
        let geometry = Geometry::for_bytes(2 * 1024 * 1024);
        assert_eq!(geometry.event_capacity, 1024);
        assert_eq!(geometry.body_capacity, 1024 * 1024 / Body::SIZE);
        assert!(geometry.byte_size() <= 2 * 1024 * 1024);

        let tiny = Geometry::for_bytes(0);
        assert_eq!(tiny, Geometry::new(1, 1));
    }

    #[test]
    fn test_reservation_past_capacity() {
        let arena = Arena::new(Geometry::new(2, 2));
        let bases = RefBases { event: 100, body: 0 };
        assert_eq!(arena.emit_with(bases, 1, 0, |_| {}), Some(100));
        assert_eq!(arena.emit_with(bases, 1, 0, |_| {}), Some(101));
        assert_eq!(arena.emit_with(bases, 1, 0, |_| {}), None);
        assert_eq!(arena.counters().events, 3);
        assert!(arena.is_over_threshold());
    }

    #[test]
    fn test_snapshot_partially_stored() {
        let mut arena = Arena::new(Geometry::new(1, 3));
        let bodies: Vec<Body> = (0..5)
            .map(|i| Body { index: i, ..Body::default() })
            .collect();

        assert_eq!(arena.emit_snapshot(RefBases::default(), &bodies[..2]), 0);
        assert_eq!(arena.emit_snapshot(RefBases::default(), &bodies[2..]), 2);

        let generation = arena.generation();
        assert_eq!(generation.counters().bodies, 5);
        let stored: Vec<i32> = generation.bodies().iter().map(|b| b.index).collect();
        assert_eq!(stored, vec![0, 1, 2]);
    }

    #[test]
    fn test_copy_requires_same_geometry() {
        let mut host = Arena::new(Geometry::new(2, 2));
        let mut device = Arena::new(Geometry::new(3, 2));
        let err = host.copy_from(&mut device).unwrap_err();
        assert_eq!(err.device, Geometry::new(3, 2));
        assert_eq!(err.host, Geometry::new(2, 2));
    }
}
