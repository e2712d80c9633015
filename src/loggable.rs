use crate::body::Body;
use crate::record_format::RecordEncoder;

/// A value that can be written as one typed field of an event record.
///
/// Numbers become fixed-width scalar fields; strings, byte slices and body
/// arrays become variable-length blobs.
pub trait Loggable {
    /// Appends `self` to the record being built.
    fn encode(&self, encoder: &mut RecordEncoder<'_>);
}

macro_rules! impl_loggable_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl Loggable for $t {
                #[inline]
                fn encode(&self, encoder: &mut RecordEncoder<'_>) {
                    encoder.push_scalar(*self);
                }
            }
        )*
    };
}

impl_loggable_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Loggable for bool {
    fn encode(&self, encoder: &mut RecordEncoder<'_>) {
        encoder.push_scalar(*self as i32);
    }
}

impl Loggable for usize {
    fn encode(&self, encoder: &mut RecordEncoder<'_>) {
        encoder.push_scalar(*self as u64);
    }
}

impl Loggable for isize {
    fn encode(&self, encoder: &mut RecordEncoder<'_>) {
        encoder.push_scalar(*self as i64);
    }
}

impl Loggable for str {
    fn encode(&self, encoder: &mut RecordEncoder<'_>) {
        encoder.push_str(self);
    }
}

impl Loggable for String {
    fn encode(&self, encoder: &mut RecordEncoder<'_>) {
        encoder.push_str(self);
    }
}

impl Loggable for [u8] {
    fn encode(&self, encoder: &mut RecordEncoder<'_>) {
        encoder.push_bytes(self);
    }
}

impl Loggable for Body {
    fn encode(&self, encoder: &mut RecordEncoder<'_>) {
        encoder.push_blob_with(Body::SIZE, |dst| self.encode_into(dst));
    }
}

impl Loggable for [Body] {
    fn encode(&self, encoder: &mut RecordEncoder<'_>) {
        encoder.push_blob_with(self.len() * Body::SIZE, |dst| {
            for (body, out) in self.iter().zip(dst.chunks_exact_mut(Body::SIZE)) {
                body.encode_into(out);
            }
        });
    }
}

impl<T: Loggable + ?Sized> Loggable for &T {
    #[inline]
    fn encode(&self, encoder: &mut RecordEncoder<'_>) {
        (**self).encode(encoder);
    }
}

/// Emits an event built from a list of [`Loggable`] arguments.
///
/// Works with anything implementing [`EventEmitter`](crate::EventEmitter),
/// i.e. both the device arena and the host mirror. Returns the record's
/// global sequence number, or `None` if the buffer was already full.
///
/// ```
/// # use device_event_log::{emit_event, DeviceLog, Geometry};
/// let device = DeviceLog::new(Geometry::new(4, 4));
/// let seq = emit_event!(device, 7, 0, 1.5f64, 42i32, "tag");
/// assert_eq!(seq, Some(0));
/// ```
#[macro_export]
macro_rules! emit_event {
    ($log:expr, $kind:expr, $thread:expr $(, $arg:expr)* $(,)?) => {{
        use $crate::EventEmitter as _;
        $log.emit_with($kind, $thread, |_encoder: &mut $crate::RecordEncoder<'_>| {
            $( $crate::Loggable::encode(&$arg, _encoder); )*
        })
    }};
}

/// Emits a printf-style message rendered later by the host.
///
/// ```
/// # use device_event_log::{lprintf, DeviceLog, Geometry};
/// let device = DeviceLog::new(Geometry::new(4, 4));
/// lprintf!(device, 3, "body %d at %f,%f", 3i32, 1.5f64, -2.25f64);
/// assert_eq!(device.counters().events, 1);
/// ```
#[macro_export]
macro_rules! lprintf {
    ($log:expr, $thread:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::emit_event!($log, $crate::record_format::EVT_PRINTF, $thread, $fmt $(, $arg)*)
    };
}
