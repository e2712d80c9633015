use crate::record_format::Scalar;

/// Number of auxiliary per-body attributes carried in a snapshot.
pub const BODY_ATTRIBUTES: usize = 2;

/// State of one body at the moment it was logged.
///
/// Bodies are stored in their own bounded slab, separate from event slots,
/// and persisted as fixed [`Body::SIZE`]-byte little-endian records:
///
/// ```text
/// [time(8) | system(4) | index(4) | flags(4) | pad(4) | mass(8)
///  | position(3x8) | velocity(3x8) | attributes(2x8)]
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct Body {
    pub time: f64,
    pub system: i32,
    pub index: i32,
    pub flags: i32,
    pub mass: f64,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub attributes: [f64; BODY_ATTRIBUTES],
}

impl Body {
    /// Encoded size of one body record.
    pub const SIZE: usize = 96;

    /// Writes the record into the first [`Body::SIZE`] bytes of `out`.
    pub fn encode_into(&self, out: &mut [u8]) {
        let out = &mut out[..Self::SIZE];
        self.time.write_le(&mut out[0..]);
        self.system.write_le(&mut out[8..]);
        self.index.write_le(&mut out[12..]);
        self.flags.write_le(&mut out[16..]);
        out[20..24].fill(0);
        self.mass.write_le(&mut out[24..]);
        for (axis, value) in self.position.iter().enumerate() {
            value.write_le(&mut out[32 + axis * 8..]);
        }
        for (axis, value) in self.velocity.iter().enumerate() {
            value.write_le(&mut out[56 + axis * 8..]);
        }
        for (slot, value) in self.attributes.iter().enumerate() {
            value.write_le(&mut out[80 + slot * 8..]);
        }
    }

    /// Reads a record from the first [`Body::SIZE`] bytes of `bytes`.
    pub fn decode(bytes: &[u8]) -> Self {
        let mut body = Body {
            time: f64::read_le(&bytes[0..]),
            system: i32::read_le(&bytes[8..]),
            index: i32::read_le(&bytes[12..]),
            flags: i32::read_le(&bytes[16..]),
            mass: f64::read_le(&bytes[24..]),
            ..Body::default()
        };
        for axis in 0..3 {
            body.position[axis] = f64::read_le(&bytes[32 + axis * 8..]);
            body.velocity[axis] = f64::read_le(&bytes[56 + axis * 8..]);
        }
        for slot in 0..BODY_ATTRIBUTES {
            body.attributes[slot] = f64::read_le(&bytes[80 + slot * 8..]);
        }
        body
    }

    /// Decodes every complete record in `bytes`; a trailing partial record is ignored.
    pub fn decode_all(bytes: &[u8]) -> impl Iterator<Item = Body> + '_ {
        bytes.chunks_exact(Self::SIZE).map(Body::decode)
    }

    /// Squared distance between two bodies.
    pub fn distance_squared(&self, other: &Body) -> f64 {
        self.position
            .iter()
            .zip(other.position.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_matches_layout() {
        assert_eq!(std::mem::size_of::<Body>(), Body::SIZE);
    }

    #[test]
    fn test_encode_decode() {
        let body = Body {
            time: 12.5,
            system: 3,
            index: 1,
            flags: -1,
            mass: 1e-3,
            position: [1.0, -2.0, 0.5],
            velocity: [0.0, 6.28, -0.01],
            attributes: [0.1, 0.2],
        };
        let mut buf = [0xffu8; Body::SIZE];
        body.encode_into(&mut buf);

        assert_eq!(&buf[20..24], &[0, 0, 0, 0]);
        assert_eq!(Body::decode(&buf), body);
    }

    #[test]
    fn test_distance_squared() {
        let a = Body { position: [1.0, 2.0, 3.0], ..Body::default() };
        let b = Body { position: [4.0, 6.0, 3.0], ..Body::default() };
        assert_eq!(a.distance_squared(&b), 25.0);
    }
}
