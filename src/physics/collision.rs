pub mod aabb;
pub use aabb::AABB;

pub mod shape;
pub use shape::{Shape, ShapeError};

pub mod spatial_hash;
pub use spatial_hash::{CellRange, SpatialHash, SpatialHashParams};

pub mod narrowphase;
pub use narrowphase::{
    collide, intersection_check, point_in_rounded, ContactIterator, ContactPoint, ContactPoints,
    Manifold, Rounded,
};

use crate::physics::BodyId;

/// An order-independent key identifying a pair of bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(u64);

impl PairKey {
    pub fn new(a: BodyId, b: BodyId) -> Self {
        assert!(a != b, "bug: paired a body with itself");
        let (lo, hi) = if a.0 < b.0 { (a.0, b.0) } else { (b.0, a.0) };
        PairKey(((lo as u64) << 32) | hi as u64)
    }

    /// The ids of the two bodies, smaller first.
    pub fn ids(&self) -> (BodyId, BodyId) {
        (BodyId((self.0 >> 32) as u32), BodyId(self.0 as u32))
    }

    #[inline]
    pub fn contains(&self, id: BodyId) -> bool {
        let (a, b) = self.ids();
        a == id || b == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_is_order_independent() {
        let (a, b) = (BodyId(7), BodyId(3));
        assert_eq!(PairKey::new(a, b), PairKey::new(b, a));
        assert_eq!(PairKey::new(a, b).ids(), (b, a));
        assert!(PairKey::new(a, b).contains(a));
        assert!(!PairKey::new(a, b).contains(BodyId(4)));
        assert_ne!(PairKey::new(a, b), PairKey::new(a, BodyId(4)));
    }

    #[test]
    #[should_panic]
    fn pairing_with_self_panics() {
        PairKey::new(BodyId(1), BodyId(1));
    }
}
