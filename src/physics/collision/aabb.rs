use crate::math as m;

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct AABB {
    pub min: m::Vec2,
    pub max: m::Vec2,
}

impl AABB {
    #[inline]
    pub fn new(min: m::Vec2, max: m::Vec2) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn zero() -> Self {
        Self {
            min: m::Vec2::zero(),
            max: m::Vec2::zero(),
        }
    }

    /// The smallest box containing all the given points, grown by `margin` on every side.
    /// Returns a zero-sized box at the origin if there are no points.
    pub fn around_points(points: &[m::Vec2], margin: f64) -> Self {
        let Some(first) = points.first() else {
            return Self::zero();
        };
        let (mut min, mut max) = (*first, *first);
        for p in &points[1..] {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        let margin = m::Vec2::new(margin, margin);
        Self {
            min: min - margin,
            max: max + margin,
        }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn center(&self) -> m::Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Check whether two boxes overlap. Touching edges count as overlapping.
    #[inline]
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// The overlapping region of two boxes, if there is one.
    pub fn intersection(&self, other: &AABB) -> Option<AABB> {
        if !self.intersects(other) {
            return None;
        }
        Some(AABB {
            min: m::Vec2::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            max: m::Vec2::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        })
    }

    #[inline]
    pub fn contains_point(&self, point: m::Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Move the box by the given offset.
    #[inline]
    pub fn translated(&self, offset: m::Vec2) -> AABB {
        AABB {
            min: self.min + offset,
            max: self.max + offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aabb(x0: f64, y0: f64, x1: f64, y1: f64) -> AABB {
        AABB::new(m::Vec2::new(x0, y0), m::Vec2::new(x1, y1))
    }

    #[test]
    fn overlap_and_intersection() {
        let a = aabb(0.0, 0.0, 2.0, 2.0);
        let b = aabb(1.0, 1.0, 3.0, 4.0);
        let c = aabb(2.5, 0.0, 3.0, 0.5);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(a.intersection(&b), Some(aabb(1.0, 1.0, 2.0, 2.0)));
        assert_eq!(a.intersection(&c), None);
        // touching counts
        assert!(a.intersects(&aabb(2.0, 2.0, 3.0, 3.0)));
    }

    #[test]
    fn bounds_of_points() {
        let pts = [
            m::Vec2::new(1.0, -1.0),
            m::Vec2::new(-2.0, 0.5),
            m::Vec2::new(0.0, 3.0),
        ];
        let b = AABB::around_points(&pts, 0.5);
        assert_eq!(b, aabb(-2.5, -1.5, 1.5, 3.5));
        assert_eq!(b.width(), 4.0);
        assert_eq!(b.height(), 5.0);
        assert!(b.contains_point(m::Vec2::new(-2.4, 3.4)));
        assert!(!b.contains_point(m::Vec2::new(-2.6, 0.0)));
        assert_eq!(AABB::around_points(&[], 1.0), AABB::zero());
        assert_eq!(b.translated(m::Vec2::new(1.0, 0.0)).center(), m::Vec2::new(0.5, 1.0));
    }
}
