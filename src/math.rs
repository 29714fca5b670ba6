//! Types, aliases and helper operations for doing math with `ultraviolet`.
use std::f64::consts::PI;
pub use ultraviolet as uv;

pub type Vec2 = uv::DVec2;
pub type Rotor2 = uv::DRotor2;

/// An angle in either degrees or radians.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub enum Angle {
    Rad(f64),
    Deg(f64),
}
impl Angle {
    /// Get the angle as degrees.
    #[inline]
    pub fn deg(&self) -> f64 {
        match self {
            Angle::Rad(rad) => rad * 180.0 / PI,
            Angle::Deg(deg) => *deg,
        }
    }

    /// Get the angle as radians.
    #[inline]
    pub fn rad(&self) -> f64 {
        match self {
            Angle::Rad(rad) => *rad,
            Angle::Deg(deg) => deg * PI / 180.0,
        }
    }
}
impl Default for Angle {
    fn default() -> Self {
        Angle::Rad(0.0)
    }
}
impl From<Angle> for Rotor2 {
    #[inline]
    fn from(ang: Angle) -> Rotor2 {
        Rotor2::from_angle(ang.rad())
    }
}

/// A wrapper type to indicate a vector should always be normalized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Unit<T>(T);

impl Unit<Vec2> {
    /// Normalize a vector, returning `None` if it has (close to) zero length.
    ///
    /// Normalizing a zero vector would produce NaNs that spread through
    /// every computation they touch, so callers must decide what to do instead.
    pub fn try_new(v: Vec2) -> Option<Self> {
        let mag = v.mag();
        if mag < EPSILON || !mag.is_finite() {
            None
        } else {
            Some(Unit(v / mag))
        }
    }

    pub const fn new_unchecked(v: Vec2) -> Self {
        Unit(v)
    }

    pub fn unit_x() -> Self {
        Unit(Vec2::unit_x())
    }

    pub fn unit_y() -> Self {
        Unit(Vec2::unit_y())
    }

    #[inline]
    pub fn into_inner(self) -> Vec2 {
        self.0
    }
}

impl std::ops::Mul<Unit<Vec2>> for Rotor2 {
    type Output = Unit<Vec2>;

    fn mul(self, rhs: Unit<Vec2>) -> Self::Output {
        Unit(self * rhs.0)
    }
}

impl<T> std::ops::Deref for Unit<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> std::ops::Neg for Unit<T>
where
    T: std::ops::Neg,
{
    type Output = Unit<<T as std::ops::Neg>::Output>;

    fn neg(self) -> Self::Output {
        Unit(-self.0)
    }
}

/// Lengths below this are treated as zero when normalizing.
pub const EPSILON: f64 = 1e-9;

// Vec2 utils

#[inline]
pub fn left_normal(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}
#[inline]
pub fn right_normal(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}
#[inline]
pub fn unit_left_normal(u: Unit<Vec2>) -> Unit<Vec2> {
    Unit::new_unchecked(left_normal(*u))
}

/// 2D cross product of two vectors, i.e. the z component of their 3D cross product.
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f64 {
    a.wedge(b).xy
}

/// Cross product of a scalar (angular velocity around the z axis) and a vector.
#[inline]
pub fn cross_scalar(s: f64, v: Vec2) -> Vec2 {
    left_normal(v) * s
}

/// Closest point to `p` on the line segment between `a` and `b`.
pub fn closest_point_on_segment(a: Vec2, b: Vec2, p: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.mag_sq();
    if len_sq < EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Extra operations on [`Vec2`][self::Vec2] that come in two flavors:
/// a by-value version returning a new vector
/// and an in-place version returning `&mut Self` for chaining.
pub trait Vec2Ext: Sized {
    /// Rotate counterclockwise by `angle` radians.
    fn rotated_ccw(self, angle: f64) -> Self;
    fn rotate_ccw(&mut self, angle: f64) -> &mut Self;
    /// Normalize, or return the zero vector if the length is zero.
    fn normalized_or_zero(self) -> Self;
    fn normalize_or_zero(&mut self) -> &mut Self;
    /// Add another vector.
    fn translated(self, by: Self) -> Self;
    fn translate(&mut self, by: Self) -> &mut Self;
    /// Multiply both components by a scalar.
    fn scaled(self, s: f64) -> Self;
    fn scale_by(&mut self, s: f64) -> &mut Self;
    /// Swap to the left-hand perpendicular vector.
    fn perped(self) -> Self;
    fn perp(&mut self) -> &mut Self;
}

impl Vec2Ext for Vec2 {
    #[inline]
    fn rotated_ccw(self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    #[inline]
    fn rotate_ccw(&mut self, angle: f64) -> &mut Self {
        *self = self.rotated_ccw(angle);
        self
    }

    #[inline]
    fn normalized_or_zero(self) -> Self {
        Unit::try_new(self)
            .map(Unit::into_inner)
            .unwrap_or_else(Vec2::zero)
    }

    #[inline]
    fn normalize_or_zero(&mut self) -> &mut Self {
        *self = self.normalized_or_zero();
        self
    }

    #[inline]
    fn translated(self, by: Self) -> Self {
        self + by
    }

    #[inline]
    fn translate(&mut self, by: Self) -> &mut Self {
        *self += by;
        self
    }

    #[inline]
    fn scaled(self, s: f64) -> Self {
        self * s
    }

    #[inline]
    fn scale_by(&mut self, s: f64) -> &mut Self {
        *self *= s;
        self
    }

    #[inline]
    fn perped(self) -> Self {
        left_normal(self)
    }

    #[inline]
    fn perp(&mut self) -> &mut Self {
        *self = left_normal(*self);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: Vec2, b: Vec2) -> bool {
        (a - b).mag() < 1e-9
    }

    #[test]
    fn rotation_matches_rotor() {
        let v = Vec2::new(1.5, -0.5);
        for ang in [0.0, 0.3, PI / 2.0, -2.0, 3.0 * PI] {
            let rotor: Rotor2 = Angle::Rad(ang).into();
            assert!(approx_eq(v.rotated_ccw(ang), rotor * v));
        }
        assert!(approx_eq(
            Vec2::unit_x().rotated_ccw(Angle::Deg(90.0).rad()),
            Vec2::unit_y()
        ));
    }

    #[test]
    fn chained_in_place_ops() {
        let mut v = Vec2::new(3.0, 4.0);
        v.normalize_or_zero().scale_by(10.0).translate(Vec2::new(1.0, 1.0));
        assert!(approx_eq(v, Vec2::new(7.0, 9.0)));
        let mut p = Vec2::unit_x();
        p.perp().perp();
        assert!(approx_eq(p, -Vec2::unit_x()));
        assert!(approx_eq(Vec2::new(2.0, 0.0).translated(Vec2::unit_y()).scaled(2.0), Vec2::new(4.0, 2.0)));
        assert!(approx_eq(Vec2::unit_x().perped(), Vec2::unit_y()));
    }

    #[test]
    fn zero_length_normalization_is_zero() {
        assert!(Unit::try_new(Vec2::zero()).is_none());
        assert_eq!(Vec2::zero().normalized_or_zero(), Vec2::zero());
        assert!(Unit::try_new(Vec2::new(f64::NAN, 0.0)).is_none());
    }

    #[test]
    fn cross_products() {
        assert_eq!(cross(Vec2::unit_x(), Vec2::unit_y()), 1.0);
        assert_eq!(cross(Vec2::unit_y(), Vec2::unit_x()), -1.0);
        assert!(approx_eq(cross_scalar(2.0, Vec2::unit_x()), Vec2::new(0.0, 2.0)));
        assert!(approx_eq(right_normal(Vec2::unit_x()), -Vec2::unit_y()));
        assert!(approx_eq(*unit_left_normal(Unit::unit_x()), Vec2::unit_y()));
    }

    #[test]
    fn segment_closest_point() {
        let a = Vec2::new(-1.0, 0.0);
        let b = Vec2::new(1.0, 0.0);
        assert!(approx_eq(closest_point_on_segment(a, b, Vec2::new(0.5, 3.0)), Vec2::new(0.5, 0.0)));
        assert!(approx_eq(closest_point_on_segment(a, b, Vec2::new(5.0, 1.0)), b));
        assert!(approx_eq(closest_point_on_segment(a, a, Vec2::new(5.0, 1.0)), a));
    }
}
