use crate::math::{self as m, Vec2Ext};
use std::f64::consts::PI;

/// Errors that can occur when constructing a shape or body.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("A polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),
    #[error("Polygon vertices do not form a convex loop")]
    NonConvex,
    #[error("Polygon vertices enclose no area")]
    ZeroArea,
    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("Polygon vertex coordinates must be finite")]
    NonFinite,
    #[error("Only polygons have corners to round")]
    NotPolygon,
}

/// Check that a construction parameter is a usable positive number.
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<f64, ShapeError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(ShapeError::NonPositive { name, value })
    }
}

/// The geometry of a body, in body-local space with the centroid at the origin.
///
/// Every shape is treated by collision detection as a "rounded core":
/// a set of core vertices inflated by a radius.
/// Circles are a single point, capsules a line segment and polygons a vertex loop
/// with radius zero.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Circle {
        r: f64,
    },
    /// A convex polygon with vertices in counterclockwise order.
    Polygon {
        vertices: Vec<m::Vec2>,
    },
    /// A line segment along the local x axis from `-hl` to `hl`, inflated by `r`.
    Capsule {
        hl: f64,
        r: f64,
    },
}

impl Shape {
    pub fn circle(r: f64) -> Result<Self, ShapeError> {
        Ok(Shape::Circle {
            r: require_positive("radius", r)?,
        })
    }

    /// A capsule whose rounded ends are centered `length` apart.
    pub fn capsule(r: f64, length: f64) -> Result<Self, ShapeError> {
        let r = require_positive("radius", r)?;
        let length = require_positive("length", length)?;
        Ok(Shape::Capsule {
            hl: length / 2.0,
            r,
        })
    }

    /// A rectangle with the given width and height.
    pub fn rect(w: f64, h: f64) -> Result<Self, ShapeError> {
        let hw = require_positive("width", w)? / 2.0;
        let hh = require_positive("height", h)? / 2.0;
        Ok(Shape::Polygon {
            vertices: vec![
                m::Vec2::new(-hw, -hh),
                m::Vec2::new(hw, -hh),
                m::Vec2::new(hw, hh),
                m::Vec2::new(-hw, hh),
            ],
        })
    }

    /// Create a convex polygon from a vertex loop in either winding order.
    ///
    /// The vertices are moved so that the centroid is at the origin.
    /// Returns the shape along with the centroid of the original vertices,
    /// which is where a body with this shape should be positioned.
    pub fn polygon(vertices: &[m::Vec2]) -> Result<(Self, m::Vec2), ShapeError> {
        if vertices.len() < 3 {
            return Err(ShapeError::TooFewVertices(vertices.len()));
        }
        if vertices.iter().any(|v| !(v.x.is_finite() && v.y.is_finite())) {
            return Err(ShapeError::NonFinite);
        }

        let signed_area = polygon_signed_area(vertices);
        if signed_area.abs() < m::EPSILON {
            return Err(ShapeError::ZeroArea);
        }
        let mut verts = vertices.to_vec();
        if signed_area < 0.0 {
            verts.reverse();
        }

        let n = verts.len();
        for i in 0..n {
            let start = verts[i];
            let edge = verts[(i + 1) % n] - start;
            if edge.mag_sq() < m::EPSILON {
                return Err(ShapeError::ZeroArea);
            }
            // every other vertex must be on the inner (left) side of every edge
            let outside = verts
                .iter()
                .any(|v| m::cross(edge, *v - start) < -m::EPSILON * edge.mag());
            if outside {
                return Err(ShapeError::NonConvex);
            }
        }

        let centroid = polygon_centroid(&verts, signed_area.abs());
        for v in &mut verts {
            *v -= centroid;
        }
        Ok((Shape::Polygon { vertices: verts }, centroid))
    }

    /// Radius of the rounding around the core vertices. Zero for polygons.
    #[inline]
    pub fn radius(&self) -> f64 {
        match self {
            Shape::Circle { r } | Shape::Capsule { r, .. } => *r,
            Shape::Polygon { .. } => 0.0,
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Shape::Circle { r } => PI * r * r,
            Shape::Polygon { vertices } => polygon_signed_area(vertices),
            Shape::Capsule { hl, r } => 4.0 * hl * r + PI * r * r,
        }
    }

    /// Polar second moment of area around the centroid.
    /// Multiply by density to get the moment of inertia.
    pub fn second_moment(&self) -> f64 {
        match self {
            Shape::Circle { r } => PI * r.powi(4) / 2.0,
            Shape::Polygon { vertices } => {
                let n = vertices.len();
                (0..n)
                    .map(|i| {
                        let a = vertices[i];
                        let b = vertices[(i + 1) % n];
                        m::cross(a, b) * (a.dot(a) + a.dot(b) + b.dot(b))
                    })
                    .sum::<f64>()
                    / 12.0
            }
            Shape::Capsule { hl, r } => {
                let (w, h) = (2.0 * hl, 2.0 * r);
                let rect = w * h * (w * w + h * h) / 12.0;
                // two half discs shifted out to the ends with the parallel axis theorem
                let half_area = PI * r * r / 2.0;
                let centroid_offset = 4.0 * r / (3.0 * PI);
                let half_own = PI * r.powi(4) / 4.0 - half_area * centroid_offset.powi(2);
                let dist = hl + centroid_offset;
                rect + 2.0 * (half_own + half_area * dist * dist)
            }
        }
    }

    /// Write the core vertices of this shape, placed at the given position and rotation,
    /// into `out`. Previous contents of `out` are discarded.
    pub(crate) fn write_world_core(&self, position: m::Vec2, rotation: f64, out: &mut Vec<m::Vec2>) {
        out.clear();
        let rotor = m::Rotor2::from_angle(rotation);
        match self {
            Shape::Circle { .. } => out.push(position),
            Shape::Capsule { hl, .. } => {
                let axis = rotor * m::Vec2::new(*hl, 0.0);
                out.push(position - axis);
                out.push(position + axis);
            }
            Shape::Polygon { vertices } => {
                out.extend(vertices.iter().map(|v| position + rotor * *v));
            }
        }
    }

    /// Replace every corner of a polygon with a circular arc of the given radius
    /// approximated by `segments` line segments.
    ///
    /// The radius is shrunk where adjacent edges are too short to fit it.
    /// Returns the new shape and the offset of its centroid from the old one.
    pub fn with_rounded_corners(
        &self,
        radius: f64,
        segments: usize,
    ) -> Result<(Shape, m::Vec2), ShapeError> {
        let Shape::Polygon { vertices } = self else {
            return Err(ShapeError::NotPolygon);
        };
        let radius = require_positive("corner radius", radius)?;
        if segments == 0 {
            return Err(ShapeError::NonPositive {
                name: "segments",
                value: 0.0,
            });
        }

        let n = vertices.len();
        let mut rounded = Vec::with_capacity(n * (segments + 1));
        for i in 0..n {
            let prev = vertices[(i + n - 1) % n];
            let curr = vertices[i];
            let next = vertices[(i + 1) % n];
            let to_prev = (prev - curr).normalized_or_zero();
            let to_next = (next - curr).normalized_or_zero();

            let interior = to_prev.dot(to_next).clamp(-1.0, 1.0).acos();
            let half = interior / 2.0;
            // distance from the corner to where the arc touches each edge
            let max_tangent = 0.5 * (prev - curr).mag().min((next - curr).mag());
            let tangent_dist = (radius / half.tan()).min(max_tangent);
            let r = tangent_dist * half.tan();

            let start = curr + to_prev * tangent_dist;
            let bisector = (to_prev + to_next).normalized_or_zero();
            let center = curr + bisector * (r / half.sin());

            let from = start - center;
            // the arc turns left along with the counterclockwise polygon
            let sweep = PI - interior;
            for s in 0..=segments {
                let t = s as f64 / segments as f64;
                rounded.push(center + from.rotated_ccw(sweep * t));
            }
        }
        // drop arc endpoints that coincide with the next arc's start
        rounded.dedup_by(|a, b| (*a - *b).mag_sq() < m::EPSILON);
        if rounded.len() > 1 && (rounded[0] - rounded[rounded.len() - 1]).mag_sq() < m::EPSILON {
            rounded.pop();
        }

        Shape::polygon(&rounded)
    }
}

fn polygon_signed_area(vertices: &[m::Vec2]) -> f64 {
    let n = vertices.len();
    (0..n)
        .map(|i| m::cross(vertices[i], vertices[(i + 1) % n]))
        .sum::<f64>()
        / 2.0
}

fn polygon_centroid(vertices: &[m::Vec2], area: f64) -> m::Vec2 {
    let n = vertices.len();
    let sum = (0..n).fold(m::Vec2::zero(), |acc, i| {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        acc + (a + b) * m::cross(a, b)
    });
    sum / (6.0 * area)
}
