//! Exact contact generation between two shapes.
//!
//! All shapes are handled by one separating axis test over "rounded cores"
//! (see [`Shape`][super::Shape]), followed by edge clipping to find contact points.

use crate::math::{self as m, Unit};
use crate::physics::Body;
use itertools::Either;

/// A borrowed world-space view of a shape as a set of core vertices inflated by a radius.
///
/// One core vertex is a circle, two are a capsule and three or more
/// are a convex polygon in counterclockwise order.
#[derive(Clone, Copy, Debug)]
pub struct Rounded<'a> {
    pub center: m::Vec2,
    pub core: &'a [m::Vec2],
    pub radius: f64,
}

/// A point of contact between two shapes, in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactPoint {
    /// Midpoint between the two touching surfaces.
    pub position: m::Vec2,
    /// How far the surfaces overlap at this point.
    pub depth: f64,
}

/// 1-2 points of contact can occur between two colliding 2D objects.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ContactPoints {
    One(ContactPoint),
    Two(ContactPoint, ContactPoint),
}

impl ContactPoints {
    pub fn iter(&self) -> ContactIterator<'_> {
        ContactIterator { cps: self, idx: 0 }
    }

    pub fn len(&self) -> usize {
        match self {
            ContactPoints::One(_) => 1,
            ContactPoints::Two(..) => 2,
        }
    }
}

/// An iterator over the points in a [`ContactPoints`].
pub struct ContactIterator<'a> {
    cps: &'a ContactPoints,
    idx: u8,
}
impl<'a> Iterator for ContactIterator<'a> {
    type Item = &'a ContactPoint;

    fn next(&mut self) -> Option<Self::Item> {
        self.idx += 1;
        use ContactPoints::*;
        match (self.cps, self.idx - 1) {
            (One(c), 0) => Some(c),
            (One(_), _) => None,
            (Two(c1, _), 0) => Some(c1),
            (Two(_, c2), 1) => Some(c2),
            (Two(_, _), _) => None,
        }
    }
}

/// The result of a collision between two shapes A and B.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Manifold {
    /// Collision normal, pointing from A toward B.
    pub normal: Unit<m::Vec2>,
    /// Overlap along the normal.
    pub depth: f64,
    pub points: ContactPoints,
}

/// Checks two bodies for intersection.
/// The returned normal points from `a` toward `b`.
pub fn intersection_check(a: &Body, b: &Body) -> Option<Manifold> {
    collide(a.rounded(), b.rounded())
}

/// Separating axis test between two rounded convex shapes.
pub fn collide(a: Rounded, b: Rounded) -> Option<Manifold> {
    let feature_axis = if a.core.len() < 3 || b.core.len() < 3 {
        let (pa, pb) = closest_points(a.core, b.core);
        Unit::try_new(pb - pa)
    } else {
        None
    };

    let mut best: Option<(Unit<m::Vec2>, f64)> = None;
    for axis in edge_normals(a.core)
        .chain(edge_normals(b.core))
        .chain(feature_axis)
    {
        let (min_a, max_a) = project(a, *axis);
        let (min_b, max_b) = project(b, *axis);
        let overlap = (max_a - min_b).min(max_b - min_a);
        if overlap <= 0.0 {
            return None;
        }
        if best.map_or(true, |(_, depth)| overlap < depth) {
            best = Some((axis, overlap));
        }
    }
    let (normal, depth) = best?;
    let offset = b.center - a.center;
    if offset.mag_sq() < m::EPSILON * m::EPSILON {
        // no way to tell which way to push
        return None;
    }
    let along = offset.dot(*normal);
    let points_back = if along.abs() > m::EPSILON * offset.mag() {
        along < 0.0
    } else {
        // offset perpendicular to the axis, pick the side that flips when A and B swap
        m::cross(offset, *normal) < 0.0
    };
    let normal = if points_back { -normal } else { normal };

    let points = if a.core.len() == 1 {
        ContactPoints::One(ContactPoint {
            position: a.core[0] + *normal * (a.radius - depth / 2.0),
            depth,
        })
    } else if b.core.len() == 1 {
        ContactPoints::One(ContactPoint {
            position: b.core[0] - *normal * (b.radius - depth / 2.0),
            depth,
        })
    } else {
        clip_contacts(a, b, normal).unwrap_or_else(|| fallback_contact(a, b, normal, depth))
    };

    Some(Manifold {
        normal,
        depth,
        points,
    })
}

/// Check whether a point is inside a rounded shape.
pub fn point_in_rounded(shape: Rounded, point: m::Vec2) -> bool {
    let core = shape.core;
    if core.len() >= 3 {
        let inside_core = (0..core.len()).all(|i| {
            let start = core[i];
            let end = core[(i + 1) % core.len()];
            m::cross(end - start, point - start) >= 0.0
        });
        if inside_core {
            return true;
        }
    }
    segments(core).any(|(start, end)| {
        let closest = m::closest_point_on_segment(start, end, point);
        (point - closest).mag_sq() < shape.radius * shape.radius
    })
}

//
// SAT helpers
//

/// Line segments making up the boundary of a core.
/// A single point is a degenerate segment, a capsule core a single segment.
fn segments(core: &[m::Vec2]) -> impl Iterator<Item = (m::Vec2, m::Vec2)> + '_ {
    let n = core.len();
    let count = match n {
        0 => 0,
        1 | 2 => 1,
        _ => n,
    };
    (0..count).map(move |i| (core[i], core[(i + 1) % n]))
}

/// Candidate separating axes from the edges of a core.
fn edge_normals(core: &[m::Vec2]) -> impl Iterator<Item = Unit<m::Vec2>> + '_ {
    let n = core.len();
    let count = match n {
        0 | 1 => 0,
        2 => 1,
        _ => n,
    };
    (0..count).filter_map(move |i| Unit::try_new(m::right_normal(core[(i + 1) % n] - core[i])))
}

fn project(shape: Rounded, axis: m::Vec2) -> (f64, f64) {
    let (min, max) = shape
        .core
        .iter()
        .map(|v| v.dot(axis))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), d| {
            (min.min(d), max.max(d))
        });
    (min - shape.radius, max + shape.radius)
}

fn support(core: &[m::Vec2], dir: m::Vec2) -> m::Vec2 {
    core.iter()
        .copied()
        .fold((m::Vec2::zero(), f64::NEG_INFINITY), |(best, best_dot), v| {
            let d = v.dot(dir);
            if d > best_dot {
                (v, d)
            } else {
                (best, best_dot)
            }
        })
        .0
}

/// Closest pair of points between the boundaries of two cores.
fn closest_points(core_a: &[m::Vec2], core_b: &[m::Vec2]) -> (m::Vec2, m::Vec2) {
    let mut best = (core_a[0], core_b[0]);
    let mut best_dist = f64::INFINITY;
    for (a0, a1) in segments(core_a) {
        for (b0, b1) in segments(core_b) {
            let (pa, pb) = closest_points_segments(a0, a1, b0, b1);
            let dist = (pb - pa).mag_sq();
            if dist < best_dist {
                best = (pa, pb);
                best_dist = dist;
            }
        }
    }
    best
}

fn closest_points_segments(
    a0: m::Vec2,
    a1: m::Vec2,
    b0: m::Vec2,
    b1: m::Vec2,
) -> (m::Vec2, m::Vec2) {
    // proper crossing, the segments share a point
    let da = a1 - a0;
    let db = b1 - b0;
    let denom = m::cross(da, db);
    if denom.abs() > m::EPSILON {
        let t = m::cross(b0 - a0, db) / denom;
        let u = m::cross(b0 - a0, da) / denom;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            let p = a0 + da * t;
            return (p, p);
        }
    }
    // otherwise the closest pair includes an endpoint
    [
        (a0, m::closest_point_on_segment(b0, b1, a0)),
        (a1, m::closest_point_on_segment(b0, b1, a1)),
        (m::closest_point_on_segment(a0, a1, b0), b0),
        (m::closest_point_on_segment(a0, a1, b1), b1),
    ]
    .into_iter()
    .min_by(|(p1, q1), (p2, q2)| (*q1 - *p1).mag_sq().total_cmp(&(*q2 - *p2).mag_sq()))
    .unwrap_or((a0, b0))
}

//
// CONTACT POINTS
//

#[derive(Clone, Copy, Debug)]
struct Edge {
    start: m::Vec2,
    dir: Unit<m::Vec2>,
    length: f64,
    /// Outward-facing normal.
    normal: Unit<m::Vec2>,
}

/// The edge of a core whose outward normal is most aligned with `dir`.
/// For a capsule this is one of the two sides of its segment.
fn best_edge(core: &[m::Vec2], dir: m::Vec2) -> Option<Edge> {
    let n = core.len();
    let candidates = match n {
        0 | 1 => return None,
        2 => Either::Left([(core[0], core[1]), (core[1], core[0])].into_iter()),
        _ => Either::Right((0..n).map(|i| (core[i], core[(i + 1) % n]))),
    };
    candidates
        .filter_map(|(start, end)| {
            let offset = end - start;
            let length = offset.mag();
            let dir = Unit::try_new(offset)?;
            let normal = Unit::new_unchecked(m::right_normal(*dir));
            Some(Edge {
                start,
                dir,
                length,
                normal,
            })
        })
        .max_by(|e1, e2| e1.normal.dot(dir).total_cmp(&e2.normal.dot(dir)))
}

/// Distances along `edge` at which it enters and exits the slab
/// bounded by the lines perpendicular to `target` through its endpoints.
fn clip_edge(target: Edge, edge: Edge) -> Option<(f64, f64)> {
    let dist_dot_dir = (target.start - edge.start).dot(*target.dir);
    let dirs_dot = edge.dir.dot(*target.dir);
    if dirs_dot.abs() < m::EPSILON {
        // perpendicular to the slab, either entirely inside or entirely outside
        let along = -dist_dot_dir;
        return (0.0..=target.length)
            .contains(&along)
            .then_some((0.0, edge.length));
    }
    let start_clip_t = dist_dot_dir / dirs_dot;
    let end_clip_t = (target.length + dist_dot_dir) / dirs_dot;
    let (enters, exits) = if start_clip_t < end_clip_t {
        (start_clip_t.max(0.0), end_clip_t.min(edge.length))
    } else {
        (end_clip_t.max(0.0), start_clip_t.min(edge.length))
    };
    (enters <= exits).then_some((enters, exits))
}

/// Reference/incident edge clipping for shapes that have edges (polygons and capsules).
fn clip_contacts(a: Rounded, b: Rounded, normal: Unit<m::Vec2>) -> Option<ContactPoints> {
    let edge_a = best_edge(a.core, *normal)?;
    let edge_b = best_edge(b.core, -*normal)?;

    // prefer A as reference unless B's edge is clearly better aligned
    const REFERENCE_BIAS: f64 = 1e-3;
    let (reference, ref_shape, inc_shape) =
        if edge_b.normal.dot(-*normal) > edge_a.normal.dot(*normal) + REFERENCE_BIAS {
            (edge_b, b, a)
        } else {
            (edge_a, a, b)
        };
    let incident = best_edge(inc_shape.core, -*reference.normal)?;
    let (enters, exits) = clip_edge(reference, incident)?;

    let reach = ref_shape.radius + inc_shape.radius;
    let ref_is_segment = ref_shape.core.len() == 2;
    let mut points = [enters, exits].map(|t| {
        let p = incident.start + *incident.dir * t;
        let separation = (p - reference.start).dot(*reference.normal);
        // a segment only has a surface on this side,
        // points far behind it are on the other side of the shape
        if separation >= reach || (ref_is_segment && separation < -reach) {
            return None;
        }
        let on_incident = p - *reference.normal * inc_shape.radius;
        let on_reference = p - *reference.normal * (separation - ref_shape.radius);
        Some(ContactPoint {
            position: (on_incident + on_reference) * 0.5,
            depth: reach - separation,
        })
    });
    if exits - enters < m::EPSILON {
        points[1] = None;
    }

    match points {
        [Some(c1), Some(c2)] => Some(ContactPoints::Two(c1, c2)),
        [Some(c), None] | [None, Some(c)] => Some(ContactPoints::One(c)),
        [None, None] => None,
    }
}

/// Single contact point for when clipping doesn't find anything,
/// e.g. crossing capsules.
fn fallback_contact(a: Rounded, b: Rounded, normal: Unit<m::Vec2>, depth: f64) -> ContactPoints {
    let (pa, pb) = closest_points(a.core, b.core);
    let position = if (pb - pa).mag_sq() > m::EPSILON {
        ((pa + *normal * a.radius) + (pb - *normal * b.radius)) * 0.5
    } else {
        // cores overlap, use the deepest point of B inside A
        let deepest = support(b.core, -*normal) - *normal * b.radius;
        deepest + *normal * (depth / 2.0)
    };
    ContactPoints::One(ContactPoint { position, depth })
}
