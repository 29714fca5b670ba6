use super::{
    collision::{shape::require_positive, CellRange, Rounded, Shape, ShapeError, AABB},
    Velocity,
};
use crate::math::{self as m, Angle, Vec2Ext};

use thunderdome as td;

/// Stable identity of a body, assigned when it's added to a world.
/// Used to build order-independent pair keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

/// Hands out body ids in increasing order, starting from 1.
#[derive(Debug)]
pub(crate) struct IdAllocator {
    next: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    pub fn next_id(&mut self) -> BodyId {
        let id = BodyId(self.next);
        self.next += 1;
        id
    }
}

/// Handle to a point attached to a body, which moves and rotates with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnchorKey(td::Index);

/// Mass or moment of inertia of a body, which can be infinite.
///
/// This stores both a mass value and its inverse, because calculating inverse mass
/// is expensive and needed a lot in physics calculations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mass {
    Finite { mass: f64, inverse: f64 },
    Infinite,
}

impl From<f64> for Mass {
    #[inline]
    fn from(mass: f64) -> Self {
        Mass::Finite {
            mass,
            inverse: 1.0 / mass,
        }
    }
}

impl Mass {
    /// Get the inverse of the mass, which is zero if the mass is infinite.
    #[inline]
    pub fn inv(&self) -> f64 {
        match self {
            Mass::Finite { inverse, .. } => *inverse,
            Mass::Infinite => 0.0,
        }
    }

    /// Get the mass, or `None` if it's infinite.
    #[inline]
    pub fn finite(&self) -> Option<f64> {
        match self {
            Mass::Finite { mass, .. } => Some(*mass),
            Mass::Infinite => None,
        }
    }
}

/// Determines how the surface of a body responds to collisions.
///
/// Using a simplified friction model where each material has its own friction
/// coefficients (rather than the realistic model where every pair of materials
/// would have its own coefficients).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub static_friction: f64,
    pub kinetic_friction: f64,
    pub restitution: f64,
}

impl Default for Material {
    fn default() -> Self {
        Material {
            static_friction: 0.6,
            kinetic_friction: 0.4,
            restitution: 0.0,
        }
    }
}

impl Material {
    /// Get the static friction coefficient between this material and another.
    ///
    /// It is computed as the average between the two materials' friction coefficients.
    pub fn static_friction_with(&self, other: &Self) -> f64 {
        (self.static_friction + other.static_friction) / 2.0
    }

    /// Get the kinetic friction coefficient between this material and another.
    ///
    /// It is computed as the average between the two materials' friction coefficients.
    pub fn kinetic_friction_with(&self, other: &Self) -> f64 {
        (self.kinetic_friction + other.kinetic_friction) / 2.0
    }

    /// Get the restitution coefficient between this material and another.
    ///
    /// The less bouncy of the two wins.
    pub fn restitution_with(&self, other: &Self) -> f64 {
        self.restitution.min(other.restitution)
    }
}

/// Optional parameters for creating a body. Set with the builder-like `with_` methods.
#[derive(Clone, Copy, Debug)]
pub struct BodyOptions {
    pub material: Material,
    /// Mass per unit area per unit of thickness.
    pub density: f64,
    pub thickness: f64,
    /// Static bodies never move and have infinite mass.
    pub is_static: bool,
    /// Sensors report contacts but never push anything.
    pub is_sensor: bool,
    /// Bodies with fixed rotation have infinite moment of inertia.
    pub fixed_rotation: bool,
    pub rotation: Angle,
    pub velocity: Velocity,
}

impl Default for BodyOptions {
    fn default() -> Self {
        Self {
            material: Material::default(),
            density: 1.0,
            thickness: 1.0,
            is_static: false,
            is_sensor: false,
            fixed_rotation: false,
            rotation: Angle::default(),
            velocity: Velocity::default(),
        }
    }
}

impl BodyOptions {
    /// Options for a static body.
    pub fn fixed() -> Self {
        Self {
            is_static: true,
            ..Default::default()
        }
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_friction(mut self, static_friction: f64, kinetic_friction: f64) -> Self {
        self.material.static_friction = static_friction;
        self.material.kinetic_friction = kinetic_friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.material.restitution = restitution;
        self
    }

    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    pub fn with_thickness(mut self, thickness: f64) -> Self {
        self.thickness = thickness;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn with_sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    pub fn with_fixed_rotation(mut self, fixed_rotation: bool) -> Self {
        self.fixed_rotation = fixed_rotation;
        self
    }

    pub fn with_rotation(mut self, rotation: Angle) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_velocity(mut self, velocity: Velocity) -> Self {
        self.velocity = velocity;
        self
    }
}

/// A rigid body: a shape with a position, velocity and mass.
///
/// World-space geometry (core vertices and bounding box) is cached
/// and rebuilt whenever the position or rotation is changed through this type's methods.
#[derive(Clone, Debug)]
pub struct Body {
    pub(crate) id: Option<BodyId>,
    shape: Shape,
    position: m::Vec2,
    rotation: f64,
    pub(crate) prev_position: m::Vec2,
    pub velocity: Velocity,
    mass: Mass,
    moment_of_inertia: Mass,
    density: f64,
    thickness: f64,
    pub material: Material,
    is_static: bool,
    is_sensor: bool,
    fixed_rotation: bool,
    world_core: Vec<m::Vec2>,
    aabb: AABB,
    anchors: td::Arena<m::Vec2>,
    pub(crate) contact_points: Vec<m::Vec2>,
    pub(crate) joint_group: Option<u32>,
    pub(crate) cell_range: Option<CellRange>,
}

impl Body {
    /// Create a body with the given shape centered at `position`.
    pub fn new(shape: Shape, position: m::Vec2, opts: BodyOptions) -> Result<Self, ShapeError> {
        let density = require_positive("density", opts.density)?;
        let thickness = require_positive("thickness", opts.thickness)?;
        let (mass, moment_of_inertia) =
            mass_properties(&shape, density, thickness, opts.is_static, opts.fixed_rotation);

        let mut body = Body {
            id: None,
            shape,
            position,
            rotation: opts.rotation.rad(),
            prev_position: position,
            velocity: if opts.is_static {
                Velocity::default()
            } else {
                opts.velocity
            },
            mass,
            moment_of_inertia,
            density,
            thickness,
            material: opts.material,
            is_static: opts.is_static,
            is_sensor: opts.is_sensor,
            fixed_rotation: opts.fixed_rotation,
            world_core: Vec::new(),
            aabb: AABB::zero(),
            anchors: td::Arena::new(),
            contact_points: Vec::new(),
            joint_group: None,
            cell_range: None,
        };
        body.rebuild_geometry();
        Ok(body)
    }

    pub fn circle(x: f64, y: f64, radius: f64, opts: BodyOptions) -> Result<Self, ShapeError> {
        Self::new(Shape::circle(radius)?, m::Vec2::new(x, y), opts)
    }

    /// A convex polygon from world-space vertices in either winding order.
    /// The body is positioned at the centroid of the vertices.
    pub fn polygon(vertices: &[m::Vec2], opts: BodyOptions) -> Result<Self, ShapeError> {
        let (shape, centroid) = Shape::polygon(vertices)?;
        Self::new(shape, centroid, opts)
    }

    /// A capsule centered at (x, y) with the centers of its rounded ends `length` apart,
    /// lying horizontally before rotation.
    pub fn capsule(
        x: f64,
        y: f64,
        radius: f64,
        length: f64,
        opts: BodyOptions,
    ) -> Result<Self, ShapeError> {
        Self::new(Shape::capsule(radius, length)?, m::Vec2::new(x, y), opts)
    }

    /// A rectangle centered at (x, y).
    pub fn rect(x: f64, y: f64, w: f64, h: f64, opts: BodyOptions) -> Result<Self, ShapeError> {
        Self::new(Shape::rect(w, h)?, m::Vec2::new(x, y), opts)
    }

    //
    // accessors
    //

    /// The id assigned when the body was added to a world, if it has been.
    #[inline]
    pub fn id(&self) -> Option<BodyId> {
        self.id
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn position(&self) -> m::Vec2 {
        self.position
    }

    /// Position at the start of the latest integration step.
    #[inline]
    pub fn prev_position(&self) -> m::Vec2 {
        self.prev_position
    }

    /// Rotation in radians, counterclockwise.
    #[inline]
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    #[inline]
    pub fn mass(&self) -> Mass {
        self.mass
    }

    #[inline]
    pub fn moment_of_inertia(&self) -> Mass {
        self.moment_of_inertia
    }

    #[inline]
    pub fn density(&self) -> f64 {
        self.density
    }

    #[inline]
    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.shape.area()
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    #[inline]
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    #[inline]
    pub fn has_fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    #[inline]
    pub fn aabb(&self) -> AABB {
        self.aabb
    }

    /// Core vertices of the shape in world space. See [`Shape`] for what the core is.
    #[inline]
    pub fn world_core(&self) -> &[m::Vec2] {
        &self.world_core
    }

    /// Points where this body touched others during the latest substep.
    #[inline]
    pub fn contact_points(&self) -> &[m::Vec2] {
        &self.contact_points
    }

    /// The id shared by bodies connected with joints that don't let them collide.
    #[inline]
    pub fn joint_group(&self) -> Option<u32> {
        self.joint_group
    }

    pub fn rounded(&self) -> Rounded<'_> {
        Rounded {
            center: self.position,
            core: &self.world_core,
            radius: self.shape.radius(),
        }
    }

    /// Check whether a world-space point is inside the body.
    pub fn contains_point(&self, point: m::Vec2) -> bool {
        self.aabb.contains_point(point) && super::collision::point_in_rounded(self.rounded(), point)
    }

    //
    // mutation
    //

    pub fn set_position(&mut self, position: m::Vec2) {
        self.position = position;
        self.rebuild_geometry();
    }

    pub fn set_rotation(&mut self, rotation: f64) {
        self.rotation = rotation;
        self.rebuild_geometry();
    }

    /// Move the body by an offset.
    pub fn translate(&mut self, offset: m::Vec2) {
        self.position += offset;
        self.rebuild_geometry();
    }

    /// Set the material parameters.
    pub fn set_material(&mut self, material: Material) {
        self.material = material;
    }

    /// Recompute the world-space core vertices and bounding box together.
    pub(crate) fn rebuild_geometry(&mut self) {
        self.shape
            .write_world_core(self.position, self.rotation, &mut self.world_core);
        self.aabb = AABB::around_points(&self.world_core, self.shape.radius());
    }

    /// Semi-implicit Euler step: acceleration into velocity, then velocity into position.
    pub(crate) fn integrate(&mut self, dt: f64, acceleration: m::Vec2) {
        self.prev_position = self.position;
        if self.is_static {
            return;
        }
        self.velocity.linear += acceleration * dt;
        self.position += self.velocity.linear * dt;
        if self.moment_of_inertia.inv() != 0.0 {
            self.rotation += self.velocity.angular * dt;
        } else {
            self.velocity.angular = 0.0;
        }
        self.contact_points.clear();
        self.rebuild_geometry();
    }

    /// Apply an impulse at a point offset from the center of mass.
    #[inline]
    pub fn apply_impulse(&mut self, impulse: m::Vec2, offset: m::Vec2) {
        self.velocity.linear += impulse * self.mass.inv();
        self.velocity.angular += m::cross(offset, impulse) * self.moment_of_inertia.inv();
    }

    //
    // anchors
    //

    /// Attach a point given in body-local coordinates to the body.
    pub fn add_anchor(&mut self, local_point: m::Vec2) -> AnchorKey {
        AnchorKey(self.anchors.insert(local_point))
    }

    /// Attach a point given in world coordinates to the body at its current pose.
    pub fn add_anchor_world(&mut self, world_point: m::Vec2) -> AnchorKey {
        let local = (world_point - self.position).rotated_ccw(-self.rotation);
        self.add_anchor(local)
    }

    /// Detach an anchor. Returns its local position if it existed.
    pub fn remove_anchor(&mut self, key: AnchorKey) -> Option<m::Vec2> {
        self.anchors.remove(key.0)
    }

    pub fn anchor_local(&self, key: AnchorKey) -> Option<m::Vec2> {
        self.anchors.get(key.0).copied()
    }

    /// Current world-space position of an anchor.
    pub fn anchor_world(&self, key: AnchorKey) -> Option<m::Vec2> {
        self.anchor_local(key)
            .map(|local| self.position + local.rotated_ccw(self.rotation))
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    //
    // shape editing
    //

    /// Replace the corners of a polygon body with arcs of the given radius.
    ///
    /// Vertices, mass properties and bounding box are all replaced at once,
    /// and the body stays where it was in world space.
    /// Anchors keep their world positions.
    pub fn round_corners(&mut self, radius: f64, segments: usize) -> Result<(), ShapeError> {
        let (shape, offset) = self.shape.with_rounded_corners(radius, segments)?;
        let (mass, moment_of_inertia) = mass_properties(
            &shape,
            self.density,
            self.thickness,
            self.is_static,
            self.fixed_rotation,
        );

        self.shape = shape;
        self.mass = mass;
        self.moment_of_inertia = moment_of_inertia;
        self.position += offset.rotated_ccw(self.rotation);
        for (_, anchor) in self.anchors.iter_mut() {
            *anchor -= offset;
        }
        self.rebuild_geometry();
        Ok(())
    }
}

fn mass_properties(
    shape: &Shape,
    density: f64,
    thickness: f64,
    is_static: bool,
    fixed_rotation: bool,
) -> (Mass, Mass) {
    if is_static {
        return (Mass::Infinite, Mass::Infinite);
    }
    let mass = Mass::from(shape.area() * density * thickness);
    let inertia = if fixed_rotation {
        Mass::Infinite
    } else {
        Mass::from(shape.second_moment() * density * thickness)
    };
    (mass, inertia)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn close(a: m::Vec2, b: m::Vec2) -> bool {
        (a - b).mag() < 1e-9
    }

    #[test]
    fn mass_from_density_and_thickness() {
        let opts = BodyOptions::default().with_density(2.0).with_thickness(0.5);
        let body = Body::circle(0.0, 0.0, 1.0, opts).unwrap();
        let mass = body.mass().finite().unwrap();
        assert!((mass - PI).abs() < 1e-9);
        let inertia = body.moment_of_inertia().finite().unwrap();
        assert!((inertia - mass / 2.0).abs() < 1e-9);
        assert!((body.mass().inv() - 1.0 / PI).abs() < 1e-9);
    }

    #[test]
    fn static_and_fixed_rotation_inverses() {
        let ground = Body::rect(0.0, 0.0, 10.0, 1.0, BodyOptions::fixed()).unwrap();
        assert_eq!(ground.mass().inv(), 0.0);
        assert_eq!(ground.moment_of_inertia().inv(), 0.0);

        let slider = Body::rect(
            0.0,
            0.0,
            1.0,
            1.0,
            BodyOptions::default().with_fixed_rotation(true),
        )
        .unwrap();
        assert!(slider.mass().inv() > 0.0);
        assert_eq!(slider.moment_of_inertia().inv(), 0.0);
    }

    #[test]
    fn invalid_parameters() {
        assert!(matches!(
            Body::circle(0.0, 0.0, -1.0, BodyOptions::default()),
            Err(ShapeError::NonPositive { name: "radius", .. })
        ));
        assert!(matches!(
            Body::rect(0.0, 0.0, 1.0, 1.0, BodyOptions::default().with_density(0.0)),
            Err(ShapeError::NonPositive { name: "density", .. })
        ));
        assert!(matches!(
            Body::capsule(0.0, 0.0, 1.0, 1.0, BodyOptions::default().with_thickness(f64::INFINITY)),
            Err(ShapeError::NonPositive {
                name: "thickness",
                ..
            })
        ));
        assert_eq!(
            Body::polygon(&[m::Vec2::zero(), m::Vec2::unit_x()], BodyOptions::default()).err(),
            Some(ShapeError::TooFewVertices(2))
        );
    }

    #[test]
    fn geometry_follows_pose() {
        let mut body = Body::rect(0.0, 0.0, 2.0, 1.0, BodyOptions::default()).unwrap();
        assert_eq!(
            body.aabb(),
            AABB::new(m::Vec2::new(-1.0, -0.5), m::Vec2::new(1.0, 0.5))
        );
        body.set_rotation(PI / 2.0);
        let aabb = body.aabb();
        assert!(close(aabb.min, m::Vec2::new(-0.5, -1.0)));
        assert!(close(aabb.max, m::Vec2::new(0.5, 1.0)));
        body.translate(m::Vec2::new(3.0, 0.0));
        assert!(close(body.aabb().center(), m::Vec2::new(3.0, 0.0)));
        assert!(body.contains_point(m::Vec2::new(3.2, 0.9)));
        assert!(!body.contains_point(m::Vec2::new(3.7, 0.0)));
    }

    #[test]
    fn integration_is_semi_implicit() {
        let mut body = Body::circle(0.0, 0.0, 1.0, BodyOptions::default()).unwrap();
        body.velocity.angular = 1.0;
        body.integrate(0.5, m::Vec2::new(0.0, 2.0));
        // velocity is updated first and then moves the body
        assert!(close(body.velocity.linear, m::Vec2::new(0.0, 1.0)));
        assert!(close(body.position(), m::Vec2::new(0.0, 0.5)));
        assert!((body.rotation() - 0.5).abs() < 1e-12);
        assert!(close(body.prev_position(), m::Vec2::zero()));

        let mut ground = Body::circle(0.0, 0.0, 1.0, BodyOptions::fixed()).unwrap();
        ground.velocity.linear = m::Vec2::new(1.0, 0.0);
        ground.integrate(0.5, m::Vec2::new(0.0, 2.0));
        assert!(close(ground.position(), m::Vec2::zero()));
    }

    #[test]
    fn anchors_move_with_body() {
        let mut body = Body::rect(1.0, 1.0, 2.0, 2.0, BodyOptions::default()).unwrap();
        let corner = body.add_anchor(m::Vec2::new(1.0, 0.0));
        let world = body.add_anchor_world(m::Vec2::new(1.0, 2.0));
        assert!(close(body.anchor_local(world).unwrap(), m::Vec2::new(0.0, 1.0)));

        body.set_rotation(PI / 2.0);
        assert!(close(body.anchor_world(corner).unwrap(), m::Vec2::new(1.0, 2.0)));
        assert!(close(body.anchor_world(world).unwrap(), m::Vec2::new(0.0, 1.0)));

        assert_eq!(body.remove_anchor(corner), Some(m::Vec2::new(1.0, 0.0)));
        assert_eq!(body.anchor_world(corner), None);
        assert_eq!(body.anchor_count(), 1);
    }

    #[test]
    fn impulses_change_velocity() {
        let mut body = Body::rect(0.0, 0.0, 1.0, 1.0, BodyOptions::default()).unwrap();
        // unit mass, inertia 1/6
        body.apply_impulse(m::Vec2::new(0.0, 1.0), m::Vec2::new(0.5, 0.0));
        assert!(close(body.velocity.linear, m::Vec2::new(0.0, 1.0)));
        assert!((body.velocity.angular - 3.0).abs() < 1e-9);
    }

    #[test]
    fn rounding_corners_keeps_world_placement() {
        // right triangle, rounding shifts the centroid
        let mut body = Body::polygon(
            &[
                m::Vec2::new(0.0, 0.0),
                m::Vec2::new(3.0, 0.0),
                m::Vec2::new(0.0, 3.0),
            ],
            BodyOptions::default(),
        )
        .unwrap();
        let anchor = body.add_anchor_world(m::Vec2::new(0.5, 0.5));
        let mass_before = body.mass().finite().unwrap();

        body.round_corners(0.3, 3).unwrap();
        let Shape::Polygon { vertices } = body.shape() else {
            panic!("not a polygon")
        };
        assert_eq!(vertices.len(), 12);
        assert!(body.mass().finite().unwrap() < mass_before);
        assert!(close(body.anchor_world(anchor).unwrap(), m::Vec2::new(0.5, 0.5)));
        let aabb = body.aabb();
        assert!(aabb.min.x >= -1e-9 && aabb.min.y >= -1e-9);
        assert!(aabb.max.x <= 3.0 + 1e-9 && aabb.max.y <= 3.0 + 1e-9);

        let mut ball = Body::circle(0.0, 0.0, 1.0, BodyOptions::default()).unwrap();
        assert_eq!(ball.round_corners(0.1, 2), Err(ShapeError::NotPolygon));
    }
}
