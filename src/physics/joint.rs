//! Joints hold pairs of bodies together.

use super::{
    body::AnchorKey,
    body_set::{BodyKey, BodySet},
    config::PhysicsConfig,
    solver::{apply_pair_impulse, effective_mass, relative_velocity, separate},
    Body,
};
use crate::math::{self as m, Unit};

use thunderdome as td;

/// Anchors closer than this have no usable direction between them.
const MIN_LENGTH: f64 = 1e-6;

/// Key type to look up a joint stored in the physics world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JointKey(pub(super) td::Index);

/// Some joints can be set to only work in one direction,
/// to e.g. set a maximum distance while allowing shorter distances.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JointLimit {
    /// Always apply a correction.
    #[default]
    Eq,
    /// Only apply a correction if the distance is less than the target.
    Lt,
    /// Only apply a correction if the distance is greater than the target.
    Gt,
}

/// Type-specific variables for joints.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JointType {
    /// Keep the anchors at a fixed distance from each other.
    Distance { rest_length: f64, limit: JointLimit },
    /// Pin the anchors together while letting the bodies rotate,
    /// optionally within limits on their angle relative to each other.
    Revolute { limits: Option<(f64, f64)> },
    /// A damped spring pulling the anchors toward a rest length.
    /// Acts through forces only and never moves bodies directly.
    Spring {
        rest_length: f64,
        stiffness: f64,
        damping: f64,
    },
    /// Pin the anchors together and lock the relative angle.
    Fixed,
}

/// A joint restricts the relative motion of two bodies.
///
/// [`JointBuilder`][self::JointBuilder] is the preferred
/// way to create these, but the fields are public to allow in-place editing
/// for advanced users.
#[derive(Clone, Copy, Debug)]
pub struct Joint {
    pub bodies: [BodyKey; 2],
    /// Attachment points in each body's local space.
    pub offsets: [m::Vec2; 2],
    /// Fraction of the positional error corrected each substep.
    pub stiffness: f64,
    /// Bounciness of the velocity correction. Zero removes all relative velocity
    /// along the joint axis.
    pub springiness: f64,
    /// Whether the joined bodies can still collide with each other.
    pub collide_connected: bool,
    pub ty: JointType,
    pub(crate) anchors: Option<[AnchorKey; 2]>,
    pub(crate) reference_angle: f64,
}

impl Joint {
    /// Anchors created on the bodies when the joint was added to a world.
    #[inline]
    pub fn anchors(&self) -> Option<[AnchorKey; 2]> {
        self.anchors
    }

    /// Relative angle of the bodies at the time the joint was added.
    #[inline]
    pub fn reference_angle(&self) -> f64 {
        self.reference_angle
    }

    #[inline]
    fn suppresses_collision(&self) -> bool {
        !self.collide_connected
    }

    fn world_anchors(&self, a: &Body, b: &Body) -> Option<[m::Vec2; 2]> {
        let [key_a, key_b] = self.anchors?;
        Some([a.anchor_world(key_a)?, b.anchor_world(key_b)?])
    }

    /// Run one substep of the joint.
    pub(crate) fn constrain(&self, config: &PhysicsConfig, dt: f64, a: &mut Body, b: &mut Body) {
        match self.ty {
            JointType::Distance { rest_length, limit } => {
                self.constrain_length(config, dt, a, b, rest_length, limit);
            }
            JointType::Revolute { limits } => {
                self.constrain_length(config, dt, a, b, 0.0, JointLimit::Eq);
                if let Some((min, max)) = limits {
                    self.constrain_angle(config, dt, a, b, min, max);
                }
            }
            JointType::Spring {
                rest_length,
                stiffness,
                damping,
            } => self.apply_spring(dt, a, b, rest_length, stiffness, damping),
            JointType::Fixed => {
                self.constrain_length(config, dt, a, b, 0.0, JointLimit::Eq);
                self.constrain_angle(config, dt, a, b, 0.0, 0.0);
            }
        }
    }

    fn constrain_length(
        &self,
        config: &PhysicsConfig,
        dt: f64,
        a: &mut Body,
        b: &mut Body,
        rest_length: f64,
        limit: JointLimit,
    ) {
        let Some([anchor_a, anchor_b]) = self.world_anchors(a, b) else {
            return;
        };
        let delta = anchor_b - anchor_a;
        let length = delta.mag();
        if length < MIN_LENGTH {
            return;
        }
        let dir = delta / length;
        let error = length - rest_length;
        let applies = match limit {
            JointLimit::Eq => true,
            JointLimit::Lt => error < 0.0,
            JointLimit::Gt => error > 0.0,
        };
        if !applies {
            return;
        }

        separate(a, b, dir, -error * self.stiffness);

        let Some([anchor_a, anchor_b]) = self.world_anchors(a, b) else {
            return;
        };
        let residual = (anchor_b - anchor_a).dot(dir) - rest_length;
        let offsets = [anchor_a - a.position(), anchor_b - b.position()];
        let eff = effective_mass([a, b], offsets, dir);
        if eff <= 0.0 {
            return;
        }
        let normal_vel = relative_velocity(a, b, offsets).dot(dir);
        let impulse =
            -((1.0 + self.springiness) * normal_vel + config.joint_beta / dt * residual) / eff;
        let impulse = match limit {
            JointLimit::Eq => impulse,
            // a strut only pushes and a rope only pulls
            JointLimit::Lt => impulse.max(0.0),
            JointLimit::Gt => impulse.min(0.0),
        };
        apply_pair_impulse(a, b, offsets, dir * impulse);
    }

    fn constrain_angle(
        &self,
        config: &PhysicsConfig,
        dt: f64,
        a: &mut Body,
        b: &mut Body,
        min: f64,
        max: f64,
    ) {
        let relative = b.rotation() - a.rotation() - self.reference_angle;
        let error = if relative < min {
            relative - min
        } else if relative > max {
            relative - max
        } else {
            return;
        };
        let inv_inertias = [a.moment_of_inertia().inv(), b.moment_of_inertia().inv()];
        let inv_sum = inv_inertias[0] + inv_inertias[1];
        if inv_sum <= 0.0 {
            return;
        }

        let correction = error * self.stiffness / inv_sum;
        a.set_rotation(a.rotation() + correction * inv_inertias[0]);
        b.set_rotation(b.rotation() - correction * inv_inertias[1]);

        let residual = b.rotation() - a.rotation() - self.reference_angle
            - if error < 0.0 { min } else { max };
        let relative_vel = b.velocity.angular - a.velocity.angular;
        let impulse = -(relative_vel + config.joint_beta / dt * residual) / inv_sum;
        let impulse = if min == max {
            impulse
        } else if error < 0.0 {
            impulse.max(0.0)
        } else {
            impulse.min(0.0)
        };
        a.velocity.angular -= impulse * inv_inertias[0];
        b.velocity.angular += impulse * inv_inertias[1];
    }

    fn apply_spring(
        &self,
        dt: f64,
        a: &mut Body,
        b: &mut Body,
        rest_length: f64,
        stiffness: f64,
        damping: f64,
    ) {
        let Some([anchor_a, anchor_b]) = self.world_anchors(a, b) else {
            return;
        };
        let Some(dir) = Unit::try_new(anchor_b - anchor_a) else {
            return;
        };
        let error = (anchor_b - anchor_a).mag() - rest_length;
        let offsets = [anchor_a - a.position(), anchor_b - b.position()];
        let normal_vel = relative_velocity(a, b, offsets).dot(*dir);
        let force = -stiffness * error - damping * normal_vel;
        apply_pair_impulse(a, b, offsets, *dir * (force * dt));
    }
}

/// Pull an anchor on a body toward a point in the world,
/// correcting `stiffness` of the distance positionally
/// and steering the velocity of the anchor toward the target.
pub(crate) fn constrain_to_point(
    body: &mut Body,
    anchor: AnchorKey,
    target: m::Vec2,
    stiffness: f64,
    beta: f64,
    dt: f64,
) {
    if body.is_static() {
        return;
    }
    let Some(anchor_pos) = body.anchor_world(anchor) else {
        return;
    };
    let Some(dir) = Unit::try_new(target - anchor_pos) else {
        return;
    };
    body.translate((target - anchor_pos) * stiffness);

    let Some(anchor_pos) = body.anchor_world(anchor) else {
        return;
    };
    let residual = (target - anchor_pos).dot(*dir);
    let offset = anchor_pos - body.position();
    let offset_cross_dir = m::cross(offset, *dir);
    let eff = body.mass().inv() + offset_cross_dir * offset_cross_dir * body.moment_of_inertia().inv();
    if eff <= 0.0 {
        return;
    }
    let vel = body.velocity.point_velocity(offset).dot(*dir);
    let impulse = (beta / dt * residual - vel) / eff;
    body.apply_impulse(*dir * impulse, offset);
}

/// A builder that allows ergonomic construction of different joints.
#[derive(Clone, Copy, Debug)]
pub struct JointBuilder {
    bodies: [BodyKey; 2],
    offsets: [m::Vec2; 2],
    stiffness: f64,
    springiness: f64,
    collide_connected: bool,
    limit: JointLimit,
}

impl JointBuilder {
    /// Start building a joint between two bodies.
    /// By default the joint is attached at both centers of mass,
    /// fully stiff and prevents the bodies from colliding with each other.
    pub fn new(a: BodyKey, b: BodyKey) -> Self {
        Self {
            bodies: [a, b],
            offsets: [m::Vec2::zero(); 2],
            stiffness: 1.0,
            springiness: 0.0,
            collide_connected: false,
            limit: JointLimit::Eq,
        }
    }

    /// Set the attachment points relative to each body's center of mass, in body-local space.
    pub fn with_anchors(mut self, a: m::Vec2, b: m::Vec2) -> Self {
        self.offsets = [a, b];
        self
    }

    /// Fraction of positional error corrected each substep, between 0 and 1.
    pub fn with_stiffness(mut self, stiffness: f64) -> Self {
        self.stiffness = stiffness.clamp(0.0, 1.0);
        self
    }

    pub fn with_springiness(mut self, springiness: f64) -> Self {
        self.springiness = springiness.max(0.0);
        self
    }

    /// Let the joined bodies collide with each other.
    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }

    /// Set the direction in which a distance joint is enforced.
    pub fn with_limit(mut self, limit: JointLimit) -> Self {
        self.limit = limit;
        self
    }

    pub fn build_distance(self, rest_length: f64) -> Joint {
        let limit = self.limit;
        self.build(JointType::Distance {
            rest_length: rest_length.max(0.0),
            limit,
        })
    }

    /// A pin joint. Limits are the minimum and maximum angle of the second body
    /// relative to the first, measured from their angle when the joint is added.
    pub fn build_revolute(self, limits: Option<(f64, f64)>) -> Joint {
        let limits = limits.map(|(lo, hi)| (lo.min(hi), lo.max(hi)));
        self.build(JointType::Revolute { limits })
    }

    pub fn build_spring(self, rest_length: f64, stiffness: f64, damping: f64) -> Joint {
        self.build(JointType::Spring {
            rest_length: rest_length.max(0.0),
            stiffness,
            damping,
        })
    }

    pub fn build_fixed(self) -> Joint {
        self.build(JointType::Fixed)
    }

    fn build(self, ty: JointType) -> Joint {
        Joint {
            bodies: self.bodies,
            offsets: self.offsets,
            stiffness: self.stiffness,
            springiness: self.springiness,
            collide_connected: self.collide_connected,
            ty,
            anchors: None,
            reference_angle: 0.0,
        }
    }
}

/// Manager struct holding joints inside of a physics world.
///
/// Also keeps track of joint groups:
/// bodies connected through joints that don't allow collision share a group
/// and never collide with each other.
#[derive(Clone, Debug, Default)]
pub struct JointSet {
    joints: td::Arena<Joint>,
    next_group: u32,
}

impl JointSet {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Attach a joint to its bodies and store it.
    ///
    /// Panics if the joint connects a body to itself or a body doesn't exist.
    pub(super) fn insert(&mut self, mut joint: Joint, bodies: &mut BodySet) -> JointKey {
        let [key_a, key_b] = joint.bodies;
        assert!(key_a != key_b, "bug: tried to join a body to itself");
        let (Some(a), Some(b)) = bodies.get2_mut(key_a, key_b) else {
            panic!("bug: tried to join a body that doesn't exist");
        };
        joint.anchors = Some([a.add_anchor(joint.offsets[0]), b.add_anchor(joint.offsets[1])]);
        joint.reference_angle = b.rotation() - a.rotation();

        if joint.suppresses_collision() {
            self.merge_groups(key_a, key_b, bodies);
        }
        let key = JointKey(self.joints.insert(joint));
        log::debug!("Added joint {:?} between {:?} and {:?}", key.0, key_a.0, key_b.0);
        key
    }

    /// Remove a joint along with its anchors, returning it if it still existed.
    pub(super) fn remove(&mut self, key: JointKey, bodies: &mut BodySet) -> Option<Joint> {
        let joint = self.joints.remove(key.0)?;
        detach(&joint, bodies);
        if joint.suppresses_collision() {
            self.rebuild_groups(bodies);
        }
        log::debug!("Removed joint {:?}", key.0);
        Some(joint)
    }

    /// Remove every joint attached to a body.
    pub(super) fn remove_attached(&mut self, body: BodyKey, bodies: &mut BodySet) -> usize {
        let attached: Vec<td::Index> = self
            .joints
            .iter()
            .filter(|(_, j)| j.bodies.contains(&body))
            .map(|(idx, _)| idx)
            .collect();
        let mut regroup = false;
        for idx in &attached {
            if let Some(joint) = self.joints.remove(*idx) {
                detach(&joint, bodies);
                regroup |= joint.suppresses_collision();
            }
        }
        if regroup {
            self.rebuild_groups(bodies);
        }
        attached.len()
    }

    /// Access a joint, if it still exists.
    #[inline]
    pub fn get(&self, key: JointKey) -> Option<&Joint> {
        self.joints.get(key.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointKey, &Joint)> + '_ {
        self.joints.iter().map(|(idx, joint)| (JointKey(idx), joint))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    /// Run one substep of every joint.
    pub(super) fn constrain_all(&self, config: &PhysicsConfig, dt: f64, bodies: &mut BodySet) {
        let _span = tracy_span!("constrain joints", "constrain_all");
        for (_, joint) in self.joints.iter() {
            if let (Some(a), Some(b)) = bodies.get2_mut(joint.bodies[0], joint.bodies[1]) {
                joint.constrain(config, dt, a, b);
            }
        }
    }

    fn merge_groups(&mut self, key_a: BodyKey, key_b: BodyKey, bodies: &mut BodySet) {
        let groups = [
            bodies.get(key_a).and_then(|b| b.joint_group),
            bodies.get(key_b).and_then(|b| b.joint_group),
        ];
        let group = match groups {
            [Some(ga), Some(gb)] => {
                if ga != gb {
                    for (_, body) in bodies.iter_mut() {
                        if body.joint_group == Some(gb) {
                            body.joint_group = Some(ga);
                        }
                    }
                }
                ga
            }
            [Some(g), None] | [None, Some(g)] => g,
            [None, None] => {
                let g = self.next_group;
                self.next_group += 1;
                g
            }
        };
        for key in [key_a, key_b] {
            if let Some(body) = bodies.get_mut(key) {
                body.joint_group = Some(group);
            }
        }
    }

    fn rebuild_groups(&mut self, bodies: &mut BodySet) {
        for (_, body) in bodies.iter_mut() {
            body.joint_group = None;
        }
        self.next_group = 0;
        let pairs: Vec<[BodyKey; 2]> = self
            .joints
            .iter()
            .filter(|(_, j)| j.suppresses_collision())
            .map(|(_, j)| j.bodies)
            .collect();
        for [a, b] in pairs {
            self.merge_groups(a, b, bodies);
        }
    }
}

fn detach(joint: &Joint, bodies: &mut BodySet) {
    let Some(anchors) = joint.anchors else {
        return;
    };
    for (body_key, anchor) in joint.bodies.iter().zip(anchors) {
        if let Some(body) = bodies.get_mut(*body_key) {
            body.remove_anchor(anchor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{collision::SpatialHashParams, BodyOptions};
    use std::f64::consts::PI;

    fn world() -> (BodySet, JointSet) {
        (BodySet::new(SpatialHashParams::default()), JointSet::new())
    }

    fn ball(set: &mut BodySet, x: f64, y: f64) -> BodyKey {
        set.insert(Body::circle(x, y, 0.5, BodyOptions::default()).unwrap())
    }

    fn distance(set: &BodySet, a: BodyKey, b: BodyKey) -> f64 {
        (set.get(b).unwrap().position() - set.get(a).unwrap().position()).mag()
    }

    #[test]
    fn groups_merge_and_split() {
        let (mut bodies, mut joints) = world();
        let a = ball(&mut bodies, 0.0, 0.0);
        let b = ball(&mut bodies, 2.0, 0.0);
        let c = ball(&mut bodies, 4.0, 0.0);
        let d = ball(&mut bodies, 6.0, 0.0);
        let group = |bodies: &BodySet, k| bodies.get(k).unwrap().joint_group();

        let ab = joints.insert(JointBuilder::new(a, b).build_distance(2.0), &mut bodies);
        let cd = joints.insert(JointBuilder::new(c, d).build_distance(2.0), &mut bodies);
        assert_ne!(group(&bodies, a), group(&bodies, c));
        // joining b and c merges the two groups
        let bc = joints.insert(JointBuilder::new(b, c).build_distance(2.0), &mut bodies);
        assert!(group(&bodies, a).is_some());
        assert!([b, c, d].iter().all(|k| group(&bodies, *k) == group(&bodies, a)));

        // anchors were created on the bodies
        assert_eq!(bodies.get(b).unwrap().anchor_count(), 2);

        joints.remove(bc, &mut bodies);
        assert_eq!(group(&bodies, a), group(&bodies, b));
        assert_eq!(group(&bodies, c), group(&bodies, d));
        assert_ne!(group(&bodies, a), group(&bodies, c));
        assert_eq!(bodies.get(b).unwrap().anchor_count(), 1);

        joints.remove(ab, &mut bodies);
        assert_eq!(group(&bodies, a), None);
        assert!(joints.remove(ab, &mut bodies).is_none());
        assert!(joints.get(cd).is_some());
    }

    #[test]
    fn colliding_joints_dont_group() {
        let (mut bodies, mut joints) = world();
        let a = ball(&mut bodies, 0.0, 0.0);
        let b = ball(&mut bodies, 2.0, 0.0);
        joints.insert(
            JointBuilder::new(a, b)
                .with_collide_connected(true)
                .build_spring(2.0, 10.0, 1.0),
            &mut bodies,
        );
        assert_eq!(bodies.get(a).unwrap().joint_group(), None);
        assert_eq!(joints.remove_attached(b, &mut bodies), 1);
        assert!(joints.is_empty());
        assert_eq!(bodies.get(a).unwrap().anchor_count(), 0);
    }

    #[test]
    #[should_panic]
    fn joining_body_to_itself_panics() {
        let (mut bodies, mut joints) = world();
        let a = ball(&mut bodies, 0.0, 0.0);
        joints.insert(JointBuilder::new(a, a).build_fixed(), &mut bodies);
    }

    #[test]
    fn distance_joint_corrects_length() {
        let config = PhysicsConfig::default();
        let (mut bodies, mut joints) = world();
        let a = ball(&mut bodies, 0.0, 0.0);
        let b = ball(&mut bodies, 3.0, 0.0);
        bodies.get_mut(b).unwrap().velocity.linear = m::Vec2::new(1.0, 0.0);
        joints.insert(JointBuilder::new(a, b).build_distance(2.0), &mut bodies);

        joints.constrain_all(&config, 0.01, &mut bodies);
        assert!((distance(&bodies, a, b) - 2.0).abs() < 1e-9);
        // both moved halfway
        assert!((bodies.get(a).unwrap().position().x - 0.5).abs() < 1e-9);
        // relative velocity along the axis is gone, momentum is conserved
        let va = bodies.get(a).unwrap().velocity.linear;
        let vb = bodies.get(b).unwrap().velocity.linear;
        assert!((vb.x - va.x).abs() < 1e-9);
        assert!((va.x + vb.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rope_only_pulls() {
        let config = PhysicsConfig::default();
        let (mut bodies, mut joints) = world();
        let a = ball(&mut bodies, 0.0, 0.0);
        let b = ball(&mut bodies, 1.0, 0.0);
        bodies.get_mut(b).unwrap().velocity.linear = m::Vec2::new(-1.0, 0.0);
        joints.insert(
            JointBuilder::new(a, b)
                .with_limit(JointLimit::Gt)
                .build_distance(2.0),
            &mut bodies,
        );
        joints.constrain_all(&config, 0.01, &mut bodies);
        assert!((distance(&bodies, a, b) - 1.0).abs() < 1e-12);
        assert_eq!(bodies.get(b).unwrap().velocity.linear, m::Vec2::new(-1.0, 0.0));

        bodies.get_mut(b).unwrap().set_position(m::Vec2::new(3.0, 0.0));
        joints.constrain_all(&config, 0.01, &mut bodies);
        assert!((distance(&bodies, a, b) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn partial_stiffness() {
        let config = PhysicsConfig::default();
        let (mut bodies, mut joints) = world();
        let a = bodies.insert(Body::circle(0.0, 0.0, 0.5, BodyOptions::fixed()).unwrap());
        let b = ball(&mut bodies, 4.0, 0.0);
        joints.insert(
            JointBuilder::new(a, b).with_stiffness(0.5).build_distance(2.0),
            &mut bodies,
        );
        joints.constrain_all(&config, 0.01, &mut bodies);
        // only the dynamic body moves, by half the error
        assert_eq!(bodies.get(a).unwrap().position(), m::Vec2::zero());
        assert!((distance(&bodies, a, b) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn spring_pulls_stretched_bodies_together() {
        let config = PhysicsConfig::default();
        let (mut bodies, mut joints) = world();
        let a = ball(&mut bodies, 0.0, 0.0);
        let b = ball(&mut bodies, 3.0, 0.0);
        joints.insert(
            JointBuilder::new(a, b).build_spring(2.0, 10.0, 0.5),
            &mut bodies,
        );
        joints.constrain_all(&config, 0.01, &mut bodies);
        // springs never snap positions
        assert!((distance(&bodies, a, b) - 3.0).abs() < 1e-12);
        assert!(bodies.get(a).unwrap().velocity.linear.x > 0.0);
        assert!(bodies.get(b).unwrap().velocity.linear.x < 0.0);
    }

    #[test]
    fn revolute_limits_and_fixed_lock() {
        let config = PhysicsConfig::default();
        let (mut bodies, mut joints) = world();
        let a = bodies.insert(Body::rect(0.0, 0.0, 1.0, 1.0, BodyOptions::fixed()).unwrap());
        let b = bodies.insert(Body::rect(1.0, 0.0, 1.0, 1.0, BodyOptions::default()).unwrap());
        let hinge = joints.insert(
            JointBuilder::new(a, b)
                .with_anchors(m::Vec2::new(0.5, 0.0), m::Vec2::new(-0.5, 0.0))
                .build_revolute(Some((-PI / 4.0, PI / 4.0))),
            &mut bodies,
        );

        // within limits nothing is corrected
        bodies.get_mut(b).unwrap().set_rotation(0.5);
        joints.constrain_all(&config, 0.01, &mut bodies);
        assert!((bodies.get(b).unwrap().rotation() - 0.5).abs() < 1e-12);

        bodies.get_mut(b).unwrap().set_rotation(1.5);
        bodies.get_mut(b).unwrap().velocity.angular = 2.0;
        joints.constrain_all(&config, 0.01, &mut bodies);
        assert!((bodies.get(b).unwrap().rotation() - PI / 4.0).abs() < 1e-9);
        assert!(bodies.get(b).unwrap().velocity.angular <= 1e-9);

        joints.remove(hinge, &mut bodies);
        joints.insert(JointBuilder::new(a, b).build_fixed(), &mut bodies);
        let angle = bodies.get(b).unwrap().rotation();
        bodies.get_mut(b).unwrap().set_rotation(angle + 0.3);
        joints.constrain_all(&config, 0.01, &mut bodies);
        assert!((bodies.get(b).unwrap().rotation() - angle).abs() < 1e-9);
    }

    #[test]
    fn anchor_pinning() {
        let mut body = Body::rect(0.0, 0.0, 2.0, 2.0, BodyOptions::default()).unwrap();
        let anchor = body.add_anchor(m::Vec2::new(1.0, 0.0));
        let target = m::Vec2::new(3.0, 1.0);
        constrain_to_point(&mut body, anchor, target, 1.0, 0.2, 0.01);
        assert!((body.anchor_world(anchor).unwrap() - target).mag() < 1e-9);

        let mut fixed = Body::rect(0.0, 0.0, 2.0, 2.0, BodyOptions::fixed()).unwrap();
        let anchor = fixed.add_anchor(m::Vec2::new(1.0, 0.0));
        constrain_to_point(&mut fixed, anchor, target, 1.0, 0.2, 0.01);
        assert_eq!(fixed.position(), m::Vec2::zero());
    }
}
