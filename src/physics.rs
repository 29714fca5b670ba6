use crate::{
    event::{Commands, ContactEvent, ContactTracker, EventSink},
    math as m,
};

//

pub mod body;
pub use body::{AnchorKey, Body, BodyId, BodyOptions, Mass, Material};

pub mod body_set;
pub use body_set::{BodyKey, BodySet};

pub mod collision;
pub use collision::{Shape, ShapeError, AABB};
use collision::{intersection_check, PairKey};

pub mod config;
pub use config::{PhysicsConfig, SolverKind};

pub mod forcefield;
pub use forcefield::ForceField;

pub mod joint;
pub use joint::{Joint, JointBuilder, JointKey, JointLimit, JointSet, JointType};

mod solver;
use solver::{Contact, ContactSolver};


//

/// Velocity of an object.
///
// Equivalent to a Vec3 but with names for the translational and rotational part.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub struct Velocity {
    /// Linear velocity in metres per second.
    pub linear: m::Vec2,
    /// Angular velocity in radians per second.
    pub angular: f64,
}

impl Default for Velocity {
    fn default() -> Self {
        Velocity {
            linear: m::Vec2::zero(),
            angular: 0.0,
        }
    }
}

impl Velocity {
    /// Get the linear velocity of a point offset from the center of mass.
    pub fn point_velocity(&self, offset: m::Vec2) -> m::Vec2 {
        self.linear + m::cross_scalar(self.angular, offset)
    }
}

impl std::ops::Add for Velocity {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            linear: self.linear + other.linear,
            angular: self.angular + other.angular,
        }
    }
}
impl std::ops::AddAssign for Velocity {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}
impl std::ops::Mul<f64> for Velocity {
    type Output = Velocity;

    fn mul(self, rhs: f64) -> Self::Output {
        Velocity {
            linear: self.linear * rhs,
            angular: self.angular * rhs,
        }
    }
}

/// A physics world.
///
/// Owns the bodies and joints being simulated
/// and advances them in fixed steps with [`tick`][Self::tick].
#[derive(Debug)]
pub struct Physics {
    config: PhysicsConfig,
    bodies: BodySet,
    joints: JointSet,
    solver: ContactSolver,
    contacts: ContactTracker,
    events: EventSink,
    // reused between substeps to avoid allocating
    neighbors: Vec<BodyKey>,
    found_contacts: Vec<Contact>,
}

impl Default for Physics {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

impl Physics {
    pub fn new(config: PhysicsConfig) -> Self {
        Physics {
            config,
            bodies: BodySet::new(config.hash_params()),
            joints: JointSet::new(),
            solver: ContactSolver::new(),
            contacts: ContactTracker::default(),
            events: EventSink::new(),
            neighbors: Vec::new(),
            found_contacts: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    //
    // bodies
    //

    /// Add a body to the world. Returns a key that can be used to access or remove it later.
    pub fn add_body(&mut self, body: Body) -> BodyKey {
        self.bodies.insert(body)
    }

    pub fn add_bodies(&mut self, bodies: impl IntoIterator<Item = Body>) -> Vec<BodyKey> {
        bodies.into_iter().map(|body| self.add_body(body)).collect()
    }

    /// Remove a body from the world along with every joint attached to it.
    /// Contacts it was part of end immediately.
    ///
    /// Panics if the body doesn't exist.
    /// To remove bodies while a tick is running, use [`Commands`] in a contact listener.
    pub fn remove_body(&mut self, key: BodyKey) -> Body {
        assert!(
            self.bodies.contains(key),
            "bug: tried to remove a body that doesn't exist"
        );
        self.joints.remove_attached(key, &mut self.bodies);
        self.contacts.forget_body(key, &mut self.events);
        self.bodies.remove(key)
    }

    pub fn remove_bodies(&mut self, keys: impl IntoIterator<Item = BodyKey>) -> Vec<Body> {
        keys.into_iter().map(|key| self.remove_body(key)).collect()
    }

    #[inline]
    pub fn body(&self, key: BodyKey) -> Option<&Body> {
        self.bodies.get(key)
    }

    /// Mutably access a body.
    ///
    /// The spatial hash catches up with changes to position at the start of the next substep.
    #[inline]
    pub fn body_mut(&mut self, key: BodyKey) -> Option<&mut Body> {
        self.bodies.get_mut(key)
    }

    #[inline]
    pub fn bodies(&self) -> &BodySet {
        &self.bodies
    }

    /// Replace the corners of a polygon body with arcs, see [`Body::round_corners`].
    ///
    /// Panics if the body doesn't exist.
    pub fn round_corners(
        &mut self,
        key: BodyKey,
        radius: f64,
        segments: usize,
    ) -> Result<(), ShapeError> {
        let Some(body) = self.bodies.get_mut(key) else {
            panic!("bug: tried to round corners of a body that doesn't exist");
        };
        body.round_corners(radius, segments)?;
        self.bodies.update(key);
        Ok(())
    }

    /// Find a body containing the given point.
    /// If several do, the one added first wins.
    pub fn query_point(&mut self, point: m::Vec2) -> Option<BodyKey> {
        let mut found = std::mem::take(&mut self.neighbors);
        self.bodies.query_point(point, &mut found);
        let first = found
            .iter()
            .copied()
            .min_by_key(|key| self.bodies.get(*key).and_then(|b| b.id()));
        self.neighbors = found;
        first
    }

    //
    // joints and anchors
    //

    /// Add a joint to the world, creating anchors for it on both bodies.
    ///
    /// Panics if the joint connects a body to itself or either body doesn't exist.
    pub fn add_joint(&mut self, joint: Joint) -> JointKey {
        self.joints.insert(joint, &mut self.bodies)
    }

    /// Remove a joint, returning it if it still existed.
    ///
    /// Joints also disappear when a body they're attached to is removed.
    pub fn remove_joint(&mut self, key: JointKey) -> Option<Joint> {
        self.joints.remove(key, &mut self.bodies)
    }

    #[inline]
    pub fn joint(&self, key: JointKey) -> Option<&Joint> {
        self.joints.get(key)
    }

    #[inline]
    pub fn joints(&self) -> &JointSet {
        &self.joints
    }

    /// Attach a point in body-local coordinates to a body.
    pub fn add_anchor(&mut self, body: BodyKey, local_point: m::Vec2) -> Option<AnchorKey> {
        self.bodies
            .get_mut(body)
            .map(|body| body.add_anchor(local_point))
    }

    pub fn remove_anchor(&mut self, body: BodyKey, anchor: AnchorKey) -> Option<m::Vec2> {
        self.bodies.get_mut(body)?.remove_anchor(anchor)
    }

    /// Drive an anchor toward a point in the world,
    /// e.g. to drag a body around with the mouse.
    ///
    /// `stiffness` is the fraction of the distance corrected immediately.
    /// Invalid timesteps are ignored like in [`tick`][Self::tick].
    pub fn apply_anchor_correction(
        &mut self,
        body: BodyKey,
        anchor: AnchorKey,
        target: m::Vec2,
        stiffness: f64,
        dt: f64,
    ) {
        if !(dt > 0.0 && dt.is_finite()) {
            log::warn!("Ignoring anchor correction with invalid timestep {dt}");
            return;
        }
        if let Some(b) = self.bodies.get_mut(body) {
            joint::constrain_to_point(
                b,
                anchor,
                target,
                stiffness.clamp(0.0, 1.0),
                self.config.joint_beta,
                dt,
            );
            self.bodies.update(body);
        }
    }

    //
    // events
    //

    /// Register a function called for every contact event as it happens.
    pub fn on_contact(&mut self, listener: impl FnMut(&ContactEvent, &mut Commands) + 'static) {
        self.events.add_listener(listener);
    }

    /// Take all contact events produced since the last call.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, ContactEvent> {
        self.events.drain()
    }

    /// Queue changes to be applied at the end of the next tick.
    pub fn commands(&mut self) -> &mut Commands {
        self.events.commands_mut()
    }

    /// Pairs of bodies that touched during the latest tick.
    pub fn contacts(&self) -> impl Iterator<Item = (PairKey, [BodyKey; 2])> + '_ {
        self.contacts.touching()
    }

    //
    // simulation
    //

    /// Advance the simulation by `dt` seconds with gravity from the config.
    pub fn tick(&mut self, dt: f64) {
        let gravity = forcefield::Gravity(m::Vec2::new(0.0, self.config.gravity));
        self.tick_with_field(dt, &gravity);
    }

    /// Advance the simulation by `dt` seconds with accelerations from a force field.
    pub fn tick_with_field(&mut self, dt: f64, field: &impl ForceField) {
        if !(dt > 0.0 && dt.is_finite()) {
            log::warn!("Ignoring physics tick with invalid timestep {dt}");
            return;
        }
        let _span = tracy_span!("physics tick", "tick_with_field");

        let substeps = self.config.substeps.max(1);
        let dt = dt / substeps as f64;
        for _substep in 0..substeps {
            self.substep(dt, field);
        }

        if self.config.remove_off_bounds {
            self.evict_off_bounds();
        }
        self.contacts.finish(&mut self.events);
        self.solver.end_tick();
        self.apply_commands();

        log::trace!(
            "Physics tick done: {} bodies, {} joints, {} contacts",
            self.bodies.len(),
            self.joints.len(),
            self.contacts.touching().count(),
        );
    }

    fn substep(&mut self, dt: f64, field: &impl ForceField) {
        self.joints.constrain_all(&self.config, dt, &mut self.bodies);

        {
            let _span = tracy_span!("integrate", "substep");
            for idx in 0..self.bodies.len() {
                let key = self.bodies.keys()[idx];
                if let Some(body) = self.bodies.get_mut(key) {
                    if body.is_static() {
                        body.contact_points.clear();
                    } else {
                        let acceleration = field.value_at(body.position());
                        body.integrate(dt, acceleration);
                    }
                }
                self.bodies.update(key);
            }
        }

        let mut contacts = std::mem::take(&mut self.found_contacts);
        contacts.clear();
        {
            let _span = tracy_span!("collide", "substep");
            let mut neighbors = std::mem::take(&mut self.neighbors);
            for idx in 0..self.bodies.len() {
                let key = self.bodies.keys()[idx];
                self.bodies.query(key, &mut neighbors);
                for &other in &neighbors {
                    contacts.extend(self.detect_pair(key, other));
                }
            }
            self.neighbors = neighbors;
        }

        self.solver.solve(&self.config, dt, &mut self.bodies, &contacts);
        self.found_contacts = contacts;
    }

    /// Check a body against one of its neighbors, recording the contact if they touch.
    /// Returns the contact if it needs to be resolved.
    fn detect_pair(&mut self, key: BodyKey, other_key: BodyKey) -> Option<Contact> {
        let (Some(body), Some(other)) = self.bodies.get2_mut(key, other_key) else {
            return None;
        };
        // every pair is seen from both sides, only handle it from one of them:
        // the older body if both are static or both can move, otherwise the moving one
        if body.is_static() == other.is_static() {
            if other.id < body.id {
                return None;
            }
        } else if body.is_static() {
            return None;
        }
        if body.joint_group.is_some() && body.joint_group == other.joint_group {
            return None;
        }
        if !body.aabb().intersects(&other.aabb()) {
            return None;
        }
        let manifold = intersection_check(body, other)?;
        let (Some(id), Some(other_id)) = (body.id, other.id) else {
            return None;
        };

        let pair = PairKey::new(id, other_id);
        if let Some(kind) = self.contacts.touch(pair, [key, other_key]) {
            self.events.push(ContactEvent {
                kind,
                bodies: [key, other_key],
                pair,
            });
        }
        for cp in manifold.points.iter() {
            body.contact_points.push(cp.position);
            other.contact_points.push(cp.position);
        }

        if body.is_sensor() || other.is_sensor() || (body.is_static() && other.is_static()) {
            return None;
        }
        Some(Contact {
            bodies: [key, other_key],
            pair,
            manifold,
        })
    }

    fn evict_off_bounds(&mut self) {
        let bounds = self.config.world_bounds;
        let outside: Vec<BodyKey> = self
            .bodies
            .iter()
            .filter(|(_, body)| !body.aabb().intersects(&bounds))
            .map(|(key, _)| key)
            .collect();
        for key in outside {
            log::debug!("Body {:?} left the world bounds, removing it", key.0);
            self.remove_body(key);
        }
    }

    /// Apply changes queued by contact listeners.
    /// Removals can end contacts whose listeners queue more changes,
    /// so this runs until nothing is left.
    fn apply_commands(&mut self) {
        loop {
            let commands = self.events.take_commands();
            if commands.is_empty() {
                break;
            }
            for key in commands.removed_joints {
                self.joints.remove(key, &mut self.bodies);
            }
            for key in commands.removed_bodies {
                if self.bodies.contains(key) {
                    self.remove_body(key);
                }
            }
        }
    }
}
