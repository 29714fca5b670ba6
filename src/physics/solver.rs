//! Velocity-level contact resolution.
//!
//! Two solvers are available, see [`SolverKind`].
//! Both work on every contact found during a substep at once.
//! They first push the bodies apart positionally along the contact normals
//! and then apply normal and friction impulses at each contact point,
//! sweeping over all of the contacts several times so that impulses
//! can travel through stacks of bodies.

use super::{
    body_set::{BodyKey, BodySet},
    collision::{Manifold, PairKey},
    config::{PhysicsConfig, SolverKind},
    Body,
};
use crate::math::{self as m, Unit};

use std::collections::HashMap;
use std::f64::consts::PI;

/// A contact detected during a substep, waiting to be resolved.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Contact {
    /// The manifold normal points from the first body to the second.
    pub bodies: [BodyKey; 2],
    pub pair: PairKey,
    pub manifold: Manifold,
}

/// Contact solver state that persists across substeps and ticks.
#[derive(Debug, Default)]
pub(crate) struct ContactSolver {
    impulse_cache: ImpulseCache,
    // reused between substeps to avoid allocating
    constraints: Vec<ContactConstraint>,
}

impl ContactSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every contact found during a substep.
    pub fn solve(
        &mut self,
        config: &PhysicsConfig,
        dt: f64,
        bodies: &mut BodySet,
        contacts: &[Contact],
    ) {
        if contacts.is_empty() {
            return;
        }
        let _span = tracy_span!("solve contacts", "solve");
        match config.solver {
            SolverKind::SplitImpulse => solve_split(config, dt, bodies, contacts),
            SolverKind::Soft => self.solve_soft(config, dt, bodies, contacts),
        }
    }

    /// Forget impulses of contacts that didn't exist during the last tick.
    pub fn end_tick(&mut self) {
        self.impulse_cache.swap();
    }

    fn solve_soft(
        &mut self,
        config: &PhysicsConfig,
        dt: f64,
        bodies: &mut BodySet,
        contacts: &[Contact],
    ) {
        let hertz = config.contact_hertz.min(0.25 / dt);
        let soft = Softness::new(hertz, config.contact_damping_ratio, dt);

        let mut constraints = std::mem::take(&mut self.constraints);
        constraints.clear();
        {
            let _span = tracy_span!("prepare contacts", "solve_soft");
            for contact in contacts {
                let (Some(a), Some(b)) = bodies.get2_mut(contact.bodies[0], contact.bodies[1])
                else {
                    continue;
                };
                let constraint =
                    ContactConstraint::prepare(config, dt, soft, a, b, contact, &self.impulse_cache);
                constraints.push(constraint);
            }
        }

        {
            let _span = tracy_span!("warm start", "solve_soft");
            for constraint in &constraints {
                let (Some(a), Some(b)) = bodies.get2_mut(constraint.bodies[0], constraint.bodies[1])
                else {
                    continue;
                };
                constraint.warm_start(a, b);
            }
        }

        {
            let _span = tracy_span!("solve velocities", "solve_soft");
            for _ in 0..config.solver_iterations.max(1) {
                for constraint in &mut constraints {
                    let (Some(a), Some(b)) =
                        bodies.get2_mut(constraint.bodies[0], constraint.bodies[1])
                    else {
                        continue;
                    };
                    constraint.solve(a, b, true);
                }
            }
            // relax the velocity added by the bias
            for constraint in &mut constraints {
                let (Some(a), Some(b)) = bodies.get2_mut(constraint.bodies[0], constraint.bodies[1])
                else {
                    continue;
                };
                constraint.solve(a, b, false);
            }
        }

        for constraint in &mut constraints {
            let (Some(a), Some(b)) = bodies.get2_mut(constraint.bodies[0], constraint.bodies[1])
            else {
                continue;
            };
            constraint.apply_restitution(config, a, b);
        }

        for constraint in &constraints {
            for (idx, point) in constraint.points.iter().enumerate() {
                let Some(point) = point else {
                    continue;
                };
                self.impulse_cache.insert(
                    (constraint.pair, idx as u8),
                    if point.bounced {
                        CachedImpulse::default()
                    } else {
                        CachedImpulse {
                            normal: point.normal_impulse,
                            tangent: point.tangent_impulse,
                        }
                    },
                );
            }
        }
        self.constraints = constraints;
    }
}

/// Per-point state of a soft contact during one substep.
#[derive(Clone, Copy, Debug)]
struct PointConstraint {
    offsets: [m::Vec2; 2],
    normal_mass: f64,
    tangent_mass: f64,
    /// Normal velocity before any impulses of this substep.
    approach_vel: f64,
    /// Distance left to travel before the surfaces are exactly `slop` deep,
    /// negative if they're deeper than that.
    separation: f64,
    normal_impulse: f64,
    tangent_impulse: f64,
    bounced: bool,
}

#[derive(Clone, Copy, Debug)]
struct ContactConstraint {
    bodies: [BodyKey; 2],
    pair: PairKey,
    normal: m::Vec2,
    tangent: m::Vec2,
    restitution: f64,
    static_friction: f64,
    kinetic_friction: f64,
    dt: f64,
    soft: Softness,
    max_bias_velocity: f64,
    points: [Option<PointConstraint>; 2],
}

impl ContactConstraint {
    fn prepare(
        config: &PhysicsConfig,
        dt: f64,
        soft: Softness,
        a: &mut Body,
        b: &mut Body,
        contact: &Contact,
        cache: &ImpulseCache,
    ) -> Self {
        let manifold = &contact.manifold;
        let normal = *manifold.normal;
        let correction = (manifold.depth - config.slop).max(0.0);
        separate(a, b, normal, correction);

        let mut points = [None, None];
        for ((idx, cp), slot) in manifold.points.iter().enumerate().zip(points.iter_mut()) {
            let offsets = [cp.position - a.position(), cp.position - b.position()];
            let normal_eff = effective_mass([a, b], offsets, normal);
            if normal_eff <= 0.0 {
                continue;
            }
            let tangent_eff = effective_mass([a, b], offsets, m::left_normal(normal));
            let remaining_depth = (cp.depth - correction).max(0.0);
            // the deepest point is left exactly at slop, up to rounding
            let separation = config.slop - remaining_depth;
            let separation = if separation.abs() < m::EPSILON {
                0.0
            } else {
                separation
            };
            let cached = cache.get((contact.pair, idx as u8));
            *slot = Some(PointConstraint {
                offsets,
                normal_mass: 1.0 / normal_eff,
                tangent_mass: if tangent_eff > 0.0 {
                    1.0 / tangent_eff
                } else {
                    0.0
                },
                approach_vel: relative_velocity(a, b, offsets).dot(normal),
                separation,
                normal_impulse: cached.normal,
                tangent_impulse: cached.tangent,
                bounced: false,
            });
        }

        Self {
            bodies: contact.bodies,
            pair: contact.pair,
            normal,
            tangent: m::left_normal(normal),
            restitution: a.material.restitution_with(&b.material),
            static_friction: a.material.static_friction_with(&b.material),
            kinetic_friction: a.material.kinetic_friction_with(&b.material),
            dt,
            soft,
            max_bias_velocity: config.max_bias_velocity,
            points,
        }
    }

    fn warm_start(&self, a: &mut Body, b: &mut Body) {
        for point in self.points.iter().flatten() {
            apply_pair_impulse(
                a,
                b,
                point.offsets,
                self.normal * point.normal_impulse + self.tangent * point.tangent_impulse,
            );
        }
    }

    fn solve(&mut self, a: &mut Body, b: &mut Body, use_bias: bool) {
        let Self {
            normal,
            tangent,
            dt,
            soft,
            ..
        } = *self;
        for point in self.points.iter_mut().flatten() {
            let (bias, mass_scale, impulse_scale) = if point.separation >= 0.0 {
                // speculative, allow approaching up to the point of touching
                (point.separation / dt, 1.0, 0.0)
            } else if use_bias {
                (
                    (soft.bias_rate * point.separation).max(-self.max_bias_velocity),
                    soft.mass_scale,
                    soft.impulse_scale,
                )
            } else {
                (0.0, 1.0, 0.0)
            };
            let normal_vel = relative_velocity(a, b, point.offsets).dot(normal);
            let impulse = -point.normal_mass * mass_scale * (normal_vel + bias)
                - impulse_scale * point.normal_impulse;
            let new_total = (point.normal_impulse + impulse).max(0.0);
            apply_pair_impulse(a, b, point.offsets, normal * (new_total - point.normal_impulse));
            point.normal_impulse = new_total;

            let tangent_vel = relative_velocity(a, b, point.offsets).dot(tangent);
            let candidate = point.tangent_impulse - tangent_vel * point.tangent_mass;
            let new_total = if candidate.abs() <= self.static_friction * point.normal_impulse {
                candidate
            } else {
                let max_friction = self.kinetic_friction * point.normal_impulse;
                candidate.clamp(-max_friction, max_friction)
            };
            apply_pair_impulse(a, b, point.offsets, tangent * (new_total - point.tangent_impulse));
            point.tangent_impulse = new_total;
        }
    }

    fn apply_restitution(&mut self, config: &PhysicsConfig, a: &mut Body, b: &mut Body) {
        if self.restitution == 0.0 {
            return;
        }
        let normal = self.normal;
        for point in self.points.iter_mut().flatten() {
            if point.approach_vel >= -config.restitution_threshold {
                continue;
            }
            let normal_vel = relative_velocity(a, b, point.offsets).dot(normal);
            let impulse =
                -point.normal_mass * (normal_vel + self.restitution * point.approach_vel);
            let new_total = (point.normal_impulse + impulse).max(0.0);
            apply_pair_impulse(a, b, point.offsets, normal * (new_total - point.normal_impulse));
            point.normal_impulse = new_total;
            point.bounced = true;
        }
    }
}

fn solve_split(config: &PhysicsConfig, dt: f64, bodies: &mut BodySet, contacts: &[Contact]) {
    for contact in contacts {
        if let (Some(a), Some(b)) = bodies.get2_mut(contact.bodies[0], contact.bodies[1]) {
            separate(a, b, *contact.manifold.normal, contact.manifold.depth);
        }
    }
    for iteration in 0..config.solver_iterations.max(1) {
        for contact in contacts {
            if let (Some(a), Some(b)) = bodies.get2_mut(contact.bodies[0], contact.bodies[1]) {
                split_impulses(config, dt, a, b, &contact.manifold, iteration == 0);
            }
        }
    }
}

/// One pass of split impulses over a contact.
/// Bounce and bias only happen on the first pass,
/// later ones only remove approach velocity left by other contacts.
fn split_impulses(
    config: &PhysicsConfig,
    dt: f64,
    a: &mut Body,
    b: &mut Body,
    manifold: &Manifold,
    first_pass: bool,
) {
    let normal = *manifold.normal;
    let restitution = if first_pass {
        a.material.restitution_with(&b.material)
    } else {
        0.0
    };
    let static_friction = a.material.static_friction_with(&b.material);
    let kinetic_friction = a.material.kinetic_friction_with(&b.material);
    let point_count = manifold.points.len() as f64;

    // compute every impulse from the same state before applying any of them
    let mut impulses: [Option<([m::Vec2; 2], m::Vec2)>; 2] = [None, None];
    for (slot, cp) in impulses.iter_mut().zip(manifold.points.iter()) {
        let offsets = [cp.position - a.position(), cp.position - b.position()];
        let rel_vel = relative_velocity(a, b, offsets);
        let normal_vel = rel_vel.dot(normal);
        if normal_vel >= 0.0 {
            continue;
        }
        let normal_eff = effective_mass([a, b], offsets, normal);
        if normal_eff <= 0.0 {
            continue;
        }
        let restitution = if -normal_vel < config.restitution_threshold {
            0.0
        } else {
            restitution
        };
        let bias = if first_pass {
            (cp.depth - config.slop).max(0.0) * config.baumgarte / dt
        } else {
            0.0
        };
        let normal_impulse = (-(1.0 + restitution) * normal_vel + bias) / normal_eff;

        let friction = match Unit::try_new(rel_vel - normal * normal_vel) {
            Some(tangent) => {
                let tangent_eff = effective_mass([a, b], offsets, *tangent);
                if tangent_eff > 0.0 {
                    let mut tangent_impulse = -rel_vel.dot(*tangent) / tangent_eff;
                    if tangent_impulse.abs() > static_friction * normal_impulse {
                        tangent_impulse = tangent_impulse.signum() * kinetic_friction * normal_impulse;
                    }
                    *tangent * tangent_impulse
                } else {
                    m::Vec2::zero()
                }
            }
            None => m::Vec2::zero(),
        };

        *slot = Some((offsets, normal * normal_impulse + friction));
    }

    for (offsets, impulse) in impulses.into_iter().flatten() {
        apply_pair_impulse(a, b, offsets, impulse / point_count);
    }
}

//
// shared with joints
//

/// How much of a positional correction each body takes:
/// none for bodies with infinite mass, half each for two movable bodies.
/// `None` if neither can move.
pub(crate) fn correction_shares(a: &Body, b: &Body) -> Option<[f64; 2]> {
    match (a.mass().inv() == 0.0, b.mass().inv() == 0.0) {
        (true, true) => None,
        (true, false) => Some([0.0, 1.0]),
        (false, true) => Some([1.0, 0.0]),
        (false, false) => Some([0.5, 0.5]),
    }
}

/// Move `a` and `b` apart by `distance` along `dir` (which points from `a` to `b`).
pub(crate) fn separate(a: &mut Body, b: &mut Body, dir: m::Vec2, distance: f64) {
    if distance == 0.0 {
        return;
    }
    let Some(shares) = correction_shares(a, b) else {
        return;
    };
    if shares[0] > 0.0 {
        a.translate(dir * (-distance * shares[0]));
    }
    if shares[1] > 0.0 {
        b.translate(dir * (distance * shares[1]));
    }
}

/// Inverse of the effective mass of a pair of points along a direction.
pub(crate) fn effective_mass(bodies: [&Body; 2], offsets: [m::Vec2; 2], dir: m::Vec2) -> f64 {
    let offs_cross_dir = map_pair(&offsets, |r| m::cross(*r, dir));
    let inv_masses = map_pair(&bodies, |b| b.mass().inv());
    let inv_inertias = map_pair(&bodies, |b| b.moment_of_inertia().inv());
    inv_masses[0]
        + inv_masses[1]
        + offs_cross_dir[0] * offs_cross_dir[0] * inv_inertias[0]
        + offs_cross_dir[1] * offs_cross_dir[1] * inv_inertias[1]
}

/// Velocity of the point on `b` relative to the point on `a`.
#[inline]
pub(crate) fn relative_velocity(a: &Body, b: &Body, offsets: [m::Vec2; 2]) -> m::Vec2 {
    b.velocity.point_velocity(offsets[1]) - a.velocity.point_velocity(offsets[0])
}

/// Apply `impulse` to `b` and its opposite to `a`.
#[inline]
pub(crate) fn apply_pair_impulse(a: &mut Body, b: &mut Body, offsets: [m::Vec2; 2], impulse: m::Vec2) {
    a.apply_impulse(-impulse, offsets[0]);
    b.apply_impulse(impulse, offsets[1]);
}

#[inline]
fn map_pair<T, R>(pair: &[T; 2], f: impl Fn(&T) -> R) -> [R; 2] {
    [f(&pair[0]), f(&pair[1])]
}

/// Coefficients of a soft constraint, from a stiffness in cycles per second
/// and a damping ratio.
#[derive(Clone, Copy, Debug)]
struct Softness {
    bias_rate: f64,
    mass_scale: f64,
    impulse_scale: f64,
}

impl Softness {
    fn new(hertz: f64, damping_ratio: f64, dt: f64) -> Self {
        if hertz <= 0.0 {
            return Self {
                bias_rate: 0.0,
                mass_scale: 1.0,
                impulse_scale: 0.0,
            };
        }
        let omega = 2.0 * PI * hertz;
        let a1 = 2.0 * damping_ratio + dt * omega;
        let a2 = dt * omega * a1;
        let a3 = 1.0 / (1.0 + a2);
        Self {
            bias_rate: omega / a1,
            mass_scale: a2 * a3,
            impulse_scale: a3,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct CachedImpulse {
    normal: f64,
    tangent: f64,
}

/// A container to store impulses across substeps and ticks,
/// used for warm starting the solver algorithm.
#[derive(Debug, Default)]
struct ImpulseCache {
    last_tick: HashMap<(PairKey, u8), CachedImpulse>,
    this_tick: HashMap<(PairKey, u8), CachedImpulse>,
}

impl ImpulseCache {
    fn get(&self, key: (PairKey, u8)) -> CachedImpulse {
        self.this_tick
            .get(&key)
            .or_else(|| self.last_tick.get(&key))
            .copied()
            .unwrap_or_default()
    }

    fn insert(&mut self, key: (PairKey, u8), impulse: CachedImpulse) {
        self.this_tick.insert(key, impulse);
    }

    fn swap(&mut self) {
        self.last_tick = std::mem::take(&mut self.this_tick);
    }
}
