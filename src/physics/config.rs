use super::collision::{SpatialHashParams, AABB};
use crate::math as m;

/// Which velocity solver resolves contacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-types", derive(serde::Deserialize, serde::Serialize))]
pub enum SolverKind {
    /// Impulses computed per contact from the state before any of them are applied,
    /// with the full penetration removed positionally.
    SplitImpulse,
    /// Soft constraints with impulses accumulated and warm started across substeps.
    /// Much more stable when stacking.
    #[default]
    Soft,
}

/// Parameters of a physics world.
///
/// Every field has a default, so a config file only needs to mention what it changes.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize),
    serde(default)
)]
pub struct PhysicsConfig {
    /// Downward acceleration. Positive y points down.
    pub gravity: f64,
    /// Number of substeps each tick is split into.
    pub substeps: usize,
    /// Region covered by the spatial hash.
    pub world_bounds: AABB,
    /// Cell size of the spatial hash.
    pub cell_size: f64,
    /// Remove bodies that leave `world_bounds` completely.
    pub remove_off_bounds: bool,
    pub solver: SolverKind,
    /// Number of passes over all contacts per substep.
    /// More passes let impulses travel further through stacks of bodies.
    pub solver_iterations: usize,
    /// Penetration that's allowed to remain to keep resting contacts stable.
    pub slop: f64,
    /// Fraction of the remaining penetration fed back as velocity bias each substep.
    pub baumgarte: f64,
    /// Stiffness of soft contacts in cycles per second.
    pub contact_hertz: f64,
    pub contact_damping_ratio: f64,
    /// Upper limit of the velocity used to push overlapping bodies apart.
    pub max_bias_velocity: f64,
    /// Relative approach speed below which contacts don't bounce.
    pub restitution_threshold: f64,
    /// Fraction of joint error fed back as velocity bias each substep.
    pub joint_beta: f64,
    pub initial_capacity: usize,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            substeps: 8,
            world_bounds: AABB::new(m::Vec2::new(-100.0, -100.0), m::Vec2::new(100.0, 100.0)),
            cell_size: 4.0,
            remove_off_bounds: false,
            solver: SolverKind::default(),
            solver_iterations: 8,
            slop: 0.01,
            baumgarte: 0.2,
            contact_hertz: 30.0,
            contact_damping_ratio: 10.0,
            max_bias_velocity: 4.0,
            restitution_threshold: 0.5,
            joint_beta: 0.2,
            initial_capacity: 64,
        }
    }
}

impl PhysicsConfig {
    pub(crate) fn hash_params(&self) -> SpatialHashParams {
        SpatialHashParams {
            bounds: self.world_bounds,
            cell_size: self.cell_size,
            initial_capacity: self.initial_capacity,
        }
    }
}

#[cfg(all(test, feature = "serde-types"))]
mod tests {
    use super::*;

    #[test]
    fn load_partial_config() {
        let config: PhysicsConfig = ron::from_str(
            "(
                gravity: 20.0,
                substeps: 4,
                solver: SplitImpulse,
                remove_off_bounds: true,
            )",
        )
        .expect("config should parse");
        assert_eq!(config.gravity, 20.0);
        assert_eq!(config.substeps, 4);
        assert_eq!(config.solver, SolverKind::SplitImpulse);
        assert!(config.remove_off_bounds);
        // everything else is default
        let default = PhysicsConfig::default();
        assert_eq!(config.slop, default.slop);
        assert_eq!(config.world_bounds, default.world_bounds);
    }

    #[test]
    fn config_roundtrips_through_ron() {
        let config = PhysicsConfig {
            cell_size: 1.5,
            ..Default::default()
        };
        let text = ron::to_string(&config).expect("config should serialize");
        let parsed: PhysicsConfig = ron::from_str(&text).expect("config should parse");
        assert_eq!(parsed, config);
    }
}
