/// Open a named profiling zone that lasts until the end of the enclosing scope.
/// Does nothing unless the `tracy` feature is enabled and a client is running.
macro_rules! tracy_span {
    ($name:literal, $fn_name:literal) => {
        tracy_client::Client::running()
            .map(|client| client.span_alloc(Some($name), $fn_name, file!(), line!(), 0))
    };
}

pub mod math;
pub use math::{uv, Angle, Rotor2, Unit, Vec2, Vec2Ext};

pub mod event;
pub use event::{Commands, ContactEvent, ContactEventKind, EventSink};

pub mod physics;
pub use physics::{
    body::{AnchorKey, Body, BodyId, BodyOptions, Mass, Material},
    body_set::{BodyKey, BodySet},
    collision::{
        self, intersection_check, ContactPoint, ContactPoints, Manifold, PairKey, Shape,
        ShapeError, SpatialHash, SpatialHashParams, AABB,
    },
    config::{PhysicsConfig, SolverKind},
    forcefield::{self, ForceField},
    joint::{Joint, JointBuilder, JointKey, JointLimit, JointSet, JointType},
    Physics, Velocity,
};
