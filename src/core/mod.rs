//! Core types describing articulated bodies and their per-step state.

pub mod articulations;
pub mod body;
pub mod types;

pub use articulations::{JointType, Link, LinkState, Multibody, RootJoint};
pub use body::{BodyDynamics, BodyEntry};
pub use types::{MassProperties, Transform, Velocity, Wrench};
