//! Penalty Dynamics – penalty-method contact and friction for articulated
//! multibody simulation.
//!
//! A [`Session`] owns a [`World`] of multibodies, each advanced by forward
//! dynamics, high-gain replay of a reference motion, or pure kinematics.
//! Contacts reported by a [`CollisionDetector`] are culled, resolved into
//! spring-damper normal forces and stick/slip friction by a Gauss-Seidel
//! sweep, and written into per-link force accumulators before integration.

pub mod archive;
pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod presentation;
pub mod session;
pub mod utils;
pub mod world;

pub use glam::{DMat3, DQuat, DVec3};

pub use archive::{ArchiveValue, ConfigArchive};
pub use collision::{
    contact::{CollisionDetector, ContactCandidate, FixedContacts, NullDetector},
    culling::IntakeStats,
    plane::GroundPlaneDetector,
};
pub use config::{DynamicsMode, IntegrationMode, SimulatorConfig, SolverConfig};
pub use crate::core::{
    articulations::{JointType, Link, Multibody, RootJoint},
    body::{BodyDynamics, BodyEntry},
    types::{MassProperties, Transform, Velocity, Wrench},
};
pub use dynamics::{
    high_gain::{HighGainController, ReferenceMotion},
    penalty::{FrictionForce, FrictionRegime, ImpactMemory, PenaltyModel},
    solver::{ContactSolution, GaussSeidelSolver, SolverReport},
};
pub use error::{Result, SimError};
pub use session::{
    ActivationFailure, BodySpec, InitReport, Session, SessionState, SharedSession, StepReport,
};
pub use utils::{
    allocator::BodyHandle,
    logging::{LogSink, MemorySink, TraceEvent, TraceSink},
};
pub use world::World;
