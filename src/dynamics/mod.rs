//! Simulation dynamics: penalty contact model, Gauss-Seidel solver,
//! articulated forward dynamics, integration and per-mode stepping.

pub mod forward;
pub mod high_gain;
pub mod integrator;
pub mod kinematics;
pub mod penalty;
pub mod projection;
pub mod solver;

pub use forward::DynamicsFrame;
pub use high_gain::{HighGainController, ReferenceMotion};
pub use integrator::Integrator;
pub use penalty::{FrictionForce, FrictionRegime, PenaltyModel};
pub use solver::{ContactSolution, GaussSeidelSolver, SolverReport};
