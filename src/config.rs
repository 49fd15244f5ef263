//! Configuration surface and default constants for the penalty dynamics engine.
//!
//! Every field is guarded by a setter that rejects out-of-range values at
//! assignment time, so a [`SolverConfig`] handed to the solver is always valid.

use glam::DVec3;

use crate::error::{Result, SimError};

/// Standard gravity magnitude (m/s²).
pub const DEFAULT_GRAVITY_ACCELERATION: f64 = 9.80665;

/// Default gravity vector applied in the world (Z-up).
pub const DEFAULT_GRAVITY: [f64; 3] = [0.0, 0.0, -DEFAULT_GRAVITY_ACCELERATION];

/// Default integration timestep (in seconds).
pub const DEFAULT_TIME_STEP: f64 = 0.001;

pub const DEFAULT_PENALTY_KP: f64 = 10_000.0;
pub const DEFAULT_PENALTY_KV: f64 = 10.0;
pub const DEFAULT_STATIC_FRICTION: f64 = 1.0;
pub const DEFAULT_SLIP_FRICTION: f64 = 0.5;
pub const DEFAULT_CONTACT_CULLING_DISTANCE: f64 = 0.005;
pub const DEFAULT_CONTACT_CULLING_DEPTH: f64 = 0.001;
pub const DEFAULT_COEFFICIENT_OF_RESTITUTION: f64 = 0.0;
pub const DEFAULT_ERROR_CRITERION: f64 = 1.0e-3;
pub const DEFAULT_MAX_NUM_ITERATIONS: u32 = 500;
pub const DEFAULT_CONTACT_CORRECTION_DEPTH: f64 = 1.0e-4;
pub const DEFAULT_CONTACT_CORRECTION_VELOCITY_RATIO: f64 = 1.0;

/// Tangential speed (m/s) below which a contact is treated as sticking.
pub const DEFAULT_STICK_VELOCITY: f64 = 1.0e-3;

/// Approach speed (m/s) below which restitution is not applied.
pub const DEFAULT_RESTITUTION_THRESHOLD: f64 = 1.0e-2;

/// Allowed mismatch between a reference motion frame rate and the world rate.
pub const FRAME_RATE_TOLERANCE: f64 = 1.0e-6;

/// How bodies are advanced by the world stepper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DynamicsMode {
    #[default]
    ForwardDynamics,
    HighGain,
    Kinematics,
}

/// Time integration scheme requested by the configuration.
///
/// Only [`IntegrationMode::Euler`] is executed; `RungeKutta` is kept so that
/// archived configurations survive a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IntegrationMode {
    #[default]
    Euler,
    RungeKutta,
}

fn non_negative(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SimError::InvalidParameter {
            name,
            value,
            expected: "a finite value >= 0",
        })
    }
}

fn positive(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SimError::InvalidParameter {
            name,
            value,
            expected: "a finite value > 0",
        })
    }
}

/// Parameters of the penalty contact solver.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    penalty_kp: f64,
    penalty_kv: f64,
    static_friction: f64,
    slip_friction: f64,
    contact_culling_distance: f64,
    contact_culling_depth: f64,
    coefficient_of_restitution: f64,
    gauss_seidel_error_criterion: f64,
    gauss_seidel_max_num_iterations: u32,
    contact_correction_depth: f64,
    contact_correction_velocity_ratio: f64,
    is_2d_mode: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            penalty_kp: DEFAULT_PENALTY_KP,
            penalty_kv: DEFAULT_PENALTY_KV,
            static_friction: DEFAULT_STATIC_FRICTION,
            slip_friction: DEFAULT_SLIP_FRICTION,
            contact_culling_distance: DEFAULT_CONTACT_CULLING_DISTANCE,
            contact_culling_depth: DEFAULT_CONTACT_CULLING_DEPTH,
            coefficient_of_restitution: DEFAULT_COEFFICIENT_OF_RESTITUTION,
            gauss_seidel_error_criterion: DEFAULT_ERROR_CRITERION,
            gauss_seidel_max_num_iterations: DEFAULT_MAX_NUM_ITERATIONS,
            contact_correction_depth: DEFAULT_CONTACT_CORRECTION_DEPTH,
            contact_correction_velocity_ratio: DEFAULT_CONTACT_CORRECTION_VELOCITY_RATIO,
            is_2d_mode: false,
        }
    }
}

impl SolverConfig {
    pub fn penalty_kp(&self) -> f64 {
        self.penalty_kp
    }

    pub fn set_penalty_kp(&mut self, value: f64) -> Result<()> {
        self.penalty_kp = non_negative("penaltyKp", value)?;
        Ok(())
    }

    pub fn penalty_kv(&self) -> f64 {
        self.penalty_kv
    }

    pub fn set_penalty_kv(&mut self, value: f64) -> Result<()> {
        self.penalty_kv = non_negative("penaltyKv", value)?;
        Ok(())
    }

    pub fn static_friction(&self) -> f64 {
        self.static_friction
    }

    pub fn set_static_friction(&mut self, value: f64) -> Result<()> {
        self.static_friction = non_negative("staticFriction", value)?;
        Ok(())
    }

    pub fn slip_friction(&self) -> f64 {
        self.slip_friction
    }

    pub fn set_slip_friction(&mut self, value: f64) -> Result<()> {
        self.slip_friction = non_negative("slipFriction", value)?;
        Ok(())
    }

    /// Sets both friction coefficients at once.
    pub fn set_friction(&mut self, static_friction: f64, slip_friction: f64) -> Result<()> {
        let static_friction = non_negative("staticFriction", static_friction)?;
        let slip_friction = non_negative("slipFriction", slip_friction)?;
        self.static_friction = static_friction;
        self.slip_friction = slip_friction;
        Ok(())
    }

    pub fn contact_culling_distance(&self) -> f64 {
        self.contact_culling_distance
    }

    pub fn set_contact_culling_distance(&mut self, value: f64) -> Result<()> {
        self.contact_culling_distance = non_negative("contactCullingDistance", value)?;
        Ok(())
    }

    pub fn contact_culling_depth(&self) -> f64 {
        self.contact_culling_depth
    }

    pub fn set_contact_culling_depth(&mut self, value: f64) -> Result<()> {
        self.contact_culling_depth = non_negative("contactCullingDepth", value)?;
        Ok(())
    }

    pub fn coefficient_of_restitution(&self) -> f64 {
        self.coefficient_of_restitution
    }

    pub fn set_coefficient_of_restitution(&mut self, value: f64) -> Result<()> {
        self.coefficient_of_restitution = non_negative("coefficientOfRestitution", value)?;
        if value > 1.0 {
            log::warn!("coefficient of restitution {value} > 1 adds energy on rebound");
        }
        Ok(())
    }

    pub fn gauss_seidel_error_criterion(&self) -> f64 {
        self.gauss_seidel_error_criterion
    }

    pub fn set_gauss_seidel_error_criterion(&mut self, value: f64) -> Result<()> {
        self.gauss_seidel_error_criterion = positive("gaussSeidelErrorCriterion", value)?;
        Ok(())
    }

    pub fn gauss_seidel_max_num_iterations(&self) -> u32 {
        self.gauss_seidel_max_num_iterations
    }

    pub fn set_gauss_seidel_max_num_iterations(&mut self, value: u32) -> Result<()> {
        if value == 0 {
            return Err(SimError::InvalidParameter {
                name: "gaussSeidelMaxNumIterations",
                value: 0.0,
                expected: "at least one iteration",
            });
        }
        self.gauss_seidel_max_num_iterations = value;
        Ok(())
    }

    pub fn contact_correction_depth(&self) -> f64 {
        self.contact_correction_depth
    }

    pub fn set_contact_correction_depth(&mut self, value: f64) -> Result<()> {
        self.contact_correction_depth = non_negative("contactCorrectionDepth", value)?;
        Ok(())
    }

    pub fn contact_correction_velocity_ratio(&self) -> f64 {
        self.contact_correction_velocity_ratio
    }

    pub fn set_contact_correction_velocity_ratio(&mut self, value: f64) -> Result<()> {
        self.contact_correction_velocity_ratio =
            non_negative("contactCorrectionVelocityRatio", value)?;
        Ok(())
    }

    /// Sets the depth threshold and velocity ratio of the depth correction together.
    pub fn set_contact_depth_correction(&mut self, depth: f64, velocity_ratio: f64) -> Result<()> {
        let depth = non_negative("contactCorrectionDepth", depth)?;
        let velocity_ratio = non_negative("contactCorrectionVelocityRatio", velocity_ratio)?;
        self.contact_correction_depth = depth;
        self.contact_correction_velocity_ratio = velocity_ratio;
        Ok(())
    }

    pub fn is_2d_mode(&self) -> bool {
        self.is_2d_mode
    }

    pub fn set_2d_mode(&mut self, on: bool) {
        self.is_2d_mode = on;
    }
}

/// Session-level configuration: dynamics dispatch, gravity and solver gains.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    dynamics_mode: DynamicsMode,
    integration_mode: IntegrationMode,
    gravity: DVec3,
    solver: SolverConfig,
    kinematic_walking: bool,
    debug_output: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            dynamics_mode: DynamicsMode::default(),
            integration_mode: IntegrationMode::default(),
            gravity: DVec3::from_array(DEFAULT_GRAVITY),
            solver: SolverConfig::default(),
            kinematic_walking: false,
            debug_output: false,
        }
    }
}

impl SimulatorConfig {
    pub fn dynamics_mode(&self) -> DynamicsMode {
        self.dynamics_mode
    }

    pub fn set_dynamics_mode(&mut self, mode: DynamicsMode) {
        self.dynamics_mode = mode;
    }

    pub fn integration_mode(&self) -> IntegrationMode {
        self.integration_mode
    }

    pub fn set_integration_mode(&mut self, mode: IntegrationMode) {
        self.integration_mode = mode;
    }

    pub fn gravity(&self) -> DVec3 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: DVec3) -> Result<()> {
        if !gravity.is_finite() {
            return Err(SimError::InvalidParameter {
                name: "gravity",
                value: gravity.length(),
                expected: "finite components",
            });
        }
        self.gravity = gravity;
        Ok(())
    }

    pub fn solver(&self) -> &SolverConfig {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut SolverConfig {
        &mut self.solver
    }

    pub fn is_kinematic_walking_enabled(&self) -> bool {
        self.kinematic_walking
    }

    pub fn set_kinematic_walking_enabled(&mut self, on: bool) {
        self.kinematic_walking = on;
    }

    /// Whether solver trace events are forwarded to the `log` facade.
    pub fn debug_output(&self) -> bool {
        self.debug_output
    }

    pub fn set_debug_output(&mut self, on: bool) {
        self.debug_output = on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_gains_are_rejected_and_value_kept() {
        let mut config = SolverConfig::default();
        assert!(config.set_penalty_kp(-1.0).is_err());
        assert_eq!(config.penalty_kp(), DEFAULT_PENALTY_KP);
        assert!(config.set_slip_friction(f64::NAN).is_err());
        assert!(config.set_contact_culling_distance(-0.1).is_err());
        assert!(config.set_contact_correction_velocity_ratio(-2.0).is_err());
    }

    #[test]
    fn error_criterion_must_be_positive() {
        let mut config = SolverConfig::default();
        assert!(config.set_gauss_seidel_error_criterion(0.0).is_err());
        assert!(config.set_gauss_seidel_error_criterion(1e-6).is_ok());
        assert!(config.set_gauss_seidel_max_num_iterations(0).is_err());
        assert!(config.set_gauss_seidel_max_num_iterations(1).is_ok());
    }

    #[test]
    fn paired_setters_are_all_or_nothing() {
        let mut config = SolverConfig::default();
        assert!(config.set_friction(0.4, -0.1).is_err());
        assert_eq!(config.static_friction(), DEFAULT_STATIC_FRICTION);
        config.set_friction(0.4, 0.2).unwrap();
        assert_eq!(config.static_friction(), 0.4);
        assert_eq!(config.slip_friction(), 0.2);
    }

    #[test]
    fn gravity_must_be_finite() {
        let mut config = SimulatorConfig::default();
        assert!(config.set_gravity(DVec3::new(0.0, f64::INFINITY, 0.0)).is_err());
        assert_eq!(config.gravity(), DVec3::from_array(DEFAULT_GRAVITY));
    }
}
