//! Flat key/value archive of a [`SimulatorConfig`], with JSON encoding.

use std::collections::BTreeMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::{
    config::SimulatorConfig,
    error::{Result, SimError},
    presentation::{
        dynamics_mode_from_symbol, dynamics_mode_symbol, integration_mode_from_symbol,
        integration_mode_symbol,
    },
};

pub const KEY_DYNAMICS_MODE: &str = "dynamicsMode";
pub const KEY_INTEGRATION_MODE: &str = "integrationMode";
pub const KEY_GRAVITY: &str = "gravity";
pub const KEY_STATIC_FRICTION: &str = "staticFriction";
pub const KEY_SLIP_FRICTION: &str = "slipFriction";
pub const KEY_CULLING_DISTANCE: &str = "cullingThresh";
pub const KEY_CULLING_DEPTH: &str = "contactCullingDepth";
pub const KEY_RESTITUTION: &str = "coefficientOfRestitution";
pub const KEY_ERROR_CRITERION: &str = "errorCriterion";
pub const KEY_MAX_ITERATIONS: &str = "maxNumIterations";
pub const KEY_CORRECTION_DEPTH: &str = "contactCorrectionDepth";
pub const KEY_CORRECTION_VELOCITY_RATIO: &str = "contactCorrectionVelocityRatio";
pub const KEY_KINEMATIC_WALKING: &str = "kinematicWalking";
pub const KEY_2D_MODE: &str = "2Dmode";
pub const KEY_PENALTY_KP: &str = "penaltyKp";
pub const KEY_PENALTY_KV: &str = "penaltyKv";
pub const KEY_DEBUG_OUTPUT: &str = "debugOutput";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArchiveValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Vector([f64; 3]),
    Symbol(String),
}

impl ArchiveValue {
    fn as_bool(&self, key: &str) -> Result<bool> {
        match self {
            Self::Bool(value) => Ok(*value),
            _ => Err(type_error(key, "a boolean")),
        }
    }

    /// Integers are accepted where reals are expected.
    fn as_real(&self, key: &str) -> Result<f64> {
        match self {
            Self::Real(value) => Ok(*value),
            Self::Int(value) => Ok(*value as f64),
            _ => Err(type_error(key, "a number")),
        }
    }

    fn as_count(&self, key: &str) -> Result<u32> {
        match self {
            Self::Int(value) => u32::try_from(*value).map_err(|_| type_error(key, "a non-negative 32-bit integer")),
            _ => Err(type_error(key, "an integer")),
        }
    }

    fn as_vector(&self, key: &str) -> Result<DVec3> {
        match self {
            Self::Vector(value) => Ok(DVec3::from_array(*value)),
            _ => Err(type_error(key, "a 3-vector")),
        }
    }

    fn as_symbol(&self, key: &str) -> Result<&str> {
        match self {
            Self::Symbol(value) => Ok(value),
            _ => Err(type_error(key, "a symbol")),
        }
    }
}

fn type_error(key: &str, expected: &'static str) -> SimError {
    SimError::ArchiveType {
        key: key.to_owned(),
        expected,
    }
}

/// Persisted configuration layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigArchive {
    entries: BTreeMap<String, ArchiveValue>,
}

impl ConfigArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures every field of `config`.
    pub fn store(config: &SimulatorConfig) -> Self {
        let solver = config.solver();
        let mut archive = Self::new();
        archive.insert(
            KEY_DYNAMICS_MODE,
            ArchiveValue::Symbol(dynamics_mode_symbol(config.dynamics_mode()).into()),
        );
        archive.insert(
            KEY_INTEGRATION_MODE,
            ArchiveValue::Symbol(integration_mode_symbol(config.integration_mode()).into()),
        );
        archive.insert(KEY_GRAVITY, ArchiveValue::Vector(config.gravity().to_array()));
        archive.insert(KEY_STATIC_FRICTION, ArchiveValue::Real(solver.static_friction()));
        archive.insert(KEY_SLIP_FRICTION, ArchiveValue::Real(solver.slip_friction()));
        archive.insert(KEY_CULLING_DISTANCE, ArchiveValue::Real(solver.contact_culling_distance()));
        archive.insert(KEY_CULLING_DEPTH, ArchiveValue::Real(solver.contact_culling_depth()));
        archive.insert(KEY_RESTITUTION, ArchiveValue::Real(solver.coefficient_of_restitution()));
        archive.insert(KEY_ERROR_CRITERION, ArchiveValue::Real(solver.gauss_seidel_error_criterion()));
        archive.insert(
            KEY_MAX_ITERATIONS,
            ArchiveValue::Int(i64::from(solver.gauss_seidel_max_num_iterations())),
        );
        archive.insert(KEY_CORRECTION_DEPTH, ArchiveValue::Real(solver.contact_correction_depth()));
        archive.insert(
            KEY_CORRECTION_VELOCITY_RATIO,
            ArchiveValue::Real(solver.contact_correction_velocity_ratio()),
        );
        archive.insert(KEY_KINEMATIC_WALKING, ArchiveValue::Bool(config.is_kinematic_walking_enabled()));
        archive.insert(KEY_2D_MODE, ArchiveValue::Bool(solver.is_2d_mode()));
        archive.insert(KEY_PENALTY_KP, ArchiveValue::Real(solver.penalty_kp()));
        archive.insert(KEY_PENALTY_KV, ArchiveValue::Real(solver.penalty_kv()));
        archive.insert(KEY_DEBUG_OUTPUT, ArchiveValue::Bool(config.debug_output()));
        archive
    }

    /// Applies the archived values to `config`.
    ///
    /// Missing keys leave their field untouched. Any rejected value leaves
    /// `config` unchanged as a whole.
    pub fn restore(&self, config: &mut SimulatorConfig) -> Result<()> {
        let mut next = config.clone();

        if let Some(value) = self.get(KEY_DYNAMICS_MODE) {
            let symbol = value.as_symbol(KEY_DYNAMICS_MODE)?;
            let mode = dynamics_mode_from_symbol(symbol).ok_or_else(|| unknown(KEY_DYNAMICS_MODE, symbol))?;
            next.set_dynamics_mode(mode);
        }
        if let Some(value) = self.get(KEY_INTEGRATION_MODE) {
            let symbol = value.as_symbol(KEY_INTEGRATION_MODE)?;
            let mode =
                integration_mode_from_symbol(symbol).ok_or_else(|| unknown(KEY_INTEGRATION_MODE, symbol))?;
            next.set_integration_mode(mode);
        }
        if let Some(value) = self.get(KEY_GRAVITY) {
            next.set_gravity(value.as_vector(KEY_GRAVITY)?)?;
        }
        if let Some(value) = self.get(KEY_KINEMATIC_WALKING) {
            next.set_kinematic_walking_enabled(value.as_bool(KEY_KINEMATIC_WALKING)?);
        }
        if let Some(value) = self.get(KEY_DEBUG_OUTPUT) {
            next.set_debug_output(value.as_bool(KEY_DEBUG_OUTPUT)?);
        }

        let solver = next.solver_mut();
        if let Some(value) = self.get(KEY_STATIC_FRICTION) {
            solver.set_static_friction(value.as_real(KEY_STATIC_FRICTION)?)?;
        }
        if let Some(value) = self.get(KEY_SLIP_FRICTION) {
            solver.set_slip_friction(value.as_real(KEY_SLIP_FRICTION)?)?;
        }
        if let Some(value) = self.get(KEY_CULLING_DISTANCE) {
            solver.set_contact_culling_distance(value.as_real(KEY_CULLING_DISTANCE)?)?;
        }
        if let Some(value) = self.get(KEY_CULLING_DEPTH) {
            solver.set_contact_culling_depth(value.as_real(KEY_CULLING_DEPTH)?)?;
        }
        if let Some(value) = self.get(KEY_RESTITUTION) {
            solver.set_coefficient_of_restitution(value.as_real(KEY_RESTITUTION)?)?;
        }
        if let Some(value) = self.get(KEY_ERROR_CRITERION) {
            solver.set_gauss_seidel_error_criterion(value.as_real(KEY_ERROR_CRITERION)?)?;
        }
        if let Some(value) = self.get(KEY_MAX_ITERATIONS) {
            solver.set_gauss_seidel_max_num_iterations(value.as_count(KEY_MAX_ITERATIONS)?)?;
        }
        if let Some(value) = self.get(KEY_CORRECTION_DEPTH) {
            solver.set_contact_correction_depth(value.as_real(KEY_CORRECTION_DEPTH)?)?;
        }
        if let Some(value) = self.get(KEY_CORRECTION_VELOCITY_RATIO) {
            solver.set_contact_correction_velocity_ratio(value.as_real(KEY_CORRECTION_VELOCITY_RATIO)?)?;
        }
        if let Some(value) = self.get(KEY_2D_MODE) {
            solver.set_2d_mode(value.as_bool(KEY_2D_MODE)?);
        }
        if let Some(value) = self.get(KEY_PENALTY_KP) {
            solver.set_penalty_kp(value.as_real(KEY_PENALTY_KP)?)?;
        }
        if let Some(value) = self.get(KEY_PENALTY_KV) {
            solver.set_penalty_kv(value.as_real(KEY_PENALTY_KV)?)?;
        }

        *config = next;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ArchiveValue> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ArchiveValue) -> Option<ArchiveValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<ArchiveValue> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn unknown(key: &str, symbol: &str) -> SimError {
    SimError::UnknownSymbol {
        key: key.to_owned(),
        symbol: symbol.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DynamicsMode, IntegrationMode};

    fn tuned() -> SimulatorConfig {
        let mut config = SimulatorConfig::default();
        config.set_dynamics_mode(DynamicsMode::HighGain);
        config.set_integration_mode(IntegrationMode::RungeKutta);
        config.set_gravity(DVec3::new(0.0, 0.0, -1.62)).unwrap();
        config.set_kinematic_walking_enabled(true);
        let solver = config.solver_mut();
        solver.set_friction(0.5, 0.3).unwrap();
        solver.set_penalty_kp(2.5e4).unwrap();
        solver.set_gauss_seidel_max_num_iterations(40).unwrap();
        solver.set_2d_mode(true);
        config
    }

    #[test]
    fn store_covers_every_key() {
        assert_eq!(ConfigArchive::store(&SimulatorConfig::default()).len(), 17);
    }

    #[test]
    fn restore_reproduces_the_stored_config() {
        let config = tuned();
        let mut restored = SimulatorConfig::default();
        ConfigArchive::store(&config).restore(&mut restored).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn missing_keys_are_left_alone() {
        let mut archive = ConfigArchive::new();
        archive.insert(KEY_PENALTY_KV, ArchiveValue::Int(25));
        let mut config = tuned();
        archive.restore(&mut config).unwrap();
        assert_eq!(config.solver().penalty_kv(), 25.0);
        assert_eq!(config.solver().static_friction(), 0.5);
    }

    #[test]
    fn bad_values_abort_the_whole_restore() {
        let mut archive = ConfigArchive::store(&tuned());
        archive.insert(KEY_DYNAMICS_MODE, ArchiveValue::Symbol("ragdoll".into()));
        let mut config = SimulatorConfig::default();
        assert!(matches!(archive.restore(&mut config), Err(SimError::UnknownSymbol { .. })));
        assert_eq!(config, SimulatorConfig::default());

        let mut archive = ConfigArchive::new();
        archive.insert(KEY_STATIC_FRICTION, ArchiveValue::Bool(true));
        assert!(matches!(archive.restore(&mut config), Err(SimError::ArchiveType { .. })));

        let mut archive = ConfigArchive::new();
        archive.insert(KEY_SLIP_FRICTION, ArchiveValue::Real(-1.0));
        assert!(matches!(archive.restore(&mut config), Err(SimError::InvalidParameter { .. })));
    }

    #[test]
    fn display_names_are_accepted() {
        let mut archive = ConfigArchive::new();
        archive.insert(KEY_DYNAMICS_MODE, ArchiveValue::Symbol("Kinematics".into()));
        archive.insert(KEY_INTEGRATION_MODE, ArchiveValue::Symbol("Runge Kutta".into()));
        let mut config = SimulatorConfig::default();
        archive.restore(&mut config).unwrap();
        assert_eq!(config.dynamics_mode(), DynamicsMode::Kinematics);
        assert_eq!(config.integration_mode(), IntegrationMode::RungeKutta);
    }

    #[test]
    fn json_round_trip() {
        let archive = ConfigArchive::store(&tuned());
        let json = archive.to_json().unwrap();
        assert!(json.contains("\"2Dmode\": true"));
        assert_eq!(ConfigArchive::from_json(&json).unwrap(), archive);
    }
}
