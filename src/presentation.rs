//! Symbols and display names for the configuration enumerations.
//!
//! Symbols are what archives store; labels are what an editor shows. Parsing
//! accepts either.

use crate::config::{DynamicsMode, IntegrationMode};

pub fn dynamics_mode_symbol(mode: DynamicsMode) -> &'static str {
    match mode {
        DynamicsMode::ForwardDynamics => "forward_dynamics",
        DynamicsMode::HighGain => "high_gain_dynamics",
        DynamicsMode::Kinematics => "kinematics",
    }
}

pub fn dynamics_mode_label(mode: DynamicsMode) -> &'static str {
    match mode {
        DynamicsMode::ForwardDynamics => "Forward dynamics",
        DynamicsMode::HighGain => "High-gain dynamics",
        DynamicsMode::Kinematics => "Kinematics",
    }
}

pub fn dynamics_mode_from_symbol(symbol: &str) -> Option<DynamicsMode> {
    DYNAMICS_MODES.into_iter().find(|&mode| {
        symbol == dynamics_mode_symbol(mode) || symbol == dynamics_mode_label(mode)
    })
}

pub fn integration_mode_symbol(mode: IntegrationMode) -> &'static str {
    match mode {
        IntegrationMode::Euler => "euler",
        IntegrationMode::RungeKutta => "runge_kutta",
    }
}

pub fn integration_mode_label(mode: IntegrationMode) -> &'static str {
    match mode {
        IntegrationMode::Euler => "Euler",
        IntegrationMode::RungeKutta => "Runge Kutta",
    }
}

pub fn integration_mode_from_symbol(symbol: &str) -> Option<IntegrationMode> {
    INTEGRATION_MODES.into_iter().find(|&mode| {
        symbol == integration_mode_symbol(mode) || symbol == integration_mode_label(mode)
    })
}

/// Every dynamics mode, in display order.
pub const DYNAMICS_MODES: [DynamicsMode; 3] = [
    DynamicsMode::ForwardDynamics,
    DynamicsMode::HighGain,
    DynamicsMode::Kinematics,
];

/// Every integration mode, in display order.
pub const INTEGRATION_MODES: [IntegrationMode; 2] =
    [IntegrationMode::Euler, IntegrationMode::RungeKutta];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_and_labels_parse_back() {
        for mode in DYNAMICS_MODES {
            assert_eq!(dynamics_mode_from_symbol(dynamics_mode_symbol(mode)), Some(mode));
            assert_eq!(dynamics_mode_from_symbol(dynamics_mode_label(mode)), Some(mode));
        }
        for mode in INTEGRATION_MODES {
            assert_eq!(integration_mode_from_symbol(integration_mode_symbol(mode)), Some(mode));
            assert_eq!(integration_mode_from_symbol(integration_mode_label(mode)), Some(mode));
        }
    }

    #[test]
    fn unknown_symbols_are_rejected() {
        assert_eq!(dynamics_mode_from_symbol("Forward Dynamics"), None);
        assert_eq!(integration_mode_from_symbol(""), None);
    }
}
