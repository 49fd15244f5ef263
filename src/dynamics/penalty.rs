//! Spring-damper normal force, Coulomb stick/slip friction and the
//! accumulator writes that hand contact forces to the dynamics.

use std::collections::HashMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::collision::contact::ContactCandidate;
use crate::config::{SolverConfig, DEFAULT_RESTITUTION_THRESHOLD, DEFAULT_STICK_VELOCITY};
use crate::core::body::BodyEntry;
use crate::utils::allocator::{BodyHandle, BodyTable};

/// Friction regime a contact ended the solve in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FrictionRegime {
    #[default]
    Stick,
    Slip,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrictionForce {
    pub force: DVec3,
    pub regime: FrictionRegime,
}

impl FrictionForce {
    pub const NONE: Self = Self {
        force: DVec3::ZERO,
        regime: FrictionRegime::Stick,
    };
}

/// Penalty gains and friction coefficients for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltyModel {
    pub kp: f64,
    pub kv: f64,
    pub static_friction: f64,
    pub slip_friction: f64,
    pub restitution: f64,
    pub dt: f64,
}

impl PenaltyModel {
    pub fn new(config: &SolverConfig, dt: f64) -> Self {
        Self {
            kp: config.penalty_kp(),
            kv: config.penalty_kv(),
            static_friction: config.static_friction(),
            slip_friction: config.slip_friction(),
            restitution: config.coefficient_of_restitution(),
            dt,
        }
    }

    /// Spring-damper normal force `max(0, Kp·depth − Kv·(v_n − v_target))`,
    /// with `v_n` positive when separating.
    pub fn normal_force(&self, depth: f64, normal_velocity: f64, target_velocity: f64) -> f64 {
        (self.kp * depth - self.kv * (normal_velocity - target_velocity)).max(0.0)
    }

    /// Normal force evaluated at the end of the step.
    ///
    /// `free_normal_velocity` is the end-of-step normal velocity without this
    /// contact's normal force and `compliance` the normal velocity gained per
    /// unit force. The spring sees the predicted depth `depth − dt·v_n`, which
    /// keeps stiff gains stable.
    pub fn implicit_normal_force(
        &self,
        depth: f64,
        free_normal_velocity: f64,
        compliance: f64,
        target_velocity: f64,
    ) -> f64 {
        let gain = self.kp * self.dt + self.kv;
        let numerator =
            self.kp * depth + self.kv * target_velocity - gain * free_normal_velocity;
        (numerator / (1.0 + gain * compliance.max(0.0))).max(0.0)
    }

    /// Separating velocity the damper drives toward once the contact has
    /// started to rebound: `e · closing_speed`, where `closing_speed` is the
    /// approach speed latched when the contact began.
    ///
    /// Zero while still approaching and for slow impacts.
    pub fn restitution_target(&self, normal_velocity: f64, closing_speed: f64) -> f64 {
        if normal_velocity >= 0.0 && closing_speed > DEFAULT_RESTITUTION_THRESHOLD {
            self.restitution * closing_speed
        } else {
            0.0
        }
    }

    /// Coulomb friction opposing `free_velocity`, the tangential velocity the
    /// contact would have without friction.
    ///
    /// The regime follows the current tangential velocity `slip_velocity`.
    /// The force never exceeds what stops the drift nor `μ_regime · Fn`.
    pub fn friction_force(
        &self,
        slip_velocity: DVec3,
        free_velocity: DVec3,
        normal_force: f64,
        compliance: f64,
    ) -> FrictionForce {
        let regime = if slip_velocity.length() < DEFAULT_STICK_VELOCITY {
            FrictionRegime::Stick
        } else {
            FrictionRegime::Slip
        };
        let speed = free_velocity.length();
        if normal_force <= 0.0 || speed <= f64::EPSILON {
            return FrictionForce {
                force: DVec3::ZERO,
                regime,
            };
        }

        let limit = match regime {
            FrictionRegime::Stick => self.static_friction * normal_force,
            FrictionRegime::Slip => self.slip_friction * normal_force,
        };
        let stopping = if compliance > f64::EPSILON {
            speed / compliance
        } else {
            f64::INFINITY
        };
        FrictionForce {
            force: -free_velocity / speed * stopping.min(limit),
            regime,
        }
    }
}

type PairKey = ((BodyHandle, usize), (BodyHandle, usize));

/// Approach speeds latched per touching link pair, kept while the pair stays
/// in contact.
#[derive(Debug, Clone, Default)]
pub struct ImpactMemory {
    closing_speeds: HashMap<PairKey, f64>,
}

impl ImpactMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latches the closing speed of pairs that just came into contact,
    /// forgets pairs that are gone and returns one damper target per contact.
    pub fn update(&mut self, contacts: &[ContactCandidate], model: &PenaltyModel) -> Vec<f64> {
        let previous = std::mem::take(&mut self.closing_speeds);
        for contact in contacts {
            let key = contact.pair_key();
            match previous.get(&key) {
                Some(&latched) => {
                    self.closing_speeds.insert(key, latched);
                }
                None => {
                    let closing = (-contact.normal_velocity()).max(0.0);
                    let speed = self.closing_speeds.entry(key).or_insert(0.0);
                    *speed = speed.max(closing);
                }
            }
        }
        contacts
            .iter()
            .map(|contact| {
                let closing = self.closing_speed(contact);
                model.restitution_target(contact.normal_velocity(), closing)
            })
            .collect()
    }

    pub fn closing_speed(&self, contact: &ContactCandidate) -> f64 {
        self.closing_speeds
            .get(&contact.pair_key())
            .copied()
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.closing_speeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closing_speeds.is_empty()
    }

    pub fn clear(&mut self) {
        self.closing_speeds.clear();
    }
}

fn add_link_force(
    bodies: &mut BodyTable<BodyEntry>,
    handle: BodyHandle,
    link: usize,
    force: DVec3,
    point: DVec3,
) {
    if let Some(entry) = bodies.get_mut(handle) {
        if link < entry.body.num_links() {
            let origin = entry.body.link_transform(link).position;
            entry.body.external_force_mut(link).add_at_point(force, point, origin);
        }
    }
}

/// Writes `force` (acting on B) and its reaction on A into the link
/// accumulators at the contact point.
pub fn apply_contact_force(bodies: &mut BodyTable<BodyEntry>, contact: &ContactCandidate, force: DVec3) {
    add_link_force(bodies, contact.body_a, contact.link_a, -force, contact.position);
    add_link_force(bodies, contact.body_b, contact.link_b, force, contact.position);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model() -> PenaltyModel {
        PenaltyModel::new(&SolverConfig::default(), 0.001)
    }

    #[test]
    fn normal_force_never_pulls() {
        let m = model();
        assert_eq!(m.normal_force(-0.01, 0.0, 0.0), 0.0);
        assert_eq!(m.normal_force(0.001, 5.0, 0.0), 0.0);
        assert_relative_eq!(m.normal_force(0.001, -0.1, 0.0), 10.0 + 1.0);
        assert!(m.implicit_normal_force(0.0, 1.0, 0.5, 0.0) >= 0.0);
    }

    #[test]
    fn implicit_force_matches_end_of_step_spring() {
        let m = model();
        let (depth, free_vn, compliance) = (0.002, -0.05, 0.001);
        let f = m.implicit_normal_force(depth, free_vn, compliance, 0.0);
        let vn_end = free_vn + compliance * f;
        let predicted = depth - m.dt * vn_end;
        assert_relative_eq!(f, m.normal_force(predicted, vn_end, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn restitution_applies_only_while_rebounding() {
        let mut config = SolverConfig::default();
        config.set_coefficient_of_restitution(0.5).unwrap();
        let m = PenaltyModel::new(&config, 0.001);
        assert_relative_eq!(m.restitution_target(0.3, 2.0), 1.0);
        assert_eq!(m.restitution_target(-0.5, 2.0), 0.0);
        assert_eq!(m.restitution_target(0.3, 0.001), 0.0);
    }

    #[test]
    fn impact_memory_latches_the_first_closing_speed() {
        let mut config = SolverConfig::default();
        config.set_coefficient_of_restitution(1.0).unwrap();
        let m = PenaltyModel::new(&config, 0.001);
        let mut contact = ContactCandidate::new(
            (BodyHandle::new(0, 0), 0),
            (BodyHandle::new(1, 0), 0),
            DVec3::ZERO,
            DVec3::Z,
            0.001,
        );
        let mut memory = ImpactMemory::new();

        contact.relative_velocity = DVec3::new(0.0, 0.0, -2.0);
        assert_eq!(memory.update(&[contact], &m), vec![0.0]);
        assert_relative_eq!(memory.closing_speed(&contact), 2.0);

        contact.relative_velocity = DVec3::new(0.0, 0.0, -0.5);
        memory.update(&[contact], &m);
        assert_relative_eq!(memory.closing_speed(&contact), 2.0);

        contact.relative_velocity = DVec3::new(0.0, 0.0, 0.4);
        assert_eq!(memory.update(&[contact], &m), vec![2.0]);

        memory.update(&[], &m);
        assert!(memory.is_empty());
    }

    #[test]
    fn friction_respects_regime_limit() {
        let mut config = SolverConfig::default();
        config.set_friction(0.5, 0.3).unwrap();
        let m = PenaltyModel::new(&config, 0.001);

        let stick = m.friction_force(DVec3::ZERO, DVec3::new(10.0, 0.0, 0.0), 100.0, 1e-4);
        assert_eq!(stick.regime, FrictionRegime::Stick);
        assert_relative_eq!(stick.force.length(), 50.0);

        let slip = m.friction_force(DVec3::X, DVec3::new(10.0, 0.0, 0.0), 100.0, 1e-4);
        assert_eq!(slip.regime, FrictionRegime::Slip);
        assert_relative_eq!(slip.force.x, -30.0);

        let gentle = m.friction_force(DVec3::ZERO, DVec3::new(0.001, 0.0, 0.0), 100.0, 1e-4);
        assert_relative_eq!(gentle.force.x, -10.0);
    }
}
