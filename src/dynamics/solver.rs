//! Gauss-Seidel penalty solver.
//!
//! Contacts are visited in intake order. Each row solves its penalty force
//! against the latest end-of-step velocity estimates of its two bodies and
//! pushes the force change back into those estimates through the exact
//! articulated response `dt · M⁻¹ Jᵀ`.

use glam::{DMat3, DVec3};

use crate::collision::contact::ContactCandidate;
use crate::config::SolverConfig;
use crate::core::body::BodyEntry;
use crate::dynamics::forward::{point_jacobian, DynamicsFrame};
use crate::dynamics::penalty::{FrictionRegime, ImpactMemory, PenaltyModel};
use crate::utils::allocator::{BodyHandle, BodyTable};
use crate::utils::logging::{TraceEvent, TraceSink};
use crate::utils::math::project_onto_tangent;

/// Final state of one contact row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSolution {
    /// Total force acting on body B; body A receives the opposite.
    pub force: DVec3,
    pub normal_force: f64,
    pub friction: DVec3,
    pub regime: FrictionRegime,
    /// Penetration expected at the end of the step.
    pub predicted_depth: f64,
}

/// Outcome of one solve.
#[derive(Debug, Clone, Default)]
pub struct SolverReport {
    pub iterations: u32,
    pub converged: bool,
    /// Largest force change of the last pass.
    pub max_delta: f64,
    pub contacts: Vec<ContactSolution>,
    /// Root position offsets from depth correction, one per body index.
    pub corrections: Vec<DVec3>,
}

struct Side {
    body: usize,
    jacobian: Vec<DVec3>,
    response: Vec<DVec3>,
}

struct Row {
    contact: usize,
    a: Side,
    b: Side,
    normal: DVec3,
    depth: f64,
    target: f64,
    compliance: DMat3,
    compliance_a: f64,
    compliance_b: f64,
    force: DVec3,
    normal_force: f64,
    regime: FrictionRegime,
}

/// Sum over unknowns of `J[:, u_j] ⊗ response_j`.
fn coupling(frame: &DynamicsFrame, jacobian: &[DVec3], response: &[DVec3]) -> DMat3 {
    frame
        .unknown
        .iter()
        .zip(response)
        .fold(DMat3::ZERO, |acc, (&dof, row)| {
            let column = jacobian[dof];
            acc + DMat3::from_cols(column * row.x, column * row.y, column * row.z)
        })
}

#[derive(Debug, Clone)]
pub struct GaussSeidelSolver {
    config: SolverConfig,
    impacts: ImpactMemory,
}

impl GaussSeidelSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            impacts: ImpactMemory::new(),
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SolverConfig) {
        self.config = config;
    }

    /// Closing speeds of the link pairs currently in contact.
    pub fn impacts(&self) -> &ImpactMemory {
        &self.impacts
    }

    pub fn reset_impacts(&mut self) {
        self.impacts.clear();
    }

    fn build_row(
        index: usize,
        contact: &ContactCandidate,
        bodies: &BodyTable<BodyEntry>,
        frames: &[DynamicsFrame],
        target: f64,
    ) -> Option<Row> {
        let side = |handle: BodyHandle, link: usize| {
            let entry = bodies.get(handle)?;
            let jacobian = point_jacobian(&entry.body, link, contact.position);
            let frame = &frames[handle.index()];
            let response = frame.response(&jacobian);
            Some(Side {
                body: handle.index(),
                jacobian,
                response,
            })
        };
        let a = side(contact.body_a, contact.link_a)?;
        let b = side(contact.body_b, contact.link_b)?;

        let frame_a = &frames[a.body];
        let frame_b = &frames[b.body];
        let own_a = coupling(frame_a, &a.jacobian, &a.response);
        let own_b = coupling(frame_b, &b.jacobian, &b.response);
        let mut compliance = own_a + own_b;
        if a.body == b.body {
            compliance -= coupling(frame_a, &b.jacobian, &a.response)
                + coupling(frame_a, &a.jacobian, &b.response);
        }

        let n = contact.normal;
        Some(Row {
            contact: index,
            normal: n,
            depth: contact.depth,
            target,
            compliance,
            compliance_a: n.dot(own_a * n).max(0.0),
            compliance_b: n.dot(own_b * n).max(0.0),
            force: DVec3::ZERO,
            normal_force: 0.0,
            regime: FrictionRegime::Stick,
            a,
            b,
        })
    }

    fn relative_velocity(row: &Row, frames: &[DynamicsFrame]) -> DVec3 {
        frames[row.b.body].point_velocity(&row.b.jacobian)
            - frames[row.a.body].point_velocity(&row.a.jacobian)
    }

    /// Solves all contact forces for one step.
    ///
    /// `frames` is indexed by body table index and its velocity estimates are
    /// updated in place. Forces are returned, not written. Closing speeds of
    /// new contacts are remembered for restitution in later steps.
    pub fn solve(
        &mut self,
        contacts: &[ContactCandidate],
        bodies: &BodyTable<BodyEntry>,
        frames: &mut [DynamicsFrame],
        dt: f64,
        mut trace: Option<&mut (dyn TraceSink + '_)>,
    ) -> SolverReport {
        let model = PenaltyModel::new(&self.config, dt);
        let targets = self.impacts.update(contacts, &model);
        let config = &self.config;
        let is_2d = config.is_2d_mode();

        let mut rows: Vec<Row> = contacts
            .iter()
            .zip(targets)
            .enumerate()
            .filter_map(|(index, (contact, target))| {
                Self::build_row(index, contact, bodies, frames, target)
            })
            .collect();

        let mut report = SolverReport {
            converged: true,
            corrections: vec![DVec3::ZERO; frames.len()],
            ..SolverReport::default()
        };

        if !rows.is_empty() {
            report.converged = false;
            for iteration in 1..=config.gauss_seidel_max_num_iterations() {
                let mut max_delta: f64 = 0.0;
                for row in rows.iter_mut() {
                    let n = row.normal;
                    let v_est = Self::relative_velocity(row, frames);
                    let v_excl = v_est - row.compliance * row.force;

                    let friction_old = project_onto_tangent(row.force, n);
                    let free_normal = n.dot(v_excl + row.compliance * friction_old);
                    let normal_force = model.implicit_normal_force(
                        row.depth,
                        free_normal,
                        n.dot(row.compliance * n),
                        row.target,
                    );

                    let free_tangent = project_onto_tangent(v_excl + row.compliance * (n * normal_force), n);
                    let direction = free_tangent.normalize_or_zero();
                    let friction = model.friction_force(
                        project_onto_tangent(v_est, n),
                        free_tangent,
                        normal_force,
                        direction.dot(row.compliance * direction),
                    );

                    let mut force = n * normal_force + friction.force;
                    if is_2d {
                        force.y = 0.0;
                    }
                    let delta = force - row.force;
                    frames[row.b.body].apply_response(&row.b.response, delta);
                    frames[row.a.body].apply_response(&row.a.response, -delta);

                    max_delta = max_delta.max(delta.length());
                    row.force = force;
                    row.normal_force = normal_force;
                    row.regime = friction.regime;
                }

                report.iterations = iteration;
                report.max_delta = max_delta;
                if max_delta < config.gauss_seidel_error_criterion() {
                    report.converged = true;
                    break;
                }
            }
            if !report.converged {
                log::debug!(
                    "Gauss-Seidel stopped after {} passes with force change {:.3e}",
                    report.iterations,
                    report.max_delta
                );
            }
        }

        for row in &rows {
            let n = row.normal;
            let vn = n.dot(Self::relative_velocity(row, frames));
            let predicted_depth = row.depth - dt * vn;
            self.correct_depth(row, predicted_depth, dt, bodies, &mut report.corrections);

            report.contacts.push(ContactSolution {
                force: row.force,
                normal_force: row.normal_force,
                friction: project_onto_tangent(row.force, n),
                regime: row.regime,
                predicted_depth,
            });

            if let Some(sink) = trace.as_deref_mut() {
                let contact = &contacts[row.contact];
                sink.record(&TraceEvent::Contact {
                    index: row.contact,
                    body_a: contact.body_a,
                    body_b: contact.body_b,
                    depth: row.depth,
                    normal_force: row.normal_force,
                    friction_force: project_onto_tangent(row.force, n).length(),
                    regime: row.regime,
                });
            }
        }

        if let Some(sink) = trace {
            sink.record(&TraceEvent::SolverFinished {
                contacts: rows.len(),
                iterations: report.iterations,
                converged: report.converged,
                max_delta: report.max_delta,
            });
        }
        report
    }

    /// Turns residual predicted penetration into root position offsets, split
    /// between the bodies by their normal compliance. The offset is one step
    /// of the pseudo-velocity `min(residual, ratio · residual / dt)`.
    fn correct_depth(
        &self,
        row: &Row,
        predicted_depth: f64,
        dt: f64,
        bodies: &BodyTable<BodyEntry>,
        corrections: &mut [DVec3],
    ) {
        let residual = predicted_depth - self.config.contact_correction_depth();
        if residual <= 0.0 {
            return;
        }
        let ratio = self.config.contact_correction_velocity_ratio();
        let pseudo_velocity = residual.min(ratio * residual / dt);
        let displacement = pseudo_velocity * dt;
        if displacement <= 0.0 {
            return;
        }

        let movable = |side: &Side| {
            bodies
                .handle_at(side.body)
                .and_then(|handle| bodies.get(handle))
                .is_some_and(|entry| entry.body.has_free_root() && !entry.dynamics.is_kinematic())
        };
        let c_a = if movable(&row.a) { row.compliance_a } else { 0.0 };
        let c_b = if movable(&row.b) { row.compliance_b } else { 0.0 };
        let total = c_a + c_b;
        if total <= f64::EPSILON || row.a.body == row.b.body {
            return;
        }

        let mut push = |body: usize, direction: DVec3, amount: f64| {
            if amount <= 0.0 {
                return;
            }
            let mut direction = direction;
            if self.config.is_2d_mode() {
                direction.y = 0.0;
            }
            let offset = &mut corrections[body];
            let missing = amount - offset.dot(direction);
            if missing > 0.0 {
                *offset += direction * missing;
            }
        };
        push(row.b.body, row.normal, displacement * c_b / total);
        push(row.a.body, -row.normal, displacement * c_a / total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::articulations::{JointType, Link, Multibody, RootJoint};
    use crate::core::body::BodyDynamics;
    use crate::core::types::{MassProperties, Transform};
    use approx::assert_relative_eq;

    const G: DVec3 = DVec3::new(0.0, 0.0, -9.80665);

    fn table() -> BodyTable<BodyEntry> {
        let mut bodies = BodyTable::new();
        let mut ground = Multibody::new("ground", RootJoint::Fixed);
        ground.add_link(Link::new("ground", None, JointType::Fixed));
        ground.update_kinematics();
        bodies.insert(BodyEntry::new(BodyHandle::new(0, 0), ground, BodyDynamics::Kinematic));

        let mut block = Multibody::new("block", RootJoint::Free)
            .with_root_transform(Transform::from_translation(DVec3::new(0.0, 0.0, -0.001)));
        block.add_link(
            Link::new("block", None, JointType::Fixed)
                .with_mass_properties(MassProperties::solid_sphere(0.1, 1.0)),
        );
        block.update_kinematics();
        bodies.insert(BodyEntry::new(BodyHandle::new(1, 0), block, BodyDynamics::ForwardDynamics));
        bodies
    }

    fn contact(depth: f64) -> ContactCandidate {
        ContactCandidate::new(
            (BodyHandle::new(0, 0), 0),
            (BodyHandle::new(1, 0), 0),
            DVec3::new(0.0, 0.0, -0.001),
            DVec3::Z,
            depth,
        )
    }

    fn build_frames(bodies: &BodyTable<BodyEntry>, dt: f64) -> Vec<DynamicsFrame> {
        bodies.iter().map(|entry| DynamicsFrame::build(entry, G, dt)).collect()
    }

    #[test]
    fn normal_force_is_non_negative_and_converges() {
        let bodies = table();
        let mut frames = build_frames(&bodies, 0.001);
        let mut solver = GaussSeidelSolver::new(SolverConfig::default());
        let report = solver.solve(&[contact(0.001)], &bodies, &mut frames, 0.001, None);
        assert!(report.converged);
        assert!(report.contacts[0].normal_force > 0.0);

        let mut fresh = build_frames(&bodies, 0.001);
        let report = solver.solve(&[contact(-0.004)], &bodies, &mut fresh, 0.001, None);
        assert_eq!(report.contacts[0].normal_force, 0.0);
    }

    #[test]
    fn iteration_cap_bounds_the_passes() {
        let bodies = table();
        let mut frames = build_frames(&bodies, 0.001);
        let mut config = SolverConfig::default();
        config.set_gauss_seidel_max_num_iterations(1).unwrap();
        config.set_gauss_seidel_error_criterion(1e-12).unwrap();
        let mut solver = GaussSeidelSolver::new(config);
        let report = solver.solve(&[contact(0.001), contact(0.0005)], &bodies, &mut frames, 0.001, None);
        assert_eq!(report.iterations, 1);
        assert!(!report.converged);
    }

    #[test]
    fn depth_correction_moves_only_the_free_body() {
        let bodies = table();
        let mut frames = build_frames(&bodies, 0.001);
        let mut solver = GaussSeidelSolver::new(SolverConfig::default());
        let report = solver.solve(&[contact(0.01)], &bodies, &mut frames, 0.001, None);
        assert_eq!(report.corrections[0], DVec3::ZERO);
        assert!(report.corrections[1].z > 0.0);
        assert_relative_eq!(report.corrections[1].x, 0.0);
    }
}
