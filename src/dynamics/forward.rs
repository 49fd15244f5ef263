//! Articulated-body dynamics in world-frame spatial algebra.
//!
//! The mass matrix comes from the composite-rigid-body algorithm and the
//! bias forces from recursive Newton-Euler. Gravity enters as a base
//! acceleration of `-g`, which weighs every link.

use glam::DVec3;
use nalgebra::{linalg::Cholesky, linalg::LU, DMatrix, DVector, Dyn};

use crate::core::articulations::Multibody;
use crate::core::body::BodyEntry;
use crate::utils::spatial::{SpatialMat, SpatialVec};

/// Joint-space inertia matrix `M(q)` over all generalized coordinates.
pub fn mass_matrix(body: &Multibody) -> DMatrix<f64> {
    let n = body.num_dofs();
    let mut composite: Vec<SpatialMat> = (0..body.num_links())
        .map(|i| body.link_inertia(i).to_mat())
        .collect();
    for i in (1..body.num_links()).rev() {
        if let Some(parent) = body.links[i].parent {
            let child = composite[i];
            composite[parent] += child;
        }
    }

    let mut m = DMatrix::zeros(n, n);
    for k in 0..n {
        let link_k = body.dof_link(k);
        let s_k = body.dof_subspace(k);
        let force = composite[link_k].mul_vec(s_k);
        for l in 0..=k {
            if body.is_ancestor_or_self(body.dof_link(l), link_k) {
                let value = body.dof_subspace(l).dot(&force);
                m[(k, l)] = value;
                m[(l, k)] = value;
            }
        }
    }
    m
}

/// Generalized forces required to realize `acceleration` under gravity and
/// the external forces in the link accumulators (recursive Newton-Euler).
pub fn inverse_dynamics(body: &Multibody, gravity: DVec3, acceleration: &DVector<f64>) -> DVector<f64> {
    let n = body.num_dofs();
    let root_dofs = body.root_dofs();
    let num_links = body.num_links();

    let mut base = SpatialVec::new(DVec3::ZERO, -gravity);
    if body.has_free_root() {
        let w = body.root_velocity.angular;
        let v = body.root_velocity.linear;
        base += SpatialVec::new(DVec3::ZERO, v.cross(w));
        for k in 0..root_dofs {
            base += body.dof_subspace(k) * acceleration[k];
        }
    }

    let mut accelerations = vec![SpatialVec::ZERO; num_links];
    let mut forces = vec![SpatialVec::ZERO; num_links];
    for i in 0..num_links {
        let link = &body.links[i];
        let state = body.state(i);
        let parent_accel = link.parent.map_or(base, |p| accelerations[p]);
        let mut accel = parent_accel;
        if link.joint_type.dofs() == 1 {
            let k = link.q_offset;
            let joint_velocity = state.subspace * body.dq[k];
            accel += state.subspace * acceleration[root_dofs + k] + state.velocity.cross_motion(&joint_velocity);
        }
        accelerations[i] = accel;

        let inertia = body.link_inertia(i).to_mat();
        let momentum = inertia.mul_vec(state.velocity);
        forces[i] = inertia.mul_vec(accel) + state.velocity.cross_force(&momentum)
            - state.external.to_spatial(state.transform.position);
    }

    for i in (1..num_links).rev() {
        if let Some(parent) = body.links[i].parent {
            let child = forces[i];
            forces[parent] += child;
        }
    }

    let mut tau = DVector::zeros(n);
    for k in 0..n {
        tau[k] = body.dof_subspace(k).dot(&forces[body.dof_link(k)]);
    }
    tau
}

enum Factor {
    Cholesky(Cholesky<f64, Dyn>),
    Lu(LU<f64, Dyn, Dyn>),
    Singular,
}

/// Linearized dynamics of one body for one step: the unknown coordinates,
/// their factored mass matrix and the end-of-step velocity estimate.
pub struct DynamicsFrame {
    /// Generalized coordinates solved from forces.
    pub unknown: Vec<usize>,
    /// Generalized velocity expected at the end of the step.
    pub velocity: DVector<f64>,
    factor: Factor,
    dt: f64,
}

impl std::fmt::Debug for DynamicsFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicsFrame")
            .field("unknown", &self.unknown)
            .field("velocity", &self.velocity)
            .finish()
    }
}

impl DynamicsFrame {
    /// Assembles the frame from the current kinematic state and accumulators.
    pub fn build(entry: &BodyEntry, gravity: DVec3, dt: f64) -> Self {
        let body = &entry.body;
        let unknown = entry.unknown_dofs();
        let mut velocity = DVector::from_vec(body.generalized_velocity());

        if unknown.is_empty() {
            return Self {
                unknown,
                velocity,
                factor: Factor::Singular,
                dt,
            };
        }

        let full = mass_matrix(body);
        let m_uu = full.select_rows(&unknown).select_columns(&unknown);
        let factor = match m_uu.clone().cholesky() {
            Some(cholesky) => Factor::Cholesky(cholesky),
            None => {
                let lu = m_uu.lu();
                if lu.is_invertible() {
                    log::debug!("mass matrix of `{}` is not positive definite; using LU", body.name);
                    Factor::Lu(lu)
                } else {
                    log::warn!("mass matrix of `{}` is singular; its accelerations are zeroed", body.name);
                    Factor::Singular
                }
            }
        };

        let mut frame = Self {
            unknown,
            velocity: DVector::zeros(0),
            factor,
            dt,
        };
        let free = frame.unknown_accelerations(entry, gravity);
        for (j, &dof) in frame.unknown.iter().enumerate() {
            velocity[dof] += dt * free[j];
        }
        frame.velocity = velocity;
        frame
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn has_unknowns(&self) -> bool {
        !self.unknown.is_empty() && !matches!(self.factor, Factor::Singular)
    }

    /// `M_UU⁻¹ rhs`; zero when the system is singular.
    pub fn solve(&self, rhs: &DVector<f64>) -> DVector<f64> {
        match &self.factor {
            Factor::Cholesky(cholesky) => cholesky.solve(rhs),
            Factor::Lu(lu) => lu.solve(rhs).unwrap_or_else(|| DVector::zeros(rhs.len())),
            Factor::Singular => DVector::zeros(rhs.len()),
        }
    }

    /// Accelerations of the unknown coordinates under the current accumulators
    /// (`M_UU a_U = τ_U − rnea(a_P, 0)_U`).
    pub fn unknown_accelerations(&self, entry: &BodyEntry, gravity: DVec3) -> DVector<f64> {
        let body = &entry.body;
        let root_dofs = body.root_dofs();
        let n = body.num_dofs();

        let mut prescribed = DVector::zeros(n);
        for k in root_dofs..n {
            if !self.unknown.contains(&k) {
                prescribed[k] = body.ddq[k - root_dofs];
            }
        }
        let bias = inverse_dynamics(body, gravity, &prescribed);

        let rhs = DVector::from_iterator(
            self.unknown.len(),
            self.unknown.iter().map(|&k| {
                let applied = if k >= root_dofs { body.tau[k - root_dofs] } else { 0.0 };
                applied - bias[k]
            }),
        );
        self.solve(&rhs)
    }

    /// Rows of `dt · M_UU⁻¹ Jᵀ` for a 3-row Jacobian given by its columns
    /// over all generalized coordinates. Row `j` maps a force to the velocity
    /// change of unknown `j`.
    pub fn response(&self, jacobian: &[DVec3]) -> Vec<DVec3> {
        if !self.has_unknowns() {
            return Vec::new();
        }
        let mut jt = DMatrix::zeros(self.unknown.len(), 3);
        for (j, &dof) in self.unknown.iter().enumerate() {
            let column = jacobian[dof];
            jt[(j, 0)] = column.x;
            jt[(j, 1)] = column.y;
            jt[(j, 2)] = column.z;
        }
        let solved = match &self.factor {
            Factor::Cholesky(cholesky) => cholesky.solve(&jt),
            Factor::Lu(lu) => lu.solve(&jt).unwrap_or_else(|| DMatrix::zeros(jt.nrows(), 3)),
            Factor::Singular => DMatrix::zeros(jt.nrows(), 3),
        };
        (0..self.unknown.len())
            .map(|j| DVec3::new(solved[(j, 0)], solved[(j, 1)], solved[(j, 2)]) * self.dt)
            .collect()
    }

    /// Applies `response · force` to the velocity estimate.
    pub fn apply_response(&mut self, response: &[DVec3], force: DVec3) {
        for (row, &dof) in response.iter().zip(&self.unknown) {
            self.velocity[dof] += row.dot(force);
        }
    }

    /// Velocity of a point whose Jacobian columns are `jacobian`.
    pub fn point_velocity(&self, jacobian: &[DVec3]) -> DVec3 {
        jacobian
            .iter()
            .zip(self.velocity.iter())
            .fold(DVec3::ZERO, |acc, (column, v)| acc + *column * *v)
    }
}

/// Translational Jacobian columns of `point` on `link` over all coordinates.
pub fn point_jacobian(body: &Multibody, link: usize, point: DVec3) -> Vec<DVec3> {
    (0..body.num_dofs())
        .map(|dof| body.point_jacobian_column(dof, link, point))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::articulations::{JointType, Link, RootJoint};
    use crate::core::body::BodyDynamics;
    use crate::core::types::{MassProperties, Transform};
    use crate::utils::allocator::BodyHandle;
    use approx::assert_relative_eq;

    const G: DVec3 = DVec3::new(0.0, 0.0, -9.81);

    fn free_box() -> BodyEntry {
        let mut body = Multibody::new("box", RootJoint::Free)
            .with_root_transform(Transform::from_translation(DVec3::new(0.3, 0.0, 1.0)));
        body.add_link(
            Link::new("box", None, JointType::Fixed)
                .with_mass_properties(MassProperties::solid_box(DVec3::splat(0.1), 2.0)),
        );
        body.update_kinematics();
        BodyEntry::new(BodyHandle::new(0, 0), body, BodyDynamics::ForwardDynamics)
    }

    #[test]
    fn free_body_falls_with_gravity() {
        let entry = free_box();
        let frame = DynamicsFrame::build(&entry, G, 0.01);
        let accel = frame.unknown_accelerations(&entry, G);
        assert_relative_eq!(accel[5], -9.81, epsilon = 1e-9);
        assert_relative_eq!(accel[0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(frame.velocity[5], -0.0981, epsilon = 1e-9);
    }

    #[test]
    fn supporting_force_cancels_weight() {
        let mut entry = free_box();
        let origin = entry.body.link_transform(0).position;
        entry
            .body
            .external_force_mut(0)
            .add_at_point(DVec3::new(0.0, 0.0, 2.0 * 9.81), origin, origin);
        let frame = DynamicsFrame::build(&entry, G, 0.01);
        let accel = frame.unknown_accelerations(&entry, G);
        assert!(accel.norm() < 1e-9);
    }

    #[test]
    fn mass_matrix_is_symmetric_and_holds_total_mass() {
        let mut body = Multibody::new("arm", RootJoint::Free);
        body.add_link(Link::new("base", None, JointType::Fixed));
        body.add_link(
            Link::new("upper", Some(0), JointType::Revolute { axis: DVec3::Y })
                .with_offset(Transform::from_translation(DVec3::X))
                .with_mass_properties(MassProperties::default().with_center_of_mass(DVec3::X * 0.5)),
        );
        body.q[0] = 0.4;
        body.update_kinematics();
        let m = mass_matrix(&body);
        assert_eq!(m.nrows(), 7);
        assert!((m.clone() - m.transpose()).norm() < 1e-12);
        assert_relative_eq!(m[(3, 3)], body.total_mass(), epsilon = 1e-12);
    }

    #[test]
    fn response_matches_point_mass_inverse() {
        let entry = free_box();
        let frame = DynamicsFrame::build(&entry, G, 0.01);
        let com = entry.body.link_transform(0).position;
        let jacobian = point_jacobian(&entry.body, 0, com);
        let response = frame.response(&jacobian);
        let mut probe = DynamicsFrame::build(&entry, G, 0.01);
        let before = probe.point_velocity(&jacobian);
        probe.apply_response(&response, DVec3::new(0.0, 0.0, 1.0));
        let after = probe.point_velocity(&jacobian);
        assert_relative_eq!(after.z - before.z, 0.01 / 2.0, epsilon = 1e-12);
    }
}
