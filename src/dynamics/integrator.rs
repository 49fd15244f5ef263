use glam::DVec3;
use nalgebra::DVector;

use crate::core::body::{BodyDynamics, BodyEntry};
use crate::core::types::Velocity;
use crate::dynamics::projection::project_velocity_2d;
use crate::utils::math::angular_velocity_to_quat;

/// Semi-implicit Euler integrator: velocities first, then positions with the
/// updated velocities.
#[derive(Debug, Clone)]
pub struct Integrator {
    pub dt: f64,
    is_2d: bool,
}

impl Integrator {
    pub fn new(dt: f64) -> Self {
        Self { dt, is_2d: false }
    }

    pub fn with_2d_mode(mut self, on: bool) -> Self {
        self.is_2d = on;
        self
    }

    /// Stores solved accelerations of the unknown coordinates in the body.
    pub fn store_accelerations(entry: &mut BodyEntry, unknown: &[usize], accelerations: &DVector<f64>) {
        let body = &mut entry.body;
        let root_dofs = body.root_dofs();
        for (j, &dof) in unknown.iter().enumerate() {
            let value = accelerations[j];
            match dof {
                0..=2 if root_dofs > 0 => body.root_acceleration.angular[dof] = value,
                3..=5 if root_dofs > 0 => body.root_acceleration.linear[dof - 3] = value,
                _ => body.ddq[dof - root_dofs] = value,
            }
        }
    }

    pub fn integrate_velocity(&self, entry: &mut BodyEntry) {
        let dt = self.dt;
        let body = &mut entry.body;
        match entry.dynamics {
            BodyDynamics::Kinematic => return,
            BodyDynamics::ForwardDynamics => {
                for (dq, ddq) in body.dq.iter_mut().zip(&body.ddq) {
                    *dq += ddq * dt;
                }
            }
            BodyDynamics::HighGain(_) => {}
        }
        if body.has_free_root() {
            body.root_velocity.linear += body.root_acceleration.linear * dt;
            body.root_velocity.angular += body.root_acceleration.angular * dt;
            if self.is_2d {
                body.root_velocity = project_velocity_2d(body.root_velocity);
            }
        } else {
            body.root_velocity = Velocity::ZERO;
            body.root_acceleration = Velocity::ZERO;
        }
    }

    /// Advances positions; `correction` is an extra root displacement from
    /// contact depth correction.
    pub fn integrate_position(&self, entry: &mut BodyEntry, correction: DVec3) {
        let dt = self.dt;
        let body = &mut entry.body;
        match entry.dynamics {
            BodyDynamics::Kinematic => return,
            BodyDynamics::ForwardDynamics => {
                for (q, dq) in body.q.iter_mut().zip(&body.dq) {
                    *q += dq * dt;
                }
            }
            BodyDynamics::HighGain(_) => {}
        }
        if body.has_free_root() {
            let root = &mut body.root_transform;
            root.position += body.root_velocity.linear * dt + correction;
            let delta = angular_velocity_to_quat(body.root_velocity.angular, dt);
            root.rotation = (delta * root.rotation).normalize();
        }
    }

    pub fn step(&self, entry: &mut BodyEntry, correction: DVec3) {
        self.integrate_velocity(entry);
        self.integrate_position(entry, correction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::articulations::{JointType, Link, Multibody, RootJoint};
    use crate::utils::allocator::BodyHandle;
    use approx::assert_relative_eq;

    fn entry(dynamics: BodyDynamics) -> BodyEntry {
        let mut body = Multibody::new("body", RootJoint::Free);
        body.add_link(Link::new("root", None, JointType::Fixed));
        body.add_link(Link::new("arm", Some(0), JointType::Revolute { axis: DVec3::Z }));
        BodyEntry::new(BodyHandle::new(0, 0), body, dynamics)
    }

    #[test]
    fn positions_use_updated_velocities() {
        let mut e = entry(BodyDynamics::ForwardDynamics);
        Integrator::store_accelerations(
            &mut e,
            &[0, 1, 2, 3, 4, 5, 6],
            &DVector::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, -10.0, 2.0]),
        );
        Integrator::new(0.1).step(&mut e, DVec3::ZERO);
        assert_relative_eq!(e.body.root_velocity.linear.z, -1.0);
        assert_relative_eq!(e.body.root_transform.position.z, -0.1);
        assert_relative_eq!(e.body.q[0], 0.02);
    }

    #[test]
    fn high_gain_joints_are_left_to_the_controller() {
        let mut e = entry(BodyDynamics::HighGain(None));
        e.body.q[0] = 0.5;
        e.body.dq[0] = 3.0;
        Integrator::new(0.1).step(&mut e, DVec3::new(0.0, 0.0, 0.01));
        assert_eq!(e.body.q[0], 0.5);
        assert_relative_eq!(e.body.root_transform.position.z, 0.01);
    }

    #[test]
    fn planar_mode_projects_root_velocity() {
        let mut e = entry(BodyDynamics::ForwardDynamics);
        e.body.root_velocity = Velocity::new(DVec3::new(1.0, 2.0, 3.0), DVec3::new(4.0, 5.0, 6.0));
        Integrator::new(0.01).with_2d_mode(true).integrate_velocity(&mut e);
        assert_eq!(e.body.root_velocity.linear, DVec3::new(1.0, 0.0, 3.0));
        assert_eq!(e.body.root_velocity.angular, DVec3::new(0.0, 5.0, 0.0));
    }
}
