//! Servo-style replay of reference joint trajectories.

use serde::{Deserialize, Serialize};

use crate::config::FRAME_RATE_TOLERANCE;
use crate::core::articulations::Multibody;
use crate::error::{Result, SimError};

/// Sampled joint trajectory: one frame per time step, one value per joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceMotion {
    pub frame_rate: f64,
    pub frames: Vec<Vec<f64>>,
}

impl ReferenceMotion {
    pub fn new(frame_rate: f64, frames: Vec<Vec<f64>>) -> Self {
        Self { frame_rate, frames }
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Joints per frame; the narrowest frame decides.
    pub fn num_parts(&self) -> usize {
        self.frames.iter().map(Vec::len).min().unwrap_or(0)
    }

    pub fn time_step(&self) -> f64 {
        1.0 / self.frame_rate
    }
}

/// Drives every joint of a body along a [`ReferenceMotion`].
#[derive(Debug, Clone)]
pub struct HighGainController {
    motion: ReferenceMotion,
    current_frame: usize,
    last_frame: usize,
    num_joints: usize,
    finished: bool,
}

impl HighGainController {
    /// Validates `motion` against the world time step and joint count.
    pub fn start(motion: ReferenceMotion, body: &Multibody, world_time_step: f64) -> Result<Self> {
        if motion.frames.is_empty() {
            return Err(SimError::ReferenceMotion("Reference motion is empty".into()));
        }
        if (motion.frame_rate - 1.0 / world_time_step).abs() > FRAME_RATE_TOLERANCE {
            return Err(SimError::ReferenceMotion(format!(
                "The frame rate of the reference motion ({}) is different from the world frame rate ({})",
                motion.frame_rate,
                1.0 / world_time_step
            )));
        }

        let num_joints = body.num_joints().min(motion.num_parts());
        let mut controller = Self {
            last_frame: motion.frames.len() - 1,
            motion,
            current_frame: 0,
            num_joints,
            finished: false,
        };
        controller.control();
        Ok(controller)
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn num_joints(&self) -> usize {
        self.num_joints
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advances one frame. Returns `false` once the motion is exhausted; the
    /// last frame is then held.
    pub fn control(&mut self) -> bool {
        if self.current_frame >= self.last_frame {
            self.current_frame = self.last_frame;
            if !self.finished {
                self.finished = true;
                log::warn!("reference motion reached its last frame {}", self.last_frame);
            }
            return false;
        }
        self.current_frame += 1;
        true
    }

    /// Writes q, dq and ddq of the current frame using central differences.
    pub fn output(&self, body: &mut Multibody) {
        let prev = self.current_frame.saturating_sub(1);
        let next = (self.current_frame + 1).min(self.last_frame);
        let q0 = &self.motion.frames[prev];
        let q1 = &self.motion.frames[self.current_frame];
        let q2 = &self.motion.frames[next];

        let h = self.motion.time_step();
        let h2 = h * h;
        for i in 0..self.num_joints {
            body.q[i] = q1[i];
            body.dq[i] = (q2[i] - q1[i]) / h;
            body.ddq[i] = (q2[i] - 2.0 * q1[i] + q0[i]) / h2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::articulations::{JointType, Link, RootJoint};
    use approx::assert_relative_eq;
    use glam::DVec3;

    fn one_joint_body() -> Multibody {
        let mut body = Multibody::new("arm", RootJoint::Fixed);
        body.add_link(Link::new("base", None, JointType::Fixed));
        body.add_link(Link::new("arm", Some(0), JointType::Revolute { axis: DVec3::Z }));
        body
    }

    #[test]
    fn empty_motion_is_rejected() {
        let err = HighGainController::start(ReferenceMotion::new(1000.0, vec![]), &one_joint_body(), 0.001)
            .unwrap_err();
        assert_eq!(err.to_string(), "Reference motion is empty");
    }

    #[test]
    fn frame_rate_must_match_world() {
        let motion = ReferenceMotion::new(500.0, vec![vec![0.0]]);
        let err = HighGainController::start(motion, &one_joint_body(), 0.001).unwrap_err();
        assert!(matches!(err, SimError::ReferenceMotion(_)));
    }

    #[test]
    fn output_uses_finite_differences_and_holds_last_frame() {
        let frames = vec![vec![0.0], vec![0.001], vec![0.004], vec![0.009]];
        let mut body = one_joint_body();
        let mut controller =
            HighGainController::start(ReferenceMotion::new(1000.0, frames), &body, 0.001).unwrap();
        assert_eq!(controller.current_frame(), 1);

        controller.output(&mut body);
        assert_relative_eq!(body.q[0], 0.001);
        assert_relative_eq!(body.dq[0], 3.0, epsilon = 1e-9);
        assert_relative_eq!(body.ddq[0], 2000.0, epsilon = 1e-6);

        assert!(controller.control());
        assert!(controller.control());
        assert!(!controller.control());
        assert_eq!(controller.current_frame(), 3);
        controller.output(&mut body);
        assert_relative_eq!(body.dq[0], 0.0);
    }
}
