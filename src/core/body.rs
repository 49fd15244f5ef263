use super::articulations::Multibody;
use crate::config::DynamicsMode;
use crate::dynamics::high_gain::HighGainController;
use crate::utils::allocator::BodyHandle;

/// Per-body dynamics dispatch tag.
#[derive(Debug, Clone)]
pub enum BodyDynamics {
    /// Root and joint accelerations are all solved from forces.
    ForwardDynamics,
    /// Joints follow the controller; only a free root is solved. Without a
    /// controller the joints hold their posture.
    HighGain(Option<HighGainController>),
    /// Forward kinematics only; infinitely massive in contacts.
    Kinematic,
}

impl BodyDynamics {
    pub fn mode(&self) -> DynamicsMode {
        match self {
            BodyDynamics::ForwardDynamics => DynamicsMode::ForwardDynamics,
            BodyDynamics::HighGain(_) => DynamicsMode::HighGain,
            BodyDynamics::Kinematic => DynamicsMode::Kinematics,
        }
    }

    pub fn is_kinematic(&self) -> bool {
        matches!(self, BodyDynamics::Kinematic)
    }

    pub fn controller(&self) -> Option<&HighGainController> {
        match self {
            BodyDynamics::HighGain(controller) => controller.as_ref(),
            _ => None,
        }
    }

    pub fn controller_mut(&mut self) -> Option<&mut HighGainController> {
        match self {
            BodyDynamics::HighGain(controller) => controller.as_mut(),
            _ => None,
        }
    }

    /// Whether generalized coordinate `dof` of `body` is solved from forces.
    pub fn is_unknown(&self, body: &Multibody, dof: usize) -> bool {
        match self {
            BodyDynamics::ForwardDynamics => true,
            BodyDynamics::HighGain(_) => dof < body.root_dofs(),
            BodyDynamics::Kinematic => false,
        }
    }
}

/// A registered body and its dynamics tag.
#[derive(Debug, Clone)]
pub struct BodyEntry {
    pub handle: BodyHandle,
    pub body: Multibody,
    pub dynamics: BodyDynamics,
}

impl BodyEntry {
    pub fn new(handle: BodyHandle, body: Multibody, dynamics: BodyDynamics) -> Self {
        Self {
            handle,
            body,
            dynamics,
        }
    }

    pub fn mode(&self) -> DynamicsMode {
        self.dynamics.mode()
    }

    /// Indices of the generalized coordinates solved from forces.
    pub fn unknown_dofs(&self) -> Vec<usize> {
        (0..self.body.num_dofs())
            .filter(|&dof| self.dynamics.is_unknown(&self.body, dof))
            .collect()
    }
}
