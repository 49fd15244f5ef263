use glam::{DQuat, DVec3};

use super::types::{MassProperties, Transform, Velocity, Wrench};
use crate::error::{Result, SimError};
use crate::utils::spatial::{SpatialInertia, SpatialVec};

/// Type of joint connecting a link to its parent in reduced coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointType {
    /// 0-DOF Rigid connection.
    Fixed,
    /// 1-DOF Rotational joint about `axis` (joint frame).
    Revolute { axis: DVec3 },
    /// 1-DOF Translational joint along `axis` (joint frame).
    Prismatic { axis: DVec3 },
}

impl JointType {
    /// Returns the number of degrees of freedom for this joint type.
    pub fn dofs(&self) -> usize {
        match self {
            JointType::Fixed => 0,
            JointType::Revolute { .. } | JointType::Prismatic { .. } => 1,
        }
    }

    pub fn axis(&self) -> Option<DVec3> {
        match self {
            JointType::Fixed => None,
            JointType::Revolute { axis } | JointType::Prismatic { axis } => Some(*axis),
        }
    }

    /// Calculates the local transform across the joint for coordinate `q`.
    pub fn transform(&self, q: f64) -> Transform {
        match self {
            JointType::Fixed => Transform::default(),
            JointType::Revolute { axis } => {
                Transform::new(DVec3::ZERO, DQuat::from_axis_angle(*axis, q))
            }
            JointType::Prismatic { axis } => Transform::from_translation(*axis * q),
        }
    }

    /// World-frame motion subspace of the joint once its frame sits at `frame`.
    fn subspace(&self, frame: &Transform) -> SpatialVec {
        match self {
            JointType::Fixed => SpatialVec::ZERO,
            JointType::Revolute { axis } => {
                let a = frame.transform_vector(*axis);
                SpatialVec::new(a, frame.position.cross(a))
            }
            JointType::Prismatic { axis } => {
                SpatialVec::new(DVec3::ZERO, frame.transform_vector(*axis))
            }
        }
    }
}

/// How the root link is attached to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootJoint {
    /// Welded to the world at `root_transform`.
    Fixed,
    /// 6-DOF floating base.
    #[default]
    Free,
}

impl RootJoint {
    pub fn dofs(&self) -> usize {
        match self {
            RootJoint::Fixed => 0,
            RootJoint::Free => 6,
        }
    }
}

/// A single node in the articulated body tree.
#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,
    /// Index of the parent link. None if this is the root link.
    pub parent: Option<usize>,
    /// The joint connecting this link to its parent.
    pub joint_type: JointType,
    /// Offset of the joint coordinate in the multibody joint vectors.
    pub q_offset: usize,
    /// Static transform from parent link frame to this link's joint frame (at q=0).
    pub parent_to_joint: Transform,
    pub mass_properties: MassProperties,
    /// Contact probe points in the link frame.
    pub contact_points: Vec<DVec3>,
}

impl Link {
    pub fn new(name: &str, parent: Option<usize>, joint: JointType) -> Self {
        Self {
            name: name.into(),
            parent,
            joint_type: joint,
            q_offset: 0,
            parent_to_joint: Transform::default(),
            mass_properties: MassProperties::default(),
            contact_points: Vec::new(),
        }
    }

    pub fn with_offset(mut self, parent_to_joint: Transform) -> Self {
        self.parent_to_joint = parent_to_joint;
        self
    }

    pub fn with_mass_properties(mut self, mass_properties: MassProperties) -> Self {
        self.mass_properties = mass_properties;
        self
    }

    pub fn with_contact_point(mut self, point: DVec3) -> Self {
        self.contact_points.push(point);
        self
    }
}

/// Computed per-link state, refreshed by forward kinematics.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkState {
    pub transform: Transform,
    /// Plücker spatial velocity in world coordinates.
    pub velocity: SpatialVec,
    /// Plücker spatial acceleration in world coordinates.
    pub acceleration: SpatialVec,
    /// Motion subspace of the link's joint (zero for fixed joints).
    pub subspace: SpatialVec,
    /// External force accumulator (torque about the link origin).
    pub external: Wrench,
}

/// A collection of links forming a tree structure for reduced-coordinate dynamics.
///
/// Generalized coordinates are ordered with the six root coordinates
/// (angular then linear) first when the root is free, followed by one
/// coordinate per moving joint.
#[derive(Debug, Clone)]
pub struct Multibody {
    pub name: String,
    pub root_joint: RootJoint,
    pub root_transform: Transform,
    /// Velocity of the root frame origin and angular velocity, world frame.
    pub root_velocity: Velocity,
    pub root_acceleration: Velocity,
    /// Links ordered such that a parent always appears before its children.
    pub links: Vec<Link>,
    /// Joint positions (q).
    pub q: Vec<f64>,
    /// Joint velocities (dq).
    pub dq: Vec<f64>,
    /// Joint accelerations (ddq).
    pub ddq: Vec<f64>,
    /// Joint torques (tau).
    pub tau: Vec<f64>,
    /// Links that may serve as the support foot during kinematic walking.
    pub feet: Vec<usize>,
    joint_links: Vec<usize>,
    states: Vec<LinkState>,
}

impl Multibody {
    pub fn new(name: &str, root_joint: RootJoint) -> Self {
        Self {
            name: name.into(),
            root_joint,
            root_transform: Transform::default(),
            root_velocity: Velocity::ZERO,
            root_acceleration: Velocity::ZERO,
            links: Vec::new(),
            q: Vec::new(),
            dq: Vec::new(),
            ddq: Vec::new(),
            tau: Vec::new(),
            feet: Vec::new(),
            joint_links: Vec::new(),
            states: Vec::new(),
        }
    }

    pub fn with_root_transform(mut self, transform: Transform) -> Self {
        self.root_transform = transform;
        self
    }

    /// Adds a link to the multibody and allocates space for its DOFs.
    pub fn add_link(&mut self, mut link: Link) -> usize {
        let idx = self.links.len();
        link.q_offset = self.q.len();
        link.joint_type = match link.joint_type {
            JointType::Revolute { axis } => JointType::Revolute {
                axis: axis.normalize_or_zero(),
            },
            JointType::Prismatic { axis } => JointType::Prismatic {
                axis: axis.normalize_or_zero(),
            },
            JointType::Fixed => JointType::Fixed,
        };
        for _ in 0..link.joint_type.dofs() {
            self.joint_links.push(idx);
            self.q.push(0.0);
            self.dq.push(0.0);
            self.ddq.push(0.0);
            self.tau.push(0.0);
        }
        self.links.push(link);
        self.states.push(LinkState::default());
        idx
    }

    pub fn add_foot(&mut self, link: usize) {
        if !self.feet.contains(&link) {
            self.feet.push(link);
        }
    }

    /// Checks the tree topology and the physical parameters of every link.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| SimError::InvalidBody {
            name: self.name.clone(),
            reason,
        };
        if self.links.is_empty() {
            return Err(invalid("the body has no links".into()));
        }
        for (i, link) in self.links.iter().enumerate() {
            match (i, link.parent) {
                (0, Some(_)) => return Err(invalid("the root link has a parent".into())),
                (0, None) => {
                    if link.joint_type != JointType::Fixed {
                        return Err(invalid(
                            "the root link must use the root joint, not a link joint".into(),
                        ));
                    }
                }
                (_, None) => {
                    return Err(invalid(format!("link `{}` has no parent", link.name)));
                }
                (_, Some(parent)) if parent >= i => {
                    return Err(invalid(format!(
                        "link `{}` appears before its parent {parent}",
                        link.name
                    )));
                }
                _ => {}
            }
            if let Some(axis) = link.joint_type.axis() {
                if axis.length_squared() < 0.5 {
                    return Err(invalid(format!("joint of link `{}` has no axis", link.name)));
                }
            }
            if !link.mass_properties.is_valid() {
                return Err(invalid(format!(
                    "link `{}` needs a positive finite mass",
                    link.name
                )));
            }
        }
        if let Some(foot) = self.feet.iter().find(|&&foot| foot >= self.links.len()) {
            return Err(invalid(format!("foot link {foot} does not exist")));
        }
        Ok(())
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn num_joints(&self) -> usize {
        self.q.len()
    }

    pub fn root_dofs(&self) -> usize {
        self.root_joint.dofs()
    }

    /// Number of generalized coordinates (root plus joints).
    pub fn num_dofs(&self) -> usize {
        self.root_dofs() + self.num_joints()
    }

    pub fn has_free_root(&self) -> bool {
        self.root_joint == RootJoint::Free
    }

    pub fn link_by_name(&self, name: &str) -> Option<usize> {
        self.links.iter().position(|link| link.name == name)
    }

    pub fn state(&self, link: usize) -> &LinkState {
        &self.states[link]
    }

    pub fn states(&self) -> &[LinkState] {
        &self.states
    }

    pub fn link_transform(&self, link: usize) -> Transform {
        self.states[link].transform
    }

    /// World velocity of the world point `point` rigidly attached to `link`.
    pub fn point_velocity(&self, link: usize, point: DVec3) -> DVec3 {
        self.states[link].velocity.point_velocity(point)
    }

    pub fn external_force(&self, link: usize) -> &Wrench {
        &self.states[link].external
    }

    pub fn external_force_mut(&mut self, link: usize) -> &mut Wrench {
        &mut self.states[link].external
    }

    pub fn clear_external_forces(&mut self) {
        for state in &mut self.states {
            state.external = Wrench::ZERO;
        }
    }

    /// Zeroes every velocity, acceleration and torque, keeping the posture.
    pub fn reset_motion(&mut self) {
        self.root_velocity = Velocity::ZERO;
        self.root_acceleration = Velocity::ZERO;
        self.dq.iter_mut().for_each(|v| *v = 0.0);
        self.ddq.iter_mut().for_each(|v| *v = 0.0);
        self.tau.iter_mut().for_each(|v| *v = 0.0);
    }

    /// True if `ancestor` lies on the path from the root to `link` (inclusive).
    pub fn is_ancestor_or_self(&self, ancestor: usize, link: usize) -> bool {
        let mut current = Some(link);
        while let Some(idx) = current {
            if idx == ancestor {
                return true;
            }
            if idx < ancestor {
                return false;
            }
            current = self.links[idx].parent;
        }
        false
    }

    /// Link moved first by generalized coordinate `dof`.
    pub fn dof_link(&self, dof: usize) -> usize {
        let root_dofs = self.root_dofs();
        if dof < root_dofs {
            0
        } else {
            self.joint_links[dof - root_dofs]
        }
    }

    /// World-frame motion subspace column of generalized coordinate `dof`.
    pub fn dof_subspace(&self, dof: usize) -> SpatialVec {
        let root_dofs = self.root_dofs();
        if dof < root_dofs {
            let p = self.root_transform.position;
            let mut e = DVec3::ZERO;
            e[dof % 3] = 1.0;
            if dof < 3 {
                SpatialVec::new(e, p.cross(e))
            } else {
                SpatialVec::new(DVec3::ZERO, e)
            }
        } else {
            self.states[self.joint_links[dof - root_dofs]].subspace
        }
    }

    /// Column `dof` of the translational Jacobian of `point` on `link`.
    pub fn point_jacobian_column(&self, dof: usize, link: usize, point: DVec3) -> DVec3 {
        if self.is_ancestor_or_self(self.dof_link(dof), link) {
            self.dof_subspace(dof).point_velocity(point)
        } else {
            DVec3::ZERO
        }
    }

    /// Generalized velocity `[w, v, dq]` (root part only if free).
    pub fn generalized_velocity(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.num_dofs());
        if self.has_free_root() {
            out.extend(self.root_velocity.angular.to_array());
            out.extend(self.root_velocity.linear.to_array());
        }
        out.extend_from_slice(&self.dq);
        out
    }

    /// Spatial inertia of `link` in world coordinates at the current pose.
    pub fn link_inertia(&self, link: usize) -> SpatialInertia {
        let props = &self.links[link].mass_properties;
        let transform = &self.states[link].transform;
        let rotation = glam::DMat3::from_quat(transform.rotation);
        SpatialInertia::new(
            props.mass,
            transform.transform_point(props.center_of_mass),
            rotation * props.inertia * rotation.transpose(),
        )
    }

    pub fn total_mass(&self) -> f64 {
        self.links.iter().map(|link| link.mass_properties.mass).sum()
    }

    /// Root spatial velocity in Plücker coordinates.
    pub fn root_spatial_velocity(&self) -> SpatialVec {
        self.root_velocity.to_spatial(self.root_transform.position)
    }

    /// Root spatial acceleration in Plücker coordinates.
    pub fn root_spatial_acceleration(&self) -> SpatialVec {
        let p = self.root_transform.position;
        let w = self.root_velocity.angular;
        let v = self.root_velocity.linear;
        let dw = self.root_acceleration.angular;
        SpatialVec::new(dw, self.root_acceleration.linear + p.cross(dw) + v.cross(w))
    }

    fn set_root_spatial_motion(&mut self, motion: SpatialVec, accel: SpatialVec) {
        let p = self.root_transform.position;
        self.root_velocity = Velocity::from_spatial(motion, p);
        let w = self.root_velocity.angular;
        let v = self.root_velocity.linear;
        self.root_acceleration = Velocity::new(accel.lin - p.cross(accel.ang) - v.cross(w), accel.ang);
    }

    /// Updates world transforms, spatial velocities and accelerations from the
    /// root state and the joint vectors.
    pub fn update_kinematics(&mut self) {
        let motion = self.root_spatial_velocity();
        let accel = self.root_spatial_acceleration();
        self.propagate(motion, accel);
    }

    /// Forward kinematics that keeps `anchor` where it was and at rest; the
    /// root is re-seated to satisfy the constraint.
    pub fn update_kinematics_from(&mut self, anchor: usize) {
        let anchor_pose = self.states[anchor].transform;

        self.propagate(SpatialVec::ZERO, SpatialVec::ZERO);
        let moved = self.states[anchor].transform;
        let correction = anchor_pose.combine(&moved.inverse());
        self.root_transform = correction.combine(&self.root_transform);

        // Velocity and acceleration are affine in the root motion.
        self.propagate(SpatialVec::ZERO, SpatialVec::ZERO);
        let root_motion = -self.states[anchor].velocity;
        self.propagate(root_motion, SpatialVec::ZERO);
        let root_accel = -self.states[anchor].acceleration;
        self.propagate(root_motion, root_accel);
        self.set_root_spatial_motion(root_motion, root_accel);
    }

    fn propagate(&mut self, root_motion: SpatialVec, root_accel: SpatialVec) {
        for i in 0..self.links.len() {
            let link = &self.links[i];
            let (parent_frame, parent_velocity, parent_accel) = match link.parent {
                Some(p) => {
                    let parent = &self.states[p];
                    (parent.transform, parent.velocity, parent.acceleration)
                }
                None => (self.root_transform, root_motion, root_accel),
            };

            let joint_frame = parent_frame.combine(&link.parent_to_joint);
            let subspace = link.joint_type.subspace(&joint_frame);
            let (q, dq, ddq) = if link.joint_type.dofs() == 1 {
                let k = link.q_offset;
                (self.q[k], self.dq[k], self.ddq[k])
            } else {
                (0.0, 0.0, 0.0)
            };

            let velocity = parent_velocity + subspace * dq;
            let acceleration =
                parent_accel + subspace * ddq + velocity.cross_motion(&(subspace * dq));

            let state = &mut self.states[i];
            state.transform = joint_frame.combine(&link.joint_type.transform(q));
            state.subspace = subspace;
            state.velocity = velocity;
            state.acceleration = acceleration;
        }
    }
}
