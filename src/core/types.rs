use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::utils::spatial::SpatialVec;

/// Position and orientation of a frame in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: DVec3,
    pub rotation: DQuat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn new(position: DVec3, rotation: DQuat) -> Self {
        Self { position, rotation }
    }

    pub fn from_translation(position: DVec3) -> Self {
        Self {
            position,
            rotation: DQuat::IDENTITY,
        }
    }

    /// Applies another transform on top of this one, returning the composition.
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * other.position,
            rotation: (self.rotation * other.rotation).normalize(),
        }
    }

    pub fn inverse(&self) -> Transform {
        let rotation = self.rotation.inverse();
        Transform {
            position: -(rotation * self.position),
            rotation,
        }
    }

    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.position + self.rotation * point
    }

    pub fn transform_vector(&self, vector: DVec3) -> DVec3 {
        self.rotation * vector
    }
}

/// Linear and angular velocity of a rigid frame.
///
/// `linear` is the velocity of the frame origin, not of the world origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: DVec3,
    pub angular: DVec3,
}

impl Velocity {
    pub const ZERO: Self = Self {
        linear: DVec3::ZERO,
        angular: DVec3::ZERO,
    };

    pub fn new(linear: DVec3, angular: DVec3) -> Self {
        Self { linear, angular }
    }

    /// Plücker motion vector of a frame whose origin sits at `origin`.
    pub fn to_spatial(&self, origin: DVec3) -> SpatialVec {
        SpatialVec::new(self.angular, self.linear + origin.cross(self.angular))
    }

    pub fn from_spatial(motion: SpatialVec, origin: DVec3) -> Self {
        Self {
            linear: motion.lin - origin.cross(motion.ang),
            angular: motion.ang,
        }
    }
}

/// Force and torque applied to a link. The torque is taken about the link
/// origin and both vectors are expressed in world space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Wrench {
    pub force: DVec3,
    pub torque: DVec3,
}

impl Wrench {
    pub const ZERO: Self = Self {
        force: DVec3::ZERO,
        torque: DVec3::ZERO,
    };

    pub fn new(force: DVec3, torque: DVec3) -> Self {
        Self { force, torque }
    }

    /// Adds `force` acting through the world point `point` on a link whose
    /// origin is at `origin`.
    pub fn add_at_point(&mut self, force: DVec3, point: DVec3, origin: DVec3) {
        self.force += force;
        self.torque += (point - origin).cross(force);
    }

    /// Spatial force about the world origin.
    pub fn to_spatial(&self, origin: DVec3) -> SpatialVec {
        SpatialVec::new(self.torque + origin.cross(self.force), self.force)
    }

    pub fn is_zero(&self) -> bool {
        self.force == DVec3::ZERO && self.torque == DVec3::ZERO
    }
}

/// Mass, center of mass and rotational inertia of a link in its own frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassProperties {
    pub mass: f64,
    /// Center of mass offset from the link origin.
    pub center_of_mass: DVec3,
    /// Rotational inertia about the center of mass.
    pub inertia: DMat3,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self {
            mass: 1.0,
            center_of_mass: DVec3::ZERO,
            inertia: DMat3::IDENTITY,
        }
    }
}

impl MassProperties {
    pub fn new(mass: f64, center_of_mass: DVec3, inertia: DMat3) -> Self {
        Self {
            mass,
            center_of_mass,
            inertia,
        }
    }

    pub fn solid_box(half_extents: DVec3, mass: f64) -> Self {
        let lx = half_extents.x * 2.0;
        let ly = half_extents.y * 2.0;
        let lz = half_extents.z * 2.0;
        let factor = mass / 12.0;
        Self::new(
            mass,
            DVec3::ZERO,
            DMat3::from_diagonal(DVec3::new(
                factor * (ly * ly + lz * lz),
                factor * (lx * lx + lz * lz),
                factor * (lx * lx + ly * ly),
            )),
        )
    }

    pub fn solid_sphere(radius: f64, mass: f64) -> Self {
        let value = 0.4 * mass * radius * radius;
        Self::new(mass, DVec3::ZERO, DMat3::from_diagonal(DVec3::splat(value)))
    }

    pub fn with_center_of_mass(mut self, center_of_mass: DVec3) -> Self {
        self.center_of_mass = center_of_mass;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.mass.is_finite()
            && self.mass > 0.0
            && self.center_of_mass.is_finite()
            && self.inertia.is_finite()
    }
}
