use glam::{DMat3, DVec3};

use super::math::skew;

/// A 6D spatial vector combining angular and linear components.
///
/// Vectors are expressed in world-frame Plücker coordinates: in motion space
/// `ang` is angular velocity and `lin` the velocity of the body point that
/// coincides with the world origin; in force space `ang` is the moment about
/// the world origin and `lin` the force.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpatialVec {
    pub ang: DVec3,
    pub lin: DVec3,
}

impl SpatialVec {
    pub const ZERO: Self = Self {
        ang: DVec3::ZERO,
        lin: DVec3::ZERO,
    };

    pub fn new(ang: DVec3, lin: DVec3) -> Self {
        Self { ang, lin }
    }

    /// Spatial force of a pure force `force` acting through `point`.
    pub fn force_at(point: DVec3, force: DVec3) -> Self {
        Self {
            ang: point.cross(force),
            lin: force,
        }
    }

    pub fn dot(&self, other: &SpatialVec) -> f64 {
        self.ang.dot(other.ang) + self.lin.dot(other.lin)
    }

    /// Spatial motion cross product: v1 x_m v2
    pub fn cross_motion(&self, other: &SpatialVec) -> SpatialVec {
        SpatialVec {
            ang: self.ang.cross(other.ang),
            lin: self.ang.cross(other.lin) + self.lin.cross(other.ang),
        }
    }

    /// Spatial force cross product: v x_f f
    pub fn cross_force(&self, other: &SpatialVec) -> SpatialVec {
        SpatialVec {
            ang: self.ang.cross(other.ang) + self.lin.cross(other.lin),
            lin: self.ang.cross(other.lin),
        }
    }

    /// Velocity of the world-space point `point` for a motion vector.
    pub fn point_velocity(&self, point: DVec3) -> DVec3 {
        self.lin + self.ang.cross(point)
    }
}

impl std::ops::Add for SpatialVec {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            ang: self.ang + other.ang,
            lin: self.lin + other.lin,
        }
    }
}

impl std::ops::AddAssign for SpatialVec {
    fn add_assign(&mut self, other: Self) {
        self.ang += other.ang;
        self.lin += other.lin;
    }
}

impl std::ops::Sub for SpatialVec {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            ang: self.ang - other.ang,
            lin: self.lin - other.lin,
        }
    }
}

impl std::ops::Neg for SpatialVec {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            ang: -self.ang,
            lin: -self.lin,
        }
    }
}

impl std::ops::Mul<f64> for SpatialVec {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self {
            ang: self.ang * rhs,
            lin: self.lin * rhs,
        }
    }
}

/// A 6x6 spatial matrix represented as 4 3x3 blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialMat {
    pub m00: DMat3,
    pub m01: DMat3,
    pub m10: DMat3,
    pub m11: DMat3,
}

impl Default for SpatialMat {
    fn default() -> Self {
        Self {
            m00: DMat3::ZERO,
            m01: DMat3::ZERO,
            m10: DMat3::ZERO,
            m11: DMat3::ZERO,
        }
    }
}

impl SpatialMat {
    pub fn mul_vec(&self, v: SpatialVec) -> SpatialVec {
        SpatialVec {
            ang: self.m00 * v.ang + self.m01 * v.lin,
            lin: self.m10 * v.ang + self.m11 * v.lin,
        }
    }
}

impl std::ops::Add for SpatialMat {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            m00: self.m00 + other.m00,
            m01: self.m01 + other.m01,
            m10: self.m10 + other.m10,
            m11: self.m11 + other.m11,
        }
    }
}

impl std::ops::AddAssign for SpatialMat {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// Rigid-body inertia given by mass, world-space center of mass and
/// world-aligned rotational inertia about the center of mass.
#[derive(Debug, Clone, Copy)]
pub struct SpatialInertia {
    pub mass: f64,
    pub com: DVec3,
    pub inertia: DMat3,
}

impl SpatialInertia {
    pub fn new(mass: f64, com: DVec3, inertia: DMat3) -> Self {
        Self { mass, com, inertia }
    }

    /// 6x6 matrix about the world origin. Matrices of different links share
    /// the reference point, so composite inertias are plain sums.
    pub fn to_mat(&self) -> SpatialMat {
        let m = self.mass;
        let c_skew = skew(self.com);
        let mc_skew = c_skew * m;

        // I_origin = I_com - m * [c]x [c]x
        let i_origin = self.inertia - c_skew * c_skew * m;

        SpatialMat {
            m00: i_origin,
            m01: mc_skew,
            m10: mc_skew.transpose(),
            m11: DMat3::IDENTITY * m,
        }
    }
}
