//! Additional math helpers layered on top of `glam`.

use glam::{DMat3, DQuat, DVec3};

/// Cross-product matrix: `skew(a) * b == a.cross(b)`.
pub fn skew(v: DVec3) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(0.0, v.z, -v.y),
        DVec3::new(-v.z, 0.0, v.x),
        DVec3::new(v.y, -v.x, 0.0),
    )
}

/// Converts angular velocity vector (radians/sec) into a quaternion delta.
pub fn angular_velocity_to_quat(angular: DVec3, dt: f64) -> DQuat {
    let angle = angular.length() * dt;
    if angle.abs() < 1e-12 {
        return DQuat::IDENTITY;
    }
    let axis = angular.normalize();
    DQuat::from_axis_angle(axis, angle)
}

/// Removes the component of `vector` along the unit `normal`.
pub fn project_onto_tangent(vector: DVec3, normal: DVec3) -> DVec3 {
    vector - normal * vector.dot(normal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skew_matches_cross_product() {
        let a = DVec3::new(1.0, -2.0, 0.5);
        let b = DVec3::new(0.3, 4.0, -1.0);
        let diff = skew(a) * b - a.cross(b);
        assert!(diff.length() < 1e-12);
    }

    #[test]
    fn tangent_projection_is_orthogonal() {
        let n = DVec3::Z;
        let t = project_onto_tangent(DVec3::new(1.0, 2.0, 3.0), n);
        assert_eq!(t, DVec3::new(1.0, 2.0, 0.0));
    }
}
