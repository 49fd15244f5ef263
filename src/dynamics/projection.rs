//! Planar (XZ) projection used in 2D mode: motion is confined to the XZ
//! plane, so forces along Y and torques about X and Z are dropped.

use crate::core::body::BodyEntry;
use crate::core::types::{Velocity, Wrench};
use crate::utils::allocator::BodyTable;

pub fn project_wrench_2d(wrench: Wrench) -> Wrench {
    let mut out = wrench;
    out.force.y = 0.0;
    out.torque.x = 0.0;
    out.torque.z = 0.0;
    out
}

pub fn project_velocity_2d(velocity: Velocity) -> Velocity {
    let mut out = velocity;
    out.linear.y = 0.0;
    out.angular.x = 0.0;
    out.angular.z = 0.0;
    out
}

/// Projects every link accumulator of every body.
pub fn project_accumulators(bodies: &mut BodyTable<BodyEntry>) {
    for entry in bodies.iter_mut() {
        for link in 0..entry.body.num_links() {
            let wrench = entry.body.external_force_mut(link);
            *wrench = project_wrench_2d(*wrench);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn out_of_plane_components_are_zeroed() {
        let wrench = project_wrench_2d(Wrench::new(DVec3::splat(1.0), DVec3::splat(2.0)));
        assert_eq!(wrench.force, DVec3::new(1.0, 0.0, 1.0));
        assert_eq!(wrench.torque, DVec3::new(0.0, 2.0, 0.0));
    }
}
