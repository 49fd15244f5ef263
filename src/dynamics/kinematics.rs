//! Kinematic replay, optionally anchored at the support foot.

use crate::core::articulations::Multibody;

/// Foot link with the lowest world height, if the body has feet.
///
/// This picks the wrong foot when a swing foot dips below the stance foot.
pub fn select_support_foot(body: &Multibody) -> Option<usize> {
    body.feet
        .iter()
        .copied()
        .filter(|&foot| foot < body.num_links())
        .min_by(|&a, &b| {
            let za = body.link_transform(a).position.z;
            let zb = body.link_transform(b).position.z;
            za.total_cmp(&zb)
        })
}

/// Runs forward kinematics for a kinematically driven body. With walking
/// enabled the support foot stays put and the root follows.
pub fn step_kinematic(body: &mut Multibody, walking: bool) {
    match walking.then(|| select_support_foot(body)).flatten() {
        Some(foot) => body.update_kinematics_from(foot),
        None => body.update_kinematics(),
    }
}
