use glam::DVec3;

use super::contact::{CollisionDetector, ContactCandidate};
use crate::world::World;

/// Default distance above the plane within which probes are still reported.
pub const DEFAULT_PROBE_MARGIN: f64 = 0.02;

/// Tests link contact points against a horizontal plane (normal +Z) owned by
/// a ground body.
///
/// The plane passes through the origin of the ground body's root link,
/// raised by `height`. Ground is side A of every contact it reports.
#[derive(Debug, Clone)]
pub struct GroundPlaneDetector {
    ground: String,
    height: f64,
    margin: f64,
    missing_warned: bool,
}

impl GroundPlaneDetector {
    pub fn new(ground_body: &str) -> Self {
        Self {
            ground: ground_body.into(),
            height: 0.0,
            margin: DEFAULT_PROBE_MARGIN,
            missing_warned: false,
        }
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = height;
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin.max(0.0);
        self
    }
}

impl CollisionDetector for GroundPlaneDetector {
    fn detect(&mut self, world: &World) -> Vec<ContactCandidate> {
        let Some(ground) = world.find_body(&self.ground) else {
            if !self.missing_warned {
                log::warn!("ground body `{}` is not registered; no plane contacts", self.ground);
                self.missing_warned = true;
            }
            return Vec::new();
        };
        self.missing_warned = false;

        let plane_z = world
            .body(ground)
            .map(|entry| entry.body.link_transform(0).position.z)
            .unwrap_or_default()
            + self.height;

        let mut candidates = Vec::new();
        for entry in world.bodies().iter() {
            if entry.handle == ground {
                continue;
            }
            for (link_idx, link) in entry.body.links.iter().enumerate() {
                let transform = entry.body.link_transform(link_idx);
                for local in &link.contact_points {
                    let point = transform.transform_point(*local);
                    let depth = plane_z - point.z;
                    if depth >= -self.margin {
                        candidates.push(ContactCandidate::new(
                            (ground, 0),
                            (entry.handle, link_idx),
                            point,
                            DVec3::Z,
                            depth,
                        ));
                    }
                }
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::articulations::{JointType, Link, Multibody, RootJoint};
    use crate::core::body::BodyDynamics;
    use crate::core::types::Transform;
    use approx::assert_relative_eq;

    fn world_with_probe(z: f64) -> World {
        let mut world = World::new(0.001).unwrap();
        let mut ground = Multibody::new("floor", RootJoint::Fixed);
        ground.add_link(Link::new("floor", None, JointType::Fixed));
        world.add_body(ground, BodyDynamics::Kinematic).unwrap();

        let mut probe = Multibody::new("probe", RootJoint::Free)
            .with_root_transform(Transform::from_translation(DVec3::new(0.0, 0.0, z)));
        probe.add_link(Link::new("tip", None, JointType::Fixed).with_contact_point(DVec3::ZERO));
        world.add_body(probe, BodyDynamics::ForwardDynamics).unwrap();
        world
    }

    #[test]
    fn probes_below_the_plane_penetrate() {
        let world = world_with_probe(0.04);
        let mut detector = GroundPlaneDetector::new("floor").with_height(0.05);
        let candidates = detector.detect(&world);
        assert_eq!(candidates.len(), 1);
        assert_relative_eq!(candidates[0].depth, 0.01, epsilon = 1e-12);
        assert_eq!(candidates[0].normal, DVec3::Z);
        assert_eq!(candidates[0].body_a, world.find_body("floor").unwrap());
    }

    #[test]
    fn probes_beyond_the_margin_are_skipped() {
        let world = world_with_probe(0.05);
        assert_eq!(GroundPlaneDetector::new("floor").with_margin(0.04).detect(&world).len(), 0);
        assert_eq!(GroundPlaneDetector::new("floor").with_margin(0.06).detect(&world).len(), 1);
        assert!(GroundPlaneDetector::new("missing").detect(&world).is_empty());
    }
}
