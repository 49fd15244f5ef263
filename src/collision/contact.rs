use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::utils::allocator::BodyHandle;
use crate::world::World;

/// Raw contact reported by a collision detector.
///
/// `normal` points from A toward B (the direction B is pushed). `depth` is
/// positive for interpenetration and negative for a separation of `-depth`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactCandidate {
    pub body_a: BodyHandle,
    pub link_a: usize,
    pub body_b: BodyHandle,
    pub link_b: usize,
    pub position: DVec3,
    pub normal: DVec3,
    pub depth: f64,
    /// `v_B - v_A` at `position`; filled in by contact intake.
    pub relative_velocity: DVec3,
}

impl ContactCandidate {
    pub fn new(
        (body_a, link_a): (BodyHandle, usize),
        (body_b, link_b): (BodyHandle, usize),
        position: DVec3,
        normal: DVec3,
        depth: f64,
    ) -> Self {
        Self {
            body_a,
            link_a,
            body_b,
            link_b,
            position,
            normal,
            depth,
            relative_velocity: DVec3::ZERO,
        }
    }

    /// Separation distance; negative while interpenetrating.
    pub fn separation(&self) -> f64 {
        -self.depth
    }

    /// Normal component of the relative velocity, positive when separating.
    pub fn normal_velocity(&self) -> f64 {
        self.relative_velocity.dot(self.normal)
    }

    /// Order-independent key of the two touching links.
    pub fn pair_key(&self) -> ((BodyHandle, usize), (BodyHandle, usize)) {
        let a = (self.body_a, self.link_a);
        let b = (self.body_b, self.link_b);
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

/// Produces contact candidates from the current world state.
pub trait CollisionDetector: Send {
    fn detect(&mut self, world: &World) -> Vec<ContactCandidate>;
}

/// Detector that never reports contacts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDetector;

impl CollisionDetector for NullDetector {
    fn detect(&mut self, _world: &World) -> Vec<ContactCandidate> {
        Vec::new()
    }
}

/// Replays a fixed candidate list every step.
#[derive(Debug, Default, Clone)]
pub struct FixedContacts {
    pub candidates: Vec<ContactCandidate>,
}

impl FixedContacts {
    pub fn new(candidates: Vec<ContactCandidate>) -> Self {
        Self { candidates }
    }
}

impl CollisionDetector for FixedContacts {
    fn detect(&mut self, _world: &World) -> Vec<ContactCandidate> {
        self.candidates.clone()
    }
}
