//! Collision input: the detector boundary, contact candidates and intake.

pub mod contact;
pub mod culling;
pub mod plane;

pub use contact::{CollisionDetector, ContactCandidate, FixedContacts, NullDetector};
pub use culling::{cull_contacts, intake, IntakeStats};
pub use plane::GroundPlaneDetector;
