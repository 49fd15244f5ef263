//! Utility helpers including math extensions, the body table, spatial algebra and logging.

pub mod allocator;
pub mod logging;
pub mod math;
pub mod spatial;

pub use spatial::{SpatialInertia, SpatialMat, SpatialVec};

pub use allocator::{BodyHandle, BodyTable};
pub use math::*;
