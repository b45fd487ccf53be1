//! Static collision pipeline: broad-phase spatial hash, narrow-phase
//! geometric tests, and per-contact impulse resolution.

pub mod rect_detector;
pub mod spatial_hash;
pub mod triangle_detector;

pub use rect_detector::{Collision, CollisionDetector};
pub use triangle_detector::{Contact, TriangleCollisionDetector};
