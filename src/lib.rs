//! A 2D point-mass/constraint physics core for soft-body simulation.
//!
//! Point masses ([`node::Node`]) are connected by rigid
//! [`constraint::link::Link`]s or damped [`constraint::spring::Spring`]s
//! and collide against static [`shapes::rect::Rect`] and
//! [`shapes::triangle::Triangle`] obstacles. [`space::Space`] owns every
//! entity in `slotmap` arenas and drives the fixed-timestep solver via
//! [`space::Space::step`].
//!
//! The crate performs no I/O and installs no logger; a host application
//! configures both. [`config::SpaceConfig`] is provided for hosts that want
//! to deserialize construction settings from a file.

pub mod collision;
pub mod config;
pub mod consts;
pub mod constraint;
pub mod error;
pub mod handle;
pub mod node;
pub mod segment;
pub mod sensor;
pub mod shapes;
pub mod space;

pub use config::SpaceConfig;
pub use error::SpaceError;
pub use handle::{LinkKey, NodeKey, RectKey, SensorKey, SpringKey, TriangleKey};
pub use node::Node;
pub use space::Space;
