//! Stable arena keys for every entity [`crate::space::Space`] owns.
//!
//! Nodes and constraints used to reference each other through cyclic
//! back-pointers; here `Space` owns a `slotmap` arena per entity kind and
//! every cross-reference is one of these keys instead. A destroyed entity's
//! key simply fails the next arena lookup rather than dangling.

use slotmap::new_key_type;

new_key_type! {
    /// Key for a [`crate::node::Node`] in a [`crate::space::Space`].
    pub struct NodeKey;

    /// Key for a [`crate::constraint::link::Link`] in a [`crate::space::Space`].
    pub struct LinkKey;

    /// Key for a [`crate::constraint::spring::Spring`] in a [`crate::space::Space`].
    pub struct SpringKey;

    /// Key for a [`crate::shapes::rect::Rect`] in a [`crate::space::Space`].
    pub struct RectKey;

    /// Key for a [`crate::shapes::triangle::Triangle`] in a [`crate::space::Space`].
    pub struct TriangleKey;

    /// Key for a sensor in a [`crate::sensor::SensorHub`].
    pub struct SensorKey;
}
