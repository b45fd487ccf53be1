//! Centralized floating-point constants shared across the solver.
//!
//! The source this crate is modeled on repeated these as literals at every
//! call site; collecting them here is the only deviation from "keep the
//! numbers where they're used".

/// Full turn, in radians.
pub const TAU: f64 = std::f64::consts::TAU;

/// Below this length a Link/Spring direction is considered undefined
/// (endpoints coincide) and the constraint contributes no impulse this step.
pub const DEGENERATE_LENGTH_EPSILON: f64 = 1e-10;

/// Maximum per-step translation magnitude, in world units.
///
/// Bounds `|dt * v|` by rescaling velocity; see [`crate::node::Node::update_position`].
pub const MAX_TRANSLATION: f64 = 2.0;

/// `MAX_TRANSLATION` squared, precomputed to avoid a sqrt in the hot path.
pub const MAX_TRANSLATION_SQUARED: f64 = MAX_TRANSLATION * MAX_TRANSLATION;

/// Default spatial-hash cell size multiplier used when auto-sizing from the
/// mean obstacle extent (cell sizes <= 0 at construction trigger auto-sizing).
pub const AUTO_CELL_SIZE_MULTIPLIER: f64 = 3.0;
