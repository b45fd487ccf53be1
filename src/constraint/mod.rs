//! Constraints between two [`crate::node::Node`]s: rigid [`link`]s and
//! damped [`spring`]s.
//!
//! Both share the same "unit direction and current length between two
//! points" computation, pulled out here instead of duplicated across the
//! two constraint kinds.

pub mod link;
pub mod spring;

use vek::Vec2;

use crate::consts::DEGENERATE_LENGTH_EPSILON;

/// Unit direction from `a` to `b` and the distance between them. Returns
/// `None` if the points are closer than [`DEGENERATE_LENGTH_EPSILON`], in
/// which case the constraint contributes nothing this step.
pub(crate) fn direction_and_length(a: Vec2<f64>, b: Vec2<f64>) -> Option<(Vec2<f64>, f64)> {
    let delta = b - a;
    let length = delta.magnitude();
    if length < DEGENERATE_LENGTH_EPSILON {
        return None;
    }

    Some((delta / length, length))
}
