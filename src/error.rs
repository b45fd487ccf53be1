//! Construction-time validation errors.
//!
//! `step()` and the rest of the solver's hot path are infallible; every
//! fallible entry point lives on [`crate::space::Space`]'s `add_*`/`new`
//! constructors and is rejected here instead of producing undefined
//! behavior later.

use miette::Diagnostic;
use thiserror::Error;

/// Everything that can go wrong constructing a [`crate::space::Space`] or
/// one of the entities it owns.
#[derive(Debug, Error, Diagnostic, PartialEq)]
pub enum SpaceError {
    /// `dt` must be strictly positive.
    #[error("step size dt must be positive, got {dt}")]
    #[diagnostic(code(softlink2d::invalid_dt))]
    InvalidTimestep {
        /// The rejected value.
        dt: f64,
    },

    /// At least one solver iteration is required per step.
    #[error("n_substep must be at least 1, got {n_substep}")]
    #[diagnostic(code(softlink2d::invalid_substep_count))]
    InvalidSubstepCount {
        /// The rejected value.
        n_substep: u32,
    },

    /// Node mass must be strictly positive; a zero/negative mass would make
    /// `inv_mass` infinite or flip the sign of every impulse it receives.
    #[error("node mass must be positive, got {mass}")]
    #[diagnostic(code(softlink2d::invalid_mass))]
    InvalidMass {
        /// The rejected value.
        mass: f64,
    },

    /// A constraint's two endpoints were the same node.
    #[error("a link/spring cannot connect a node to itself")]
    #[diagnostic(code(softlink2d::self_referential_constraint))]
    SelfReferentialConstraint,

    /// The endpoints coincide at construction time, so `relax_length` would
    /// be zero and the constraint could never establish a direction.
    #[error("constraint endpoints must not coincide at construction time")]
    #[diagnostic(code(softlink2d::degenerate_constraint_length))]
    DegenerateConstraintLength,

    /// Stiffness must be strictly positive.
    #[error("stiffness must be positive, got {stiffness}")]
    #[diagnostic(code(softlink2d::invalid_stiffness))]
    InvalidStiffness {
        /// The rejected value.
        stiffness: f64,
    },

    /// A rectangle obstacle with a non-positive width or height.
    #[error("rect bounds are degenerate or inverted: x in [{x_left}, {x_right}], y in [{y_bottom}, {y_top}]")]
    #[diagnostic(code(softlink2d::invalid_rect_bounds))]
    InvalidRectBounds {
        /// Left edge.
        x_left: f64,
        /// Right edge.
        x_right: f64,
        /// Bottom edge.
        y_bottom: f64,
        /// Top edge.
        y_top: f64,
    },

    /// A triangle obstacle whose three vertices are collinear (zero area).
    #[error("triangle vertices are collinear, the triangle has zero area")]
    #[diagnostic(code(softlink2d::degenerate_triangle))]
    DegenerateTriangle,

    /// A restitution coefficient outside `[0, 1]`.
    #[error("restitution must be within [0, 1], got {restitution}")]
    #[diagnostic(code(softlink2d::invalid_restitution))]
    InvalidRestitution {
        /// The rejected value.
        restitution: f64,
    },
}
