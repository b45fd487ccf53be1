//! Point mass with position, velocity, mass and a fixed/colliding flag.

use vek::Vec2;

use crate::consts::{MAX_TRANSLATION, MAX_TRANSLATION_SQUARED};

/// A point mass.
///
/// Has no orientation or rotational inertia; general rigid-body dynamics is
/// out of scope for this core (see the crate-level docs).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    /// Current position.
    pos: Vec2<f64>,
    /// Position at the start of the most recent `update_position`.
    prev_pos: Vec2<f64>,
    /// Current velocity.
    vel: Vec2<f64>,
    /// Mass. Always positive; enforced at construction by `Space::add_node`.
    mass: f64,
    /// Inverse of mass, or zero when fixed.
    inv_mass: f64,
    /// Coulomb friction coefficient, used by rect/triangle contact solvers.
    friction: f64,
    /// Whether this node is pinned in place (infinite mass).
    fixed: bool,
    /// Set by the collision detectors during `Space::step`, cleared at the
    /// start of the next step.
    colliding: bool,
}

impl Node {
    /// Construct a new node. `mass` must already be validated positive by the
    /// caller (`Space::add_node` does this).
    pub fn new(pos: Vec2<f64>, mass: f64, friction: f64, fixed: bool) -> Self {
        let inv_mass = if fixed { 0.0 } else { mass.recip() };

        Self {
            pos,
            prev_pos: pos,
            vel: Vec2::zero(),
            mass,
            inv_mass,
            friction,
            fixed,
            colliding: false,
        }
    }

    /// Current position.
    pub fn position(&self) -> Vec2<f64> {
        self.pos
    }

    /// Position prior to the most recent integration step.
    pub fn previous_position(&self) -> Vec2<f64> {
        self.prev_pos
    }

    /// Directly set the position, e.g. for contact projection. Does not
    /// touch velocity or `prev_pos`.
    pub fn set_position(&mut self, pos: Vec2<f64>) {
        self.pos = pos;
    }

    /// Current velocity.
    pub fn velocity(&self) -> Vec2<f64> {
        self.vel
    }

    /// Directly set velocity, e.g. from the constraint/contact solvers.
    pub fn set_velocity(&mut self, vel: Vec2<f64>) {
        self.vel = vel;
    }

    /// Add a velocity delta (an impulse already divided by mass).
    pub fn apply_velocity_delta(&mut self, delta: Vec2<f64>) {
        self.vel += delta;
    }

    /// Mass.
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Inverse of mass; zero when fixed.
    pub fn inv_mass(&self) -> f64 {
        self.inv_mass
    }

    /// Friction coefficient.
    pub fn friction(&self) -> f64 {
        self.friction
    }

    /// Whether this node is pinned.
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Set the mass. Does not by itself refresh attached constraints; the
    /// caller (`Space::set_node_mass`) re-runs `_update()` on every
    /// constraint touching this node afterwards.
    pub fn set_mass(&mut self, mass: f64) {
        self.mass = mass;
        if !self.fixed {
            self.inv_mass = mass.recip();
        }
    }

    /// Pin or unpin the node. Unpinning restores `inv_mass = 1 / mass`
    /// exactly, matching the invariant in the spec.
    pub fn set_fixed(&mut self, fixed: bool) {
        self.fixed = fixed;
        self.inv_mass = if fixed { 0.0 } else { self.mass.recip() };
    }

    /// Whether a collision/contact manifold touched this node during the
    /// most recent detection pass.
    pub fn is_colliding(&self) -> bool {
        self.colliding
    }

    /// Mark the node as currently touching an obstacle. Called by the
    /// detectors; cleared by `clear_colliding` at the start of each step.
    pub fn mark_colliding(&mut self) {
        self.colliding = true;
    }

    /// Reset the colliding flag. Called once per step before detection.
    pub fn clear_colliding(&mut self) {
        self.colliding = false;
    }

    /// Add an instantaneous velocity change, e.g. gravity for one step:
    /// `v += g * dt`.
    pub fn apply_gravity(&mut self, gravity: Vec2<f64>, dt: f64) {
        if !self.fixed {
            self.vel += gravity * dt;
        }
    }

    /// Semi-implicit integrator position step; called exactly once per
    /// `Space::step` after all constraints/contacts have been resolved.
    ///
    /// Fixed nodes never move: velocity is forced to zero and position is
    /// left untouched. Otherwise the translation `dt * v` is clamped to
    /// `MAX_TRANSLATION` in magnitude before being applied, guarding against
    /// a single ill-conditioned substep blowing the node across the world.
    pub fn update_position(&mut self, dt: f64) {
        if self.fixed {
            self.vel = Vec2::zero();
            return;
        }

        let mut translation = self.vel * dt;
        let translation_squared = translation.magnitude_squared();
        if translation_squared > MAX_TRANSLATION_SQUARED {
            let scale = MAX_TRANSLATION / translation_squared.sqrt();
            translation *= scale;
            self.vel *= scale;
        }

        self.prev_pos = self.pos;
        self.pos += translation;
    }
}
