//! Rigid distance constraint, solved as a soft (gamma-regularized)
//! sequential impulse with Baumgarte positional bias and warm-started
//! accumulated impulse.

use std::f64::consts::PI;

use vek::Vec2;

use super::direction_and_length;
use crate::node::Node;

/// A rigid-ish distance constraint between two nodes.
///
/// Unlike [`crate::constraint::spring::Spring`], a `Link` carries its
/// accumulated impulse (`lambda`) across steps (warm start) and derives a
/// soft-constraint `gamma` term from its stiffness and damping ratio rather
/// than resolving the distance error in one shot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    relax_length: f64,
    expand_factor: f64,
    stiffness: f64,
    damping_ratio: f64,
    actuated: bool,
    max_impulse: Option<f64>,

    /// Cached unit direction a -> b, refreshed every `prestep`.
    direction: Vec2<f64>,
    /// Effective inverse mass, including `gamma`.
    inv_mass_eff: f64,
    /// Effective mass, `1 / inv_mass_eff`.
    mass_eff: f64,
    gamma: f64,
    /// Baumgarte bias computed in `prestep`, consumed by every `substep`.
    bias: f64,
    /// Accumulated impulse, warm-started across steps.
    lambda: f64,
}

impl Link {
    /// Build a link from its two endpoints' current positions and inverse
    /// masses. `relax_length` is taken from the current distance between
    /// them; callers (`Space::add_link`) reject a degenerate (near-zero)
    /// starting distance before calling this.
    pub fn new(
        a_pos: Vec2<f64>,
        b_pos: Vec2<f64>,
        a_inv_mass: f64,
        b_inv_mass: f64,
        stiffness: f64,
        damping_ratio: f64,
        dt: f64,
        actuated: bool,
        max_impulse: Option<f64>,
    ) -> Self {
        let relax_length = (b_pos - a_pos).magnitude();

        let mut link = Self {
            relax_length,
            expand_factor: 1.0,
            stiffness,
            damping_ratio,
            actuated,
            max_impulse,
            direction: Vec2::unit_x(),
            inv_mass_eff: 0.0,
            mass_eff: 0.0,
            gamma: 0.0,
            bias: 0.0,
            lambda: 0.0,
        };
        link.update(a_inv_mass, b_inv_mass, dt);
        link
    }

    /// Recompute the derived solver coefficients (`gamma`, effective mass)
    /// and reset the warm-start impulse. Called whenever `dt`, `stiffness`,
    /// `damping_ratio`, or an endpoint's mass/fixed-ness changes.
    pub fn update(&mut self, a_inv_mass: f64, b_inv_mass: f64, dt: f64) {
        let inv_mass_sum = a_inv_mass + b_inv_mass;
        // Both endpoints fixed: the constraint is inactive; leave the
        // coefficients at their zeroed defaults rather than dividing by zero.
        if inv_mass_sum <= 0.0 {
            self.inv_mass_eff = 0.0;
            self.mass_eff = 0.0;
            self.gamma = 0.0;
            self.lambda = 0.0;
            return;
        }

        let mass = inv_mass_sum.recip();
        let omega = (self.stiffness * inv_mass_sum).sqrt();
        let _frequency = omega / (2.0 * PI);
        let damping_coeff = 2.0 * mass * self.damping_ratio * omega;

        self.gamma = 1.0 / (dt * (damping_coeff + dt * self.stiffness));
        self.inv_mass_eff = inv_mass_sum + self.gamma;
        self.mass_eff = self.inv_mass_eff.recip();
        self.lambda = 0.0;
    }

    /// Once per step, before the substep loop. Refreshes the cached
    /// direction/length, computes the Baumgarte bias, and applies the
    /// warm-started impulse from the previous step to both endpoints.
    ///
    /// Returns `false` if the endpoints currently coincide (degenerate);
    /// the caller should skip the substep loop for this constraint this
    /// step but must not drop the constraint itself.
    pub fn prestep(&mut self, a: &mut Node, b: &mut Node, dt: f64) -> bool {
        let Some((direction, length)) = direction_and_length(a.position(), b.position()) else {
            return false;
        };
        self.direction = direction;

        let target_length = self.expand_factor * self.relax_length;
        let error = length - target_length;
        self.bias = error * dt * self.stiffness * self.gamma;

        self.apply_impulse(a, b, self.lambda);
        true
    }

    /// One solver iteration. Computes the relative velocity along the
    /// cached direction, derives the impulse increment, clamps the
    /// accumulated impulse to `max_impulse` when set, and applies the delta
    /// actually admitted.
    pub fn substep(&mut self, a: &mut Node, b: &mut Node) -> f64 {
        let relative_velocity = self.direction.dot(b.velocity() - a.velocity());
        let delta_lambda = -self.mass_eff * (relative_velocity + self.bias + self.gamma * self.lambda);

        let new_lambda = self.lambda + delta_lambda;
        let clamped_lambda = match self.max_impulse {
            Some(cap) => new_lambda.clamp(-cap, cap),
            None => new_lambda,
        };
        let applied = clamped_lambda - self.lambda;
        self.lambda = clamped_lambda;

        self.apply_impulse(a, b, applied);
        applied
    }

    fn apply_impulse(&self, a: &mut Node, b: &mut Node, impulse: f64) {
        a.apply_velocity_delta(-self.direction * (impulse * a.inv_mass()));
        b.apply_velocity_delta(self.direction * (impulse * b.inv_mass()));
    }

    /// Accumulated impulse divided by the timestep, exposed for telemetry.
    pub fn force(&self, dt: f64) -> f64 {
        self.lambda / dt
    }

    /// Scale the rest length by `factor` (actuation "contracting" a link).
    pub fn contract(&mut self, factor: f64) {
        self.expand_factor = factor;
        self.actuated = true;
    }

    /// Reset to the natural rest length.
    pub fn relax(&mut self) {
        self.expand_factor = 1.0;
        self.actuated = false;
    }

    /// Rest length established at construction.
    pub fn relax_length(&self) -> f64 {
        self.relax_length
    }

    /// Current target-length multiplier.
    pub fn expand_factor(&self) -> f64 {
        self.expand_factor
    }

    /// Spring-like stiffness coefficient.
    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    /// Damping ratio.
    pub fn damping_ratio(&self) -> f64 {
        self.damping_ratio
    }

    /// Whether the link is currently actuated away from its natural length.
    pub fn is_actuated(&self) -> bool {
        self.actuated
    }

    /// Maximum magnitude the accumulated impulse may take, if capped.
    pub fn max_impulse(&self) -> Option<f64> {
        self.max_impulse
    }
}

#[cfg(test)]
mod tests {
    use vek::Vec2;

    use super::Link;
    use crate::node::Node;

    /// A link already at rest length, with both endpoints stationary and no
    /// external force, contributes no impulse and leaves positions fixed.
    #[test]
    fn test_rest_length_is_a_fixed_point() {
        let dt = 0.01;
        let mut a = Node::new(Vec2::new(0.0, 0.0), 1.0, 0.0, true);
        let mut b = Node::new(Vec2::new(1.0, 0.0), 1.0, 0.0, false);
        let mut link = Link::new(
            a.position(),
            b.position(),
            a.inv_mass(),
            b.inv_mass(),
            1e4,
            1.0,
            dt,
            false,
            None,
        );

        assert!(link.prestep(&mut a, &mut b, dt));
        for _ in 0..10 {
            link.substep(&mut a, &mut b);
        }

        assert!(b.velocity().magnitude() < 1e-9);
    }

    /// Degenerate (coincident) endpoints cause `prestep` to report no
    /// direction rather than panicking or dividing by zero.
    #[test]
    fn test_prestep_detects_degenerate_length() {
        let dt = 0.01;
        let mut a = Node::new(Vec2::new(3.0, 3.0), 1.0, 0.0, true);
        let mut b = Node::new(Vec2::new(1.0, 0.0), 1.0, 0.0, false);
        let mut link = Link::new(
            a.position(),
            b.position(),
            a.inv_mass(),
            b.inv_mass(),
            1e4,
            1.0,
            dt,
            false,
            None,
        );

        b.set_position(a.position());
        assert!(!link.prestep(&mut a, &mut b, dt));
    }

    /// `max_impulse` caps the accumulated impulse magnitude.
    #[test]
    fn test_max_impulse_clamps_accumulated_lambda() {
        let dt = 0.01;
        let mut a = Node::new(Vec2::new(0.0, 0.0), 1.0, 0.0, true);
        let mut b = Node::new(Vec2::new(5.0, 0.0), 1.0, 0.0, false);
        let mut link = Link::new(
            a.position(),
            b.position(),
            a.inv_mass(),
            b.inv_mass(),
            1e6,
            1.0,
            dt,
            false,
            Some(0.01),
        );
        // Stretch far past rest length to force a large impulse demand.
        b.set_position(Vec2::new(50.0, 0.0));

        link.prestep(&mut a, &mut b, dt);
        for _ in 0..20 {
            link.substep(&mut a, &mut b);
        }

        assert!(link.lambda.abs() <= 0.01 + 1e-9);
    }
}
