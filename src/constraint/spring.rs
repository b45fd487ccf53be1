//! Explicit damped harmonic oscillator between two nodes.
//!
//! Shares the direction/length helper with [`crate::constraint::link::Link`]
//! but does not warm-start across steps and carries no gamma regularization
//! — it resolves to a target velocity in one shot each substep instead.

use vek::Vec2;

use super::direction_and_length;
use crate::node::Node;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    relax_length: f64,
    expand_factor: f64,
    stiffness: f64,
    damping_ratio: f64,
    actuated: bool,
    max_impulse: Option<f64>,

    direction: Vec2<f64>,
    mass_eff: f64,
    damping_coeff: f64,
    bias: f64,
    /// Impulse applied this step, reset every `prestep`. Exposed the same
    /// way `Link::force` exposes its warm-started impulse.
    lambda: f64,
    /// Running substep velocity along the tangent, used to integrate the
    /// viscous drag term across the substep loop.
    substep_velocity: f64,
}

impl Spring {
    pub fn new(
        a_pos: Vec2<f64>,
        b_pos: Vec2<f64>,
        a_inv_mass: f64,
        b_inv_mass: f64,
        stiffness: f64,
        damping_ratio: f64,
        actuated: bool,
        max_impulse: Option<f64>,
    ) -> Self {
        let relax_length = (b_pos - a_pos).magnitude();

        let mut spring = Self {
            relax_length,
            expand_factor: 1.0,
            stiffness,
            damping_ratio,
            actuated,
            max_impulse,
            direction: Vec2::unit_x(),
            mass_eff: 0.0,
            damping_coeff: 0.0,
            bias: 0.0,
            lambda: 0.0,
            substep_velocity: 0.0,
        };
        spring.update(a_inv_mass, b_inv_mass);
        spring
    }

    /// Recompute effective mass and damping coefficient. Called whenever
    /// `stiffness`, `damping_ratio`, or an endpoint's mass/fixed-ness
    /// changes.
    pub fn update(&mut self, a_inv_mass: f64, b_inv_mass: f64) {
        let inv_mass_sum = a_inv_mass + b_inv_mass;
        if inv_mass_sum <= 0.0 {
            self.mass_eff = 0.0;
            self.damping_coeff = 0.0;
            return;
        }

        let mass = inv_mass_sum.recip();
        let omega = (self.stiffness * inv_mass_sum).sqrt();
        self.mass_eff = mass;
        self.damping_coeff = 2.0 * mass * self.damping_ratio * omega;
    }

    /// Once per step. Refreshes direction/length, seeds the impulse from
    /// the positional error, and applies it immediately.
    ///
    /// Returns `false` on a degenerate (coincident) pair of endpoints.
    pub fn prestep(&mut self, a: &mut Node, b: &mut Node, dt: f64) -> bool {
        let Some((direction, length)) = direction_and_length(a.position(), b.position()) else {
            return false;
        };
        self.direction = direction;
        self.substep_velocity = 0.0;

        let target_length = self.expand_factor * self.relax_length;
        self.bias = (target_length - length) * self.stiffness * dt;

        let clamped = self.clamp_to_max_impulse(self.bias);
        self.lambda = clamped;

        self.apply_impulse(a, b, self.lambda);
        true
    }

    /// One solver iteration: integrates the viscous drag term and applies
    /// it as an incremental impulse, clamping the running total (not just
    /// the increment) to `max_impulse` when set.
    pub fn substep(&mut self, a: &mut Node, b: &mut Node, dt: f64) -> f64 {
        let relative_velocity = self.direction.dot(b.velocity() - a.velocity());
        let drag = dt * self.damping_coeff * (self.substep_velocity - relative_velocity);
        self.substep_velocity = relative_velocity + drag;

        let clamped = self.clamp_to_max_impulse(self.lambda + drag);
        let applied = clamped - self.lambda;
        self.lambda = clamped;

        self.apply_impulse(a, b, applied);
        applied
    }

    fn clamp_to_max_impulse(&self, value: f64) -> f64 {
        match self.max_impulse {
            Some(cap) => value.clamp(-cap, cap),
            None => value,
        }
    }

    fn apply_impulse(&self, a: &mut Node, b: &mut Node, impulse: f64) {
        a.apply_velocity_delta(-self.direction * (impulse * a.inv_mass()));
        b.apply_velocity_delta(self.direction * (impulse * b.inv_mass()));
    }

    /// Total impulse applied this step divided by `dt`, exposed for
    /// telemetry the same way `Link::force` is.
    pub fn force(&self, dt: f64) -> f64 {
        self.lambda / dt
    }

    pub fn contract(&mut self, factor: f64) {
        self.expand_factor = factor;
        self.actuated = true;
    }

    pub fn relax(&mut self) {
        self.expand_factor = 1.0;
        self.actuated = false;
    }

    pub fn relax_length(&self) -> f64 {
        self.relax_length
    }

    pub fn expand_factor(&self) -> f64 {
        self.expand_factor
    }

    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    pub fn damping_ratio(&self) -> f64 {
        self.damping_ratio
    }

    pub fn is_actuated(&self) -> bool {
        self.actuated
    }

    /// Maximum magnitude this step's accumulated impulse may take, if capped.
    pub fn max_impulse(&self) -> Option<f64> {
        self.max_impulse
    }
}

#[cfg(test)]
mod tests {
    use vek::Vec2;

    use super::Spring;
    use crate::node::Node;

    /// A spring held at rest length produces no restoring force.
    #[test]
    fn test_rest_length_produces_no_bias() {
        let mut a = Node::new(Vec2::new(0.0, 0.0), 1.0, 0.0, true);
        let mut b = Node::new(Vec2::new(2.0, 0.0), 1.0, 0.0, false);
        let mut spring = Spring::new(a.position(), b.position(), a.inv_mass(), b.inv_mass(), 50.0, 0.3, false, None);

        spring.prestep(&mut a, &mut b, 0.01);
        assert!(spring.lambda.abs() < 1e-9);
    }

    /// Stretching the spring beyond rest length pulls the free endpoint
    /// back toward the fixed one over many steps.
    #[test]
    fn test_stretched_spring_restores_toward_rest_length() {
        let dt = 0.01;
        let mut a = Node::new(Vec2::new(0.0, 0.0), 1.0, 0.0, true);
        let mut b = Node::new(Vec2::new(5.0, 0.0), 1.0, 0.0, false);
        let mut spring = Spring::new(a.position(), b.position(), a.inv_mass(), b.inv_mass(), 50.0, 0.5, false, None);
        // Re-seed as if rest length were 2 so the spring is stretched.
        spring.relax_length = 2.0;

        for _ in 0..500 {
            spring.prestep(&mut a, &mut b, dt);
            for _ in 0..8 {
                spring.substep(&mut a, &mut b, dt);
            }
            a.update_position(dt);
            b.update_position(dt);
        }

        assert!(b.position().x < 5.0);
    }

    /// `max_impulse` caps the impulse applied in a single step, including
    /// the drag accumulated across the substep loop.
    #[test]
    fn test_max_impulse_clamps_accumulated_lambda() {
        let dt = 0.01;
        let mut a = Node::new(Vec2::new(0.0, 0.0), 1.0, 0.0, true);
        let mut b = Node::new(Vec2::new(5.0, 0.0), 1.0, 0.0, false);
        let mut spring =
            Spring::new(a.position(), b.position(), a.inv_mass(), b.inv_mass(), 1e6, 0.5, false, Some(0.01));
        spring.relax_length = 2.0;

        spring.prestep(&mut a, &mut b, dt);
        for _ in 0..8 {
            spring.substep(&mut a, &mut b, dt);
        }

        assert!(spring.lambda.abs() <= 0.01 + 1e-9);
    }
}
