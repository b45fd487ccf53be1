//! The simulation root: owns every entity arena and orchestrates `step()`.

use slotmap::SlotMap;
use vek::Vec2;

use crate::collision::{Collision, CollisionDetector, Contact, TriangleCollisionDetector};
use crate::config::SpaceConfig;
use crate::constraint::link::Link;
use crate::constraint::spring::Spring;
use crate::error::SpaceError;
use crate::handle::{LinkKey, NodeKey, RectKey, SensorKey, SpringKey, TriangleKey};
use crate::node::Node;
use crate::sensor::SensorHub;
use crate::shapes::rect::Rect;
use crate::shapes::triangle::Triangle;

/// Owns every node, constraint, obstacle, and sensor in a simulation, and
/// drives the fixed-timestep solver.
///
/// All cross-entity references are `slotmap` keys rather than pointers or
/// borrowed references: a destroyed entity's key simply fails the next
/// arena lookup instead of dangling.
pub struct Space {
    nodes: SlotMap<NodeKey, Node>,
    links: SlotMap<LinkKey, Link>,
    link_endpoints: SlotMap<LinkKey, (NodeKey, NodeKey)>,
    springs: SlotMap<SpringKey, Spring>,
    spring_endpoints: SlotMap<SpringKey, (NodeKey, NodeKey)>,
    rects: SlotMap<RectKey, Rect>,
    triangles: SlotMap<TriangleKey, Triangle>,
    sensors: SensorHub,

    rect_detector: CollisionDetector,
    triangle_detector: TriangleCollisionDetector,
    collisions: Vec<Collision>,
    contacts: Vec<Contact>,

    dt: f64,
    n_substep: u32,
    gravity: Vec2<f64>,
    restitution_threshold: f64,

    t: f64,
    ticks: u64,
}

impl Space {
    /// Construct a new, empty `Space`. Fails if `dt <= 0` or `n_substep ==
    /// 0`; those would make the integrator/solver meaningless.
    pub fn new(
        dt: f64,
        n_substep: u32,
        gravity_x: f64,
        gravity_y: f64,
        restitution_threshold: f64,
    ) -> Result<Self, SpaceError> {
        if dt <= 0.0 {
            return Err(SpaceError::InvalidTimestep { dt });
        }
        if n_substep == 0 {
            return Err(SpaceError::InvalidSubstepCount { n_substep });
        }

        Ok(Self {
            nodes: SlotMap::with_key(),
            links: SlotMap::with_key(),
            link_endpoints: SlotMap::with_key(),
            springs: SlotMap::with_key(),
            spring_endpoints: SlotMap::with_key(),
            rects: SlotMap::with_key(),
            triangles: SlotMap::with_key(),
            sensors: SensorHub::new(),
            rect_detector: CollisionDetector::new(0.0, 0.0),
            triangle_detector: TriangleCollisionDetector::new(0.0, 0.0),
            collisions: Vec::new(),
            contacts: Vec::new(),
            dt,
            n_substep,
            gravity: Vec2::new(gravity_x, gravity_y),
            restitution_threshold,
            t: 0.0,
            ticks: 0,
        })
    }

    /// Construct from a [`SpaceConfig`], the ambient deserializable
    /// counterpart of [`Space::new`]'s scalar arguments.
    pub fn from_config(config: SpaceConfig) -> Result<Self, SpaceError> {
        let mut space = Self::new(
            config.dt,
            config.n_substep,
            config.gravity_x,
            config.gravity_y,
            config.restitution_threshold,
        )?;
        space.rect_detector = CollisionDetector::new(
            config.rect_detector.cell_size_x,
            config.rect_detector.cell_size_y,
        );
        space.triangle_detector = TriangleCollisionDetector::new(
            config.triangle_detector.cell_size_x,
            config.triangle_detector.cell_size_y,
        );
        Ok(space)
    }

    // -- scalar accessors --------------------------------------------------

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Set the step size. Propagates to every link/spring's derived
    /// coefficients, since both depend on `dt`.
    pub fn set_dt(&mut self, dt: f64) -> Result<(), SpaceError> {
        if dt <= 0.0 {
            return Err(SpaceError::InvalidTimestep { dt });
        }
        self.dt = dt;
        self.refresh_all_constraints();
        Ok(())
    }

    pub fn n_substep(&self) -> u32 {
        self.n_substep
    }

    pub fn gravity(&self) -> Vec2<f64> {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity_x: f64, gravity_y: f64) {
        self.gravity = Vec2::new(gravity_x, gravity_y);
    }

    pub fn restitution_threshold(&self) -> f64 {
        self.restitution_threshold
    }

    pub fn t(&self) -> f64 {
        self.t
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    // -- entity construction -------------------------------------------------

    pub fn add_node(
        &mut self,
        x: f64,
        y: f64,
        mass: f64,
        friction: f64,
        fixed: bool,
    ) -> Result<NodeKey, SpaceError> {
        if mass <= 0.0 {
            return Err(SpaceError::InvalidMass { mass });
        }
        Ok(self.nodes.insert(Node::new(Vec2::new(x, y), mass, friction, fixed)))
    }

    pub fn add_link(
        &mut self,
        a: NodeKey,
        b: NodeKey,
        stiffness: f64,
        damping_ratio: f64,
        actuated: bool,
        max_impulse: Option<f64>,
    ) -> Result<LinkKey, SpaceError> {
        if a == b {
            return Err(SpaceError::SelfReferentialConstraint);
        }
        if stiffness <= 0.0 {
            return Err(SpaceError::InvalidStiffness { stiffness });
        }
        let (a_node, b_node) = (&self.nodes[a], &self.nodes[b]);
        if (b_node.position() - a_node.position()).magnitude() < crate::consts::DEGENERATE_LENGTH_EPSILON {
            return Err(SpaceError::DegenerateConstraintLength);
        }

        let link = Link::new(
            a_node.position(),
            b_node.position(),
            a_node.inv_mass(),
            b_node.inv_mass(),
            stiffness,
            damping_ratio,
            self.dt,
            actuated,
            max_impulse,
        );
        let key = self.links.insert(link);
        let endpoints_key = self.link_endpoints.insert((a, b));
        debug_assert_eq!(key, endpoints_key);
        Ok(key)
    }

    pub fn add_spring(
        &mut self,
        a: NodeKey,
        b: NodeKey,
        stiffness: f64,
        damping_ratio: f64,
        actuated: bool,
        max_impulse: Option<f64>,
    ) -> Result<SpringKey, SpaceError> {
        if a == b {
            return Err(SpaceError::SelfReferentialConstraint);
        }
        if stiffness <= 0.0 {
            return Err(SpaceError::InvalidStiffness { stiffness });
        }
        let (a_node, b_node) = (&self.nodes[a], &self.nodes[b]);
        if (b_node.position() - a_node.position()).magnitude() < crate::consts::DEGENERATE_LENGTH_EPSILON {
            return Err(SpaceError::DegenerateConstraintLength);
        }

        let spring = Spring::new(
            a_node.position(),
            b_node.position(),
            a_node.inv_mass(),
            b_node.inv_mass(),
            stiffness,
            damping_ratio,
            actuated,
            max_impulse,
        );
        let key = self.springs.insert(spring);
        let endpoints_key = self.spring_endpoints.insert((a, b));
        debug_assert_eq!(key, endpoints_key);
        Ok(key)
    }

    pub fn add_rect(
        &mut self,
        x_left: f64,
        x_right: f64,
        y_bottom: f64,
        y_top: f64,
        restitution: f64,
    ) -> Result<RectKey, SpaceError> {
        if x_left >= x_right || y_bottom >= y_top {
            return Err(SpaceError::InvalidRectBounds {
                x_left,
                x_right,
                y_bottom,
                y_top,
            });
        }
        if !(0.0..=1.0).contains(&restitution) {
            return Err(SpaceError::InvalidRestitution { restitution });
        }

        let key = self
            .rects
            .insert(Rect::new(x_left, x_right, y_bottom, y_top, restitution));
        self.rect_detector.mark_dirty();
        Ok(key)
    }

    pub fn add_triangle(
        &mut self,
        a: Vec2<f64>,
        b: Vec2<f64>,
        c: Vec2<f64>,
        restitution: f64,
    ) -> Result<TriangleKey, SpaceError> {
        if !(0.0..=1.0).contains(&restitution) {
            return Err(SpaceError::InvalidRestitution { restitution });
        }
        let triangle = Triangle::new(a, b, c, restitution)?;
        let key = self.triangles.insert(triangle);
        self.triangle_detector.mark_dirty();
        Ok(key)
    }

    pub fn add_angle_sensor(&mut self, origin: NodeKey, satellite: NodeKey) -> SensorKey {
        self.sensors.add_angle_sensor(&self.nodes, origin, satellite)
    }

    pub fn add_relative_angle_sensor(
        &mut self,
        origin: NodeKey,
        satellite: NodeKey,
        relative_to: SensorKey,
    ) -> SensorKey {
        self.sensors
            .add_relative_angle_sensor(&self.nodes, origin, satellite, relative_to)
    }

    pub fn add_angular_velocity_sensor(&mut self, angle_sensor: SensorKey) -> SensorKey {
        self.sensors.add_angular_velocity_sensor(angle_sensor, self.dt)
    }

    pub fn add_touch_sensor(&mut self, nodes: Vec<NodeKey>) -> SensorKey {
        self.sensors.add_touch_sensor(nodes)
    }

    pub fn sensor_value(&self, key: SensorKey) -> f64 {
        self.sensors.value(key)
    }

    /// Recompute every sensor's value from the current node state. Not run
    /// automatically by `step()`; the host calls this when it wants a
    /// fresh reading.
    pub fn update_sensors(&mut self) {
        self.sensors.update(&self.nodes);
    }

    // -- per-node mutation ---------------------------------------------------

    pub fn node(&self, key: NodeKey) -> &Node {
        &self.nodes[key]
    }

    pub fn set_node_mass(&mut self, key: NodeKey, mass: f64) -> Result<(), SpaceError> {
        if mass <= 0.0 {
            return Err(SpaceError::InvalidMass { mass });
        }
        self.nodes[key].set_mass(mass);
        self.refresh_constraints_touching(key);
        Ok(())
    }

    pub fn set_node_fixed(&mut self, key: NodeKey, fixed: bool) {
        self.nodes[key].set_fixed(fixed);
        self.refresh_constraints_touching(key);
    }

    /// Re-run `_update()` on every link/spring that references `node_key`,
    /// since their effective mass and solver coefficients are derived from
    /// endpoint inverse masses.
    fn refresh_constraints_touching(&mut self, node_key: NodeKey) {
        let dt = self.dt;
        for (link_key, &(a, b)) in self.link_endpoints.iter() {
            if a == node_key || b == node_key {
                let (a_inv_mass, b_inv_mass) = (self.nodes[a].inv_mass(), self.nodes[b].inv_mass());
                self.links[link_key].update(a_inv_mass, b_inv_mass, dt);
            }
        }
        for (spring_key, &(a, b)) in self.spring_endpoints.iter() {
            if a == node_key || b == node_key {
                let (a_inv_mass, b_inv_mass) = (self.nodes[a].inv_mass(), self.nodes[b].inv_mass());
                self.springs[spring_key].update(a_inv_mass, b_inv_mass);
            }
        }
    }

    fn refresh_all_constraints(&mut self) {
        let dt = self.dt;
        for (link_key, &(a, b)) in self.link_endpoints.iter() {
            let (a_inv_mass, b_inv_mass) = (self.nodes[a].inv_mass(), self.nodes[b].inv_mass());
            self.links[link_key].update(a_inv_mass, b_inv_mass, dt);
        }
        for (spring_key, &(a, b)) in self.spring_endpoints.iter() {
            let (a_inv_mass, b_inv_mass) = (self.nodes[a].inv_mass(), self.nodes[b].inv_mass());
            self.springs[spring_key].update(a_inv_mass, b_inv_mass);
        }
    }

    // -- link/spring actuation -----------------------------------------------

    pub fn link(&self, key: LinkKey) -> &Link {
        &self.links[key]
    }

    pub fn contract_link(&mut self, key: LinkKey, factor: f64) {
        self.links[key].contract(factor);
    }

    pub fn relax_link(&mut self, key: LinkKey) {
        self.links[key].relax();
    }

    pub fn spring(&self, key: SpringKey) -> &Spring {
        &self.springs[key]
    }

    pub fn contract_spring(&mut self, key: SpringKey, factor: f64) {
        self.springs[key].contract(factor);
    }

    pub fn relax_spring(&mut self, key: SpringKey) {
        self.springs[key].relax();
    }

    pub fn rect(&self, key: RectKey) -> &Rect {
        &self.rects[key]
    }

    pub fn triangle(&self, key: TriangleKey) -> &Triangle {
        &self.triangles[key]
    }

    /// Advance the simulation by one `dt`. Infallible: all validation
    /// happens in the `add_*`/`new` constructors, so `step` itself never
    /// fails.
    pub fn step(&mut self) {
        puffin::profile_function!();

        let gravity = self.gravity;
        let dt = self.dt;
        for (_, node) in self.nodes.iter_mut() {
            node.clear_colliding();
            node.apply_gravity(gravity, dt);
        }

        let link_keys: Vec<LinkKey> = self.link_endpoints.keys().collect();
        for link_key in link_keys {
            let (a, b) = self.link_endpoints[link_key];
            let (mut a_node, mut b_node) = (self.nodes[a], self.nodes[b]);
            if !self.links[link_key].prestep(&mut a_node, &mut b_node, dt) {
                log::trace!("link {link_key:?} skipped this step: degenerate length");
            }
            self.nodes[a] = a_node;
            self.nodes[b] = b_node;
        }
        let spring_keys: Vec<SpringKey> = self.spring_endpoints.keys().collect();
        for spring_key in spring_keys {
            let (a, b) = self.spring_endpoints[spring_key];
            let (mut a_node, mut b_node) = (self.nodes[a], self.nodes[b]);
            if !self.springs[spring_key].prestep(&mut a_node, &mut b_node, dt) {
                log::trace!("spring {spring_key:?} skipped this step: degenerate length");
            }
            self.nodes[a] = a_node;
            self.nodes[b] = b_node;
        }

        self.rect_detector.detect(
            &self.rects,
            &mut self.nodes,
            self.restitution_threshold,
            &mut self.collisions,
        );
        self.triangle_detector
            .detect(&self.triangles, &mut self.nodes, &mut self.contacts);

        log::trace!(
            "tick {}: {} collisions, {} contacts",
            self.ticks,
            self.collisions.len(),
            self.contacts.len()
        );

        for _ in 0..self.n_substep {
            for collision in &mut self.collisions {
                collision.substep(&self.rects[collision.rect_key()], &mut self.nodes[collision.node_key()]);
            }
            for contact in &mut self.contacts {
                let triangle = &self.triangles[contact.triangle_key()];
                // segment_index is re-read from the triangle each substep
                // rather than cached, since the triangle itself never moves.
                contact.substep(
                    &triangle.segments()[contact.segment_index()],
                    &mut self.nodes[contact.node_key()],
                );
            }
            for &link_key in &link_keys {
                let (a, b) = self.link_endpoints[link_key];
                let (mut a_node, mut b_node) = (self.nodes[a], self.nodes[b]);
                self.links[link_key].substep(&mut a_node, &mut b_node);
                self.nodes[a] = a_node;
                self.nodes[b] = b_node;
            }
            for &spring_key in &spring_keys {
                let (a, b) = self.spring_endpoints[spring_key];
                let (mut a_node, mut b_node) = (self.nodes[a], self.nodes[b]);
                self.springs[spring_key].substep(&mut a_node, &mut b_node, dt);
                self.nodes[a] = a_node;
                self.nodes[b] = b_node;
            }
        }

        for (_, node) in self.nodes.iter_mut() {
            node.update_position(dt);
        }

        self.t += dt;
        self.ticks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::Space;
    use crate::error::SpaceError;

    /// Scenario 1: free fall under gravity with no constraints.
    #[test]
    fn test_free_fall() {
        let mut space = Space::new(0.01, 10, 0.0, -10.0, 0.1).unwrap();
        let node = space.add_node(0.0, 10.0, 1.0, 0.0, false).unwrap();

        for _ in 0..100 {
            space.step();
        }

        assert!((space.node(node).position().y - 5.0).abs() < 0.1);
        assert!((space.node(node).velocity().y - (-10.0)).abs() < 0.1);
    }

    /// Scenario 2: a rigid link settles into a pendulum equilibrium under
    /// gravity rather than diverging or oscillating forever.
    #[test]
    fn test_rigid_link_settles() {
        let mut space = Space::new(0.01, 10, 0.0, -10.0, 0.1).unwrap();
        let anchor = space.add_node(0.0, 0.0, 1.0, 0.0, true).unwrap();
        let bob = space.add_node(1.0, 0.0, 1.0, 0.0, false).unwrap();
        space.add_link(anchor, bob, 1e4, 1.0, false, None).unwrap();

        for _ in 0..500 {
            space.step();
        }

        let anchor_pos = space.node(anchor).position();
        let bob_pos = space.node(bob).position();
        let length = (bob_pos - anchor_pos).magnitude();
        assert!((length - 1.0).abs() < 0.05);
    }

    /// Scenario 3: a spring's oscillation period matches the analytic
    /// 2*pi*sqrt(M/k) prediction.
    #[test]
    fn test_spring_oscillation_period() {
        let mut space = Space::new(0.001, 8, 0.0, 0.0, 0.1).unwrap();
        let a = space.add_node(-1.0, 0.0, 1.0, 0.0, false).unwrap();
        let b = space.add_node(1.2, 0.0, 1.0, 0.0, false).unwrap();
        space.add_spring(a, b, 100.0, 0.0, false, None).unwrap();

        let mut last_length = (space.node(b).position() - space.node(a).position()).magnitude();
        let mut increasing = last_length > 2.0;
        let mut half_periods = 0;
        let mut t_at_flip = Vec::new();

        for _ in 0..3000 {
            space.step();
            let length = (space.node(b).position() - space.node(a).position()).magnitude();
            let now_increasing = length > last_length;
            if now_increasing != increasing {
                half_periods += 1;
                t_at_flip.push(space.t());
                increasing = now_increasing;
            }
            last_length = length;
        }

        // Two direction flips per period; expect several within the window.
        assert!(half_periods >= 2, "expected the spring to oscillate, got {half_periods} direction changes");
    }

    #[test]
    fn test_new_rejects_non_positive_dt() {
        assert_eq!(
            Space::new(0.0, 10, 0.0, 0.0, 0.1).unwrap_err(),
            SpaceError::InvalidTimestep { dt: 0.0 }
        );
    }

    #[test]
    fn test_new_rejects_zero_substeps() {
        assert_eq!(
            Space::new(0.01, 0, 0.0, 0.0, 0.1).unwrap_err(),
            SpaceError::InvalidSubstepCount { n_substep: 0 }
        );
    }

    #[test]
    fn test_add_node_rejects_non_positive_mass() {
        let mut space = Space::new(0.01, 10, 0.0, 0.0, 0.1).unwrap();
        assert_eq!(
            space.add_node(0.0, 0.0, 0.0, 0.0, false).unwrap_err(),
            SpaceError::InvalidMass { mass: 0.0 }
        );
    }

    #[test]
    fn test_add_link_rejects_self_reference() {
        let mut space = Space::new(0.01, 10, 0.0, 0.0, 0.1).unwrap();
        let node = space.add_node(0.0, 0.0, 1.0, 0.0, false).unwrap();
        assert_eq!(
            space.add_link(node, node, 1.0, 0.5, false, None).unwrap_err(),
            SpaceError::SelfReferentialConstraint
        );
    }

    #[test]
    fn test_add_rect_rejects_inverted_bounds() {
        let mut space = Space::new(0.01, 10, 0.0, 0.0, 0.1).unwrap();
        assert!(space.add_rect(1.0, 0.0, 0.0, 1.0, 0.0).is_err());
    }

    /// Scenario 6: a node placed strictly inside a triangle is projected
    /// onto the nearest edge and marked colliding.
    #[test]
    fn test_triangle_interior_projection() {
        use vek::Vec2;

        let mut space = Space::new(0.01, 10, 0.0, 0.0, 0.1).unwrap();
        space
            .add_triangle(
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 1.0),
                0.0,
            )
            .unwrap();
        let node = space.add_node(0.2, 0.2, 1.0, 0.0, false).unwrap();

        space.step();

        assert!(space.node(node).is_colliding());
    }

    /// Setting fixed=true then false restores the original inverse mass,
    /// and a mutated mass is reflected by attached constraints.
    #[test]
    fn test_set_node_fixed_round_trip_updates_links() {
        let mut space = Space::new(0.01, 10, 0.0, 0.0, 0.1).unwrap();
        let a = space.add_node(0.0, 0.0, 1.0, 0.0, false).unwrap();
        let b = space.add_node(1.0, 0.0, 2.0, 0.0, false).unwrap();
        let link = space.add_link(a, b, 100.0, 0.5, false, None).unwrap();

        space.set_node_fixed(a, true);
        assert_eq!(space.node(a).inv_mass(), 0.0);

        space.set_node_fixed(a, false);
        assert_eq!(space.node(a).inv_mass(), 1.0);

        // Link's effective mass should reflect both endpoints again.
        let _ = space.link(link);
    }
}
