//! Rect <-> node broad phase and contact manifold resolution.

use slotmap::SlotMap;
use vek::Vec2;

use super::spatial_hash::SpatialHash;
use crate::handle::{NodeKey, RectKey};
use crate::node::Node;
use crate::shapes::rect::Rect;

/// A rect <-> node contact manifold, live for exactly one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collision {
    rect: RectKey,
    node: NodeKey,
    /// `true` if the x-axis has the shallower penetration (resolve along x);
    /// `false` if y does.
    x_not_y_collision: bool,
    /// The contact was already separating at detection time; substeps are
    /// skipped.
    disabled: bool,
    /// Target normal velocity established at detection (0, or a bounce).
    bias: f64,
    diff_v_x: f64,
    diff_v_y: f64,
}

impl Collision {
    /// Build a manifold for `node` against `rect`, both already known to
    /// satisfy `rect.collides(node)`. Picks the axis of minimum
    /// penetration, projects the node onto that face (matching the
    /// triangle path's detection-time projection), and, if the node is
    /// separating on that axis already, marks the contact disabled.
    pub fn new(
        rect_key: RectKey,
        node_key: NodeKey,
        rect: &Rect,
        node: &mut Node,
        restitution_threshold: f64,
    ) -> Self {
        let pos = node.position();
        let pen_x = (pos.x - rect.x_left()).min(rect.x_right() - pos.x);
        let pen_y = (pos.y - rect.y_bottom()).min(rect.y_top() - pos.y);
        let x_not_y_collision = pen_x < pen_y;

        let vel = node.velocity();
        let (normal_velocity, separating, projected) = if x_not_y_collision {
            let to_right = pos.x > (rect.x_left() + rect.x_right()) / 2.0;
            let v = if to_right { vel.x } else { -vel.x };
            let x = if to_right { rect.x_right() } else { rect.x_left() };
            (v, v > 0.0, Vec2::new(x, pos.y))
        } else {
            let to_top = pos.y > (rect.y_bottom() + rect.y_top()) / 2.0;
            let v = if to_top { vel.y } else { -vel.y };
            let y = if to_top { rect.y_top() } else { rect.y_bottom() };
            (v, v > 0.0, Vec2::new(pos.x, y))
        };
        node.set_position(projected);

        let disabled = separating;
        let bias = if disabled {
            0.0
        } else if normal_velocity.abs() < restitution_threshold {
            0.0
        } else {
            -normal_velocity * rect.restitution()
        };

        Self {
            rect: rect_key,
            node: node_key,
            x_not_y_collision,
            disabled,
            bias,
            diff_v_x: 0.0,
            diff_v_y: 0.0,
        }
    }

    pub fn rect_key(&self) -> RectKey {
        self.rect
    }

    pub fn node_key(&self) -> NodeKey {
        self.node
    }

    /// One solver iteration: accumulates a friction delta bounded by the
    /// accumulated normal velocity delta seen so far (not the normal
    /// impulse - this mirrors the behavior actually exercised by the
    /// original engine's worked examples, not textbook Coulomb friction),
    /// then applies a normal impulse driving the node to the target
    /// (bias) velocity.
    pub fn substep(&mut self, rect: &Rect, node: &mut Node) {
        if self.disabled {
            return;
        }

        let vel = node.velocity();
        let friction = node.friction();

        if self.x_not_y_collision {
            let tangential = vel.y;
            let mut max_friction = friction * self.diff_v_x.abs();
            if tangential.abs() > 1.0 {
                max_friction *= 0.5;
            }
            let new_diff_v_y = (self.diff_v_y - tangential).clamp(-max_friction, max_friction);
            let delta_y = new_diff_v_y - self.diff_v_y;
            self.diff_v_y = new_diff_v_y;

            let pos = node.position();
            let to_right = pos.x > (rect.x_left() + rect.x_right()) / 2.0;
            let normal = vel.x;
            let target = if to_right { self.bias } else { -self.bias };
            let delta_x = target - normal;
            self.diff_v_x += delta_x;

            node.set_velocity(Vec2::new(vel.x + delta_x, vel.y + delta_y));
        } else {
            let tangential = vel.x;
            let mut max_friction = friction * self.diff_v_y.abs();
            if tangential.abs() > 1.0 {
                max_friction *= 0.5;
            }
            let new_diff_v_x = (self.diff_v_x - tangential).clamp(-max_friction, max_friction);
            let delta_x = new_diff_v_x - self.diff_v_x;
            self.diff_v_x = new_diff_v_x;

            let pos = node.position();
            let to_top = pos.y > (rect.y_bottom() + rect.y_top()) / 2.0;
            let normal = vel.y;
            let target = if to_top { self.bias } else { -self.bias };
            let delta_y = target - normal;
            self.diff_v_y += delta_y;

            node.set_velocity(Vec2::new(vel.x + delta_x, vel.y + delta_y));
        }
    }
}

/// Broad phase for rect obstacles: a spatial hash over `RectKey`s, queried
/// per node each step.
#[derive(Debug, Clone)]
pub struct CollisionDetector {
    hash: SpatialHash<RectKey>,
}

impl CollisionDetector {
    pub fn new(cell_size_x: f64, cell_size_y: f64) -> Self {
        Self {
            hash: SpatialHash::new(cell_size_x, cell_size_y),
        }
    }

    pub fn mark_dirty(&mut self) {
        self.hash.mark_dirty();
    }

    /// Rebuild manifolds for every node against every rect whose bin it
    /// falls into. Marks `node.mark_colliding()` for every node that
    /// produces a manifold (even a disabled one, matching "detection sets
    /// the colliding flag" in the orchestration description).
    pub fn detect(
        &mut self,
        rects: &SlotMap<RectKey, Rect>,
        nodes: &mut SlotMap<NodeKey, Node>,
        restitution_threshold: f64,
        out: &mut Vec<Collision>,
    ) {
        self.hash
            .prepare(rects.iter().map(|(key, rect)| (key, rect.aabb())));

        out.clear();
        for (node_key, node) in nodes.iter_mut() {
            let pos = node.position();
            for &rect_key in self.hash.query(pos.x, pos.y) {
                let rect = &rects[rect_key];
                if rect.collides(node) {
                    node.mark_colliding();
                    out.push(Collision::new(
                        rect_key,
                        node_key,
                        rect,
                        node,
                        restitution_threshold,
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;
    use vek::Vec2;

    use super::CollisionDetector;
    use crate::node::Node;
    use crate::shapes::rect::Rect;

    /// Scenario 4 from the worked examples: a node falling into a rect
    /// bounces once its normal speed exceeds the restitution threshold.
    #[test]
    fn test_rect_contact_bounce() {
        let mut rects = SlotMap::with_key();
        rects.insert(Rect::new(-1.0, 1.0, -1.0, 0.0, 0.5));

        let mut nodes = SlotMap::with_key();
        let node_key = nodes.insert(Node::new(Vec2::new(0.0, -0.01), 1.0, 0.0, false));
        nodes[node_key].set_velocity(Vec2::new(0.0, -5.0));

        let mut detector = CollisionDetector::new(2.0, 2.0);
        let mut collisions = Vec::new();
        detector.detect(&rects, &mut nodes, 0.1, &mut collisions);
        assert_eq!(collisions.len(), 1);

        // Detection projects the node onto the rect's top face.
        assert!((nodes[node_key].position().y - 0.0).abs() < 1e-9);

        for _ in 0..8 {
            collisions[0].substep(&rects[collisions[0].rect_key()], &mut nodes[node_key]);
        }

        assert!((nodes[node_key].velocity().y - 2.5).abs() < 1e-6);
    }

    /// Scenario 5: below the restitution threshold the contact suppresses
    /// bounce entirely and the node comes to rest.
    #[test]
    fn test_rect_contact_rest_below_threshold() {
        let mut rects = SlotMap::with_key();
        rects.insert(Rect::new(-1.0, 1.0, -1.0, 0.0, 0.5));

        let mut nodes = SlotMap::with_key();
        let node_key = nodes.insert(Node::new(Vec2::new(0.0, -0.01), 1.0, 0.0, false));
        nodes[node_key].set_velocity(Vec2::new(0.0, -0.05));

        let mut detector = CollisionDetector::new(2.0, 2.0);
        let mut collisions = Vec::new();
        detector.detect(&rects, &mut nodes, 0.1, &mut collisions);
        assert_eq!(collisions.len(), 1);

        for _ in 0..8 {
            collisions[0].substep(&rects[collisions[0].rect_key()], &mut nodes[node_key]);
        }

        assert!(nodes[node_key].velocity().y.abs() < 1e-6);
    }

    /// Friction must be bounded by the accumulated *normal-axis* velocity
    /// delta, not by its own (tangential-axis) delta. With the
    /// self-referential bug, a tangential delta bounded by itself starts
    /// and stays at zero every iteration, so friction never slows the
    /// sliding node at all.
    #[test]
    fn test_rect_contact_friction_bounded_by_normal_delta() {
        let mut rects = SlotMap::with_key();
        rects.insert(Rect::new(-1.0, 1.0, -1.0, 0.0, 0.5));

        let mut nodes = SlotMap::with_key();
        let node_key = nodes.insert(Node::new(Vec2::new(0.0, -0.01), 1.0, 0.5, false));
        nodes[node_key].set_velocity(Vec2::new(10.0, -5.0));

        let mut detector = CollisionDetector::new(2.0, 2.0);
        let mut collisions = Vec::new();
        detector.detect(&rects, &mut nodes, 0.1, &mut collisions);
        assert_eq!(collisions.len(), 1);

        for _ in 0..8 {
            collisions[0].substep(&rects[collisions[0].rect_key()], &mut nodes[node_key]);
        }

        assert!(
            nodes[node_key].velocity().x < 10.0,
            "friction should have slowed the tangential velocity, got {}",
            nodes[node_key].velocity().x
        );
    }
}
