//! Triangle <-> node broad phase and contact manifold resolution.

use slotmap::SlotMap;

use super::spatial_hash::SpatialHash;
use crate::handle::{NodeKey, TriangleKey};
use crate::node::Node;
use crate::segment::Segment;
use crate::shapes::triangle::Triangle;

/// A triangle <-> node contact manifold, live for exactly one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    triangle: TriangleKey,
    node: NodeKey,
    segment_index: usize,
    restitution: f64,
    /// Target normal velocity, latched at `prepare` from the
    /// detection-time normal velocity times restitution.
    bias: f64,
    diff_vn: f64,
    diff_vt: f64,
}

impl Contact {
    /// Construct a manifold from an already-computed narrow-phase hit. The
    /// caller is responsible for having already projected the node's
    /// position onto `segment_index` before this runs, matching "the node
    /// is moved to the nearer segment at detection time".
    pub fn new(triangle_key: TriangleKey, node_key: NodeKey, segment_index: usize, restitution: f64) -> Self {
        Self {
            triangle: triangle_key,
            node: node_key,
            segment_index,
            restitution,
            bias: 0.0,
            diff_vn: 0.0,
            diff_vt: 0.0,
        }
    }

    pub fn triangle_key(&self) -> TriangleKey {
        self.triangle
    }

    pub fn node_key(&self) -> NodeKey {
        self.node
    }

    /// Which of the triangle's three segments this contact resolves
    /// against.
    pub fn segment_index(&self) -> usize {
        self.segment_index
    }

    /// Latch the detection-time restitution bias from the node's velocity
    /// decomposed against `segment`. Called once, between detection and
    /// the first substep iteration.
    pub fn prepare(&mut self, segment: &Segment, node: &Node) {
        let v_n = node.velocity().dot(segment.normal());
        self.bias = v_n * self.restitution;
    }

    /// One solver iteration. Decomposes the node's velocity onto the
    /// segment's tangent/normal basis, applies a friction delta bounded by
    /// the accumulated normal velocity delta so far, then applies a
    /// restitution delta along the normal toward `bias`.
    pub fn substep(&mut self, segment: &Segment, node: &mut Node) {
        let vel = node.velocity();
        let tangent = segment.tangent();
        let normal = segment.normal();

        let v_t = vel.dot(tangent);
        let v_n = vel.dot(normal);

        let friction = node.friction();
        let mut max_friction = friction * self.diff_vn.abs();
        if v_t.abs() > 1.0 {
            max_friction *= 0.5;
        }
        let new_diff_vt = (self.diff_vt - v_t).clamp(-max_friction, max_friction);
        let delta_vt = new_diff_vt - self.diff_vt;
        self.diff_vt = new_diff_vt;

        let new_diff_vn = self.diff_vn - v_n - self.bias;
        let delta_vn = new_diff_vn - self.diff_vn;
        self.diff_vn = new_diff_vn;

        node.set_velocity(vel + tangent * delta_vt + normal * delta_vn);
    }
}

/// Broad phase for triangle obstacles.
///
/// A thin wrapper around the same [`SpatialHash`] the rect detector uses,
/// parameterized over `TriangleKey` instead of `RectKey`: the build/query
/// algorithm is identical, only the obstacle key type and narrow-phase test
/// differ.
#[derive(Debug, Clone)]
pub struct TriangleCollisionDetector {
    hash: SpatialHash<TriangleKey>,
}

impl TriangleCollisionDetector {
    pub fn new(cell_size_x: f64, cell_size_y: f64) -> Self {
        Self {
            hash: SpatialHash::new(cell_size_x, cell_size_y),
        }
    }

    pub fn mark_dirty(&mut self) {
        self.hash.mark_dirty();
    }

    /// Rebuild manifolds for every node against every triangle whose bin it
    /// falls into. A resolved hit immediately projects the node's position
    /// onto the chosen segment and latches the restitution bias via
    /// [`Contact::prepare`].
    pub fn detect(
        &mut self,
        triangles: &SlotMap<TriangleKey, Triangle>,
        nodes: &mut SlotMap<NodeKey, Node>,
        out: &mut Vec<Contact>,
    ) {
        self.hash
            .prepare(triangles.iter().map(|(key, triangle)| (key, triangle.aabb())));

        out.clear();
        for (node_key, node) in nodes.iter_mut() {
            let pos = node.position();
            for &triangle_key in self.hash.query(pos.x, pos.y) {
                let triangle = &triangles[triangle_key];
                if let Some(hit) = triangle.collides(node) {
                    node.mark_colliding();
                    node.set_position(hit.projected_position);

                    let mut contact = Contact::new(
                        triangle_key,
                        node_key,
                        hit.segment_index,
                        triangle.restitution(),
                    );
                    contact.prepare(&triangle.segments()[hit.segment_index], node);
                    out.push(contact);
                }
            }
        }
    }
}
