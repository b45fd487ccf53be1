//! A directed line segment with its tangent and outward normal precomputed.

use vek::Vec2;

use crate::consts::DEGENERATE_LENGTH_EPSILON;

/// A directed segment from `a` to `b`, caching the values every narrow-phase
/// check against it needs: length, unit tangent, and unit normal.
///
/// The normal is `tangent` rotated -90 degrees (clockwise), so orientation of
/// `a -> b` determines which side it points to. [`Triangle`](crate::shapes::triangle::Triangle)
/// constructs its three segments so each normal points outward; callers
/// building segments directly must maintain that themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    a: Vec2<f64>,
    b: Vec2<f64>,
    length: f64,
    tangent: Vec2<f64>,
    normal: Vec2<f64>,
}

impl Segment {
    /// Build a segment from `a` to `b`. Returns `None` if the two points
    /// coincide (within [`DEGENERATE_LENGTH_EPSILON`]), since no tangent or
    /// normal can be derived.
    pub fn new(a: Vec2<f64>, b: Vec2<f64>) -> Option<Self> {
        let delta = b - a;
        let length = delta.magnitude();
        if length < DEGENERATE_LENGTH_EPSILON {
            return None;
        }

        let tangent = delta / length;
        let normal = Vec2::new(tangent.y, -tangent.x);

        Some(Self {
            a,
            b,
            length,
            tangent,
            normal,
        })
    }

    /// Start point.
    pub fn a(&self) -> Vec2<f64> {
        self.a
    }

    /// End point.
    pub fn b(&self) -> Vec2<f64> {
        self.b
    }

    /// Segment length.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Unit vector from `a` to `b`.
    pub fn tangent(&self) -> Vec2<f64> {
        self.tangent
    }

    /// Unit vector perpendicular to the tangent.
    pub fn normal(&self) -> Vec2<f64> {
        self.normal
    }

    /// Flip the segment, swapping endpoints and negating tangent/normal.
    /// Used when a winding order needs correcting after construction.
    pub fn rotate(&self) -> Self {
        Self {
            a: self.b,
            b: self.a,
            length: self.length,
            tangent: -self.tangent,
            normal: -self.normal,
        }
    }

    /// Signed distance from `point` to the line through this segment, along
    /// the normal. Positive is on the side the normal points to.
    pub fn signed_distance(&self, point: Vec2<f64>) -> f64 {
        (point - self.a).dot(self.normal)
    }

}

#[cfg(test)]
mod tests {
    use vek::Vec2;

    use super::Segment;

    #[test]
    fn test_coincident_points_rejected() {
        let p = Vec2::new(1.0, 1.0);
        assert!(Segment::new(p, p).is_none());
    }

    #[test]
    fn test_normal_points_right_of_travel() {
        // a -> b travels along +x; normal should point along -y.
        let seg = Segment::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)).unwrap();
        assert!((seg.normal() - Vec2::new(0.0, -1.0)).magnitude() < 1e-12);
    }

    #[test]
    fn test_rotate_flips_normal() {
        let seg = Segment::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)).unwrap();
        let flipped = seg.rotate();
        assert!((flipped.normal() + seg.normal()).magnitude() < 1e-12);
        assert_eq!(flipped.a(), seg.b());
        assert_eq!(flipped.b(), seg.a());
    }
}
