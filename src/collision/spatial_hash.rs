//! Uniform spatial hash shared by the rect and triangle broad phases.
//!
//! Divides the world into cells and drops an obstacle key into every cell
//! its AABB touches, generalized to dynamically sized bins (rather than a
//! fixed const-generic bucket array) since obstacle extents and counts
//! aren't known at compile time here.

use smallvec::SmallVec;

use crate::consts::AUTO_CELL_SIZE_MULTIPLIER;
use crate::shapes::Aabb;

/// How many obstacle keys a single bin can hold inline before spilling to
/// the heap. Typical obstacle density per cell is low; this just avoids an
/// allocation in the common case.
const BIN_INLINE_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy)]
struct Bounds {
    origin_x: f64,
    origin_y: f64,
    cell_size_x: f64,
    cell_size_y: f64,
    n_bins_x: i64,
    n_bins_y: i64,
}

/// A uniform grid over 2D space mapping obstacle keys to the bins their
/// AABB overlaps.
///
/// Built lazily: `mark_dirty` (called by `Space::add_rect`/`add_triangle`)
/// invalidates the current bins, and the next `query` triggers a rebuild via
/// `prepare`.
#[derive(Debug, Clone)]
pub struct SpatialHash<K> {
    requested_cell_size_x: f64,
    requested_cell_size_y: f64,
    bounds: Option<Bounds>,
    bins: Vec<SmallVec<[K; BIN_INLINE_CAPACITY]>>,
    dirty: bool,
}

impl<K: Copy> SpatialHash<K> {
    /// `cell_size_x`/`cell_size_y` <= 0 means "auto-size at first `prepare`
    /// to 3x the mean obstacle extent in that dimension".
    pub fn new(cell_size_x: f64, cell_size_y: f64) -> Self {
        Self {
            requested_cell_size_x: cell_size_x,
            requested_cell_size_y: cell_size_y,
            bounds: None,
            bins: Vec::new(),
            dirty: true,
        }
    }

    /// Invalidate the current bins; the next `prepare` call rebuilds from
    /// scratch. Called whenever an obstacle is added.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Rebuild the bins from `obstacles` if dirty; a no-op otherwise.
    pub fn prepare(&mut self, obstacles: impl Iterator<Item = (K, Aabb)> + Clone) {
        if !self.dirty {
            return;
        }

        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        let mut extent_x_sum = 0.0;
        let mut extent_y_sum = 0.0;
        let mut count = 0usize;

        for (_, aabb) in obstacles.clone() {
            min_x = min_x.min(aabb.x_min);
            max_x = max_x.max(aabb.x_max);
            min_y = min_y.min(aabb.y_min);
            max_y = max_y.max(aabb.y_max);
            extent_x_sum += aabb.x_max - aabb.x_min;
            extent_y_sum += aabb.y_max - aabb.y_min;
            count += 1;
        }

        if count == 0 {
            self.bounds = None;
            self.bins.clear();
            self.dirty = false;
            return;
        }

        let cell_size_x = if self.requested_cell_size_x > 0.0 {
            self.requested_cell_size_x
        } else {
            AUTO_CELL_SIZE_MULTIPLIER * (extent_x_sum / count as f64)
        };
        let cell_size_y = if self.requested_cell_size_y > 0.0 {
            self.requested_cell_size_y
        } else {
            AUTO_CELL_SIZE_MULTIPLIER * (extent_y_sum / count as f64)
        };

        let origin_x = (min_x / cell_size_x).floor() * cell_size_x;
        let origin_y = (min_y / cell_size_y).floor() * cell_size_y;
        let n_bins_x = ((max_x / cell_size_x).floor() - (min_x / cell_size_x).floor()) as i64 + 1;
        let n_bins_y = ((max_y / cell_size_y).floor() - (min_y / cell_size_y).floor()) as i64 + 1;

        let bounds = Bounds {
            origin_x,
            origin_y,
            cell_size_x,
            cell_size_y,
            n_bins_x,
            n_bins_y,
        };

        let mut bins = vec![SmallVec::new(); (n_bins_x * n_bins_y).max(0) as usize];
        for (key, aabb) in obstacles {
            let (bin_min_x, bin_min_y) = bounds.cell_of(aabb.x_min, aabb.y_min);
            let (bin_max_x, bin_max_y) = bounds.cell_of(aabb.x_max, aabb.y_max);

            for by in bin_min_y..=bin_max_y {
                for bx in bin_min_x..=bin_max_x {
                    if let Some(index) = bounds.index(bx, by) {
                        bins[index].push(key);
                    }
                }
            }
        }

        self.bounds = Some(bounds);
        self.bins = bins;
        self.dirty = false;
    }

    /// The obstacle keys registered in the bin covering `(x, y)`, or an
    /// empty slice if the point falls outside the grid entirely (no
    /// registered obstacle can touch it).
    pub fn query(&self, x: f64, y: f64) -> &[K] {
        let Some(bounds) = &self.bounds else {
            return &[];
        };

        let (bx, by) = bounds.cell_of(x, y);
        match bounds.index(bx, by) {
            Some(index) => &self.bins[index],
            None => &[],
        }
    }
}

impl Bounds {
    fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
        (
            ((x - self.origin_x) / self.cell_size_x).floor() as i64,
            ((y - self.origin_y) / self.cell_size_y).floor() as i64,
        )
    }

    fn index(&self, bx: i64, by: i64) -> Option<usize> {
        if bx < 0 || by < 0 || bx >= self.n_bins_x || by >= self.n_bins_y {
            return None;
        }
        Some((by * self.n_bins_x + bx) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::SpatialHash;
    use crate::shapes::Aabb;

    fn aabb(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Aabb {
        Aabb { x_min, x_max, y_min, y_max }
    }

    #[test]
    fn test_query_outside_grid_is_empty() {
        let mut hash: SpatialHash<u32> = SpatialHash::new(1.0, 1.0);
        hash.prepare(std::iter::once((0u32, aabb(0.0, 1.0, 0.0, 1.0))));

        assert!(hash.query(100.0, 100.0).is_empty());
    }

    #[test]
    fn test_obstacle_spanning_multiple_cells_is_found_from_either() {
        let mut hash: SpatialHash<u32> = SpatialHash::new(1.0, 1.0);
        hash.prepare(std::iter::once((7u32, aabb(0.0, 2.5, 0.0, 0.5))));

        assert_eq!(hash.query(0.2, 0.2), &[7]);
        assert_eq!(hash.query(2.2, 0.2), &[7]);
    }

    #[test]
    fn test_dirty_rebuild_picks_up_new_obstacles() {
        let mut hash: SpatialHash<u32> = SpatialHash::new(1.0, 1.0);
        hash.prepare(std::iter::once((1u32, aabb(0.0, 1.0, 0.0, 1.0))));
        assert!(hash.query(5.5, 5.5).is_empty());

        hash.mark_dirty();
        hash.prepare(
            [(1u32, aabb(0.0, 1.0, 0.0, 1.0)), (2u32, aabb(5.0, 6.0, 5.0, 6.0))].into_iter(),
        );
        assert_eq!(hash.query(5.5, 5.5), &[2]);
    }

    #[test]
    fn test_auto_sized_cells_use_mean_obstacle_extent() {
        let mut hash: SpatialHash<u32> = SpatialHash::new(0.0, 0.0);
        hash.prepare(std::iter::once((1u32, aabb(0.0, 2.0, 0.0, 2.0))));

        // Mean extent is 2.0, so cell size auto-sizes to 6.0; a point just
        // inside the obstacle's own bin should still resolve.
        assert_eq!(hash.query(1.0, 1.0), &[1]);
    }
}
