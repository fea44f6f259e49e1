use std::collections::HashMap;

use glam::DVec2;

use crate::map::geometry::Bounds;

/// Spatial index over scene elements using conservative approximation.
/// Each element's bounding box is indexed into every cell it overlaps,
/// guaranteeing no false negatives while allowing false positives
/// (eliminated by the exact hit test afterwards).
#[derive(Clone, Debug, Default)]
pub struct FeatureGrid {
    cells: HashMap<(i32, i32), Vec<usize>>,
    cell_size: f64,
}

impl FeatureGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            cell_size,
        }
    }

    #[inline(always)]
    fn to_cell(&self, p: DVec2) -> (i32, i32) {
        let x = (p.x / self.cell_size).floor() as i32;
        let y = (p.y / self.cell_size).floor() as i32;
        (x, y)
    }

    /// Build from element bounds; `slot` is whatever the caller uses to
    /// find the element again
    pub fn build(bounds: impl Iterator<Item = (usize, Bounds)>, cell_size: f64) -> Self {
        let mut grid = Self::new(cell_size);
        for (slot, b) in bounds {
            let min_cell = grid.to_cell(b.min);
            let max_cell = grid.to_cell(b.max);
            for y in min_cell.1..=max_cell.1 {
                for x in min_cell.0..=max_cell.0 {
                    grid.cells.entry((x, y)).or_default().push(slot);
                }
            }
        }
        grid
    }

    /// Slots whose bounds may lie within `radius` of `p`, highest first,
    /// without duplicates
    pub fn query_point(&self, p: DVec2, radius: f64) -> Vec<usize> {
        let min_cell = self.to_cell(p - DVec2::splat(radius));
        let max_cell = self.to_cell(p + DVec2::splat(radius));
        let mut results = Vec::new();
        for y in min_cell.1..=max_cell.1 {
            for x in min_cell.0..=max_cell.0 {
                if let Some(slots) = self.cells.get(&(x, y)) {
                    results.extend_from_slice(slots);
                }
            }
        }
        results.sort_unstable_by(|a, b| b.cmp(a));
        results.dedup();
        results
    }
}
