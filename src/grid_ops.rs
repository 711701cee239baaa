//! Operations over scalar grids: normalisation, box-blur smoothing and summary
//! statistics.

use rayon::prelude::*;
use tracing::debug;

use crate::grid::Grid;

/// Summary of a scalar grid, for diagnostics only.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GridStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

/// True/false tally of a boolean grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoolCounts {
    pub total: usize,
    pub true_count: usize,
    pub false_count: usize,
}

/// Global (min, max) of a grid, reduced in parallel over rows.
fn min_max(grid: &Grid<f32>) -> (f32, f32) {
    grid.as_slice()
        .par_iter()
        .fold(
            || (f32::MAX, f32::MIN),
            |(lo, hi), &v| (lo.min(v), hi.max(v)),
        )
        .reduce(
            || (f32::MAX, f32::MIN),
            |(a_lo, a_hi), (b_lo, b_hi)| (a_lo.min(b_lo), a_hi.max(b_hi)),
        )
}

/// Rescale a grid linearly so its minimum becomes 0.0 and its maximum 1.0.
///
/// A flat grid (min == max) has no range to stretch; it maps to all zeros.
pub fn normalize(grid: &Grid<f32>) -> Grid<f32> {
    if grid.is_empty() {
        return grid.clone();
    }

    let (min_val, max_val) = min_max(grid);
    let range = max_val - min_val;

    if range <= 0.0 || !range.is_finite() {
        debug!(min = min_val, max = max_val, "degenerate grid, normalising to zeros");
        return Grid::new_with(grid.width, grid.height, 0.0);
    }

    grid.map(|_, _, &v| (v - min_val) / range)
}

/// Apply `iterations` passes of a 3x3 mean filter to interior cells.
///
/// Border cells are never written. Every pass reads the previous pass's
/// snapshot, so the result does not depend on evaluation order.
pub fn smooth(grid: &mut Grid<f32>, iterations: usize) {
    let width = grid.width;
    let height = grid.height;
    if width < 3 || height < 3 {
        return;
    }

    for _ in 0..iterations {
        let snapshot = grid.clone();
        grid.par_rows_mut().for_each(|(y, row)| {
            if y == 0 || y == height - 1 {
                return;
            }
            for x in 1..width - 1 {
                let mut sum = 0.0f32;
                for sy in y - 1..=y + 1 {
                    for sx in x - 1..=x + 1 {
                        sum += *snapshot.get(sx, sy);
                    }
                }
                row[x] = sum / 9.0;
            }
        });
    }
}

/// Min, max and mean of a grid. An empty grid reports all zeros.
pub fn statistics(grid: &Grid<f32>) -> GridStats {
    if grid.is_empty() {
        return GridStats::default();
    }

    let (min, max) = min_max(grid);
    let sum: f64 = grid.as_slice().par_iter().map(|&v| v as f64).sum();

    GridStats {
        min,
        max,
        mean: (sum / grid.len() as f64) as f32,
    }
}

pub fn bool_counts(grid: &Grid<bool>) -> BoolCounts {
    let true_count = grid.as_slice().par_iter().filter(|&&v| v).count();
    BoolCounts {
        total: grid.len(),
        true_count,
        false_count: grid.len() - true_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: usize, height: usize) -> Grid<f32> {
        Grid::from_fn(width, height, |x, y| (x * 3 + y * 7) as f32 - 12.0)
    }

    #[test]
    fn test_normalize_hits_unit_range() {
        let normalized = normalize(&ramp(9, 6));
        let stats = statistics(&normalized);
        assert!((stats.min - 0.0).abs() < 1e-6);
        assert!((stats.max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_flat_grid_is_zeros() {
        let flat = Grid::new_with(5, 4, 0.42f32);
        let normalized = normalize(&flat);
        assert!(normalized.iter().all(|(_, _, &v)| v == 0.0));
    }

    #[test]
    fn test_normalize_preserves_order() {
        let grid = ramp(4, 4);
        let normalized = normalize(&grid);
        assert!(normalized.get(3, 3) > normalized.get(0, 0));
        assert!(normalized.get(1, 0) < normalized.get(0, 1));
    }

    #[test]
    fn test_smooth_leaves_border_untouched() {
        let mut grid = ramp(6, 5);
        let before = grid.clone();
        smooth(&mut grid, 3);

        for (x, y, &v) in grid.iter() {
            if x == 0 || y == 0 || x == 5 || y == 4 {
                assert_eq!(v, *before.get(x, y));
            }
        }
    }

    #[test]
    fn test_smooth_reads_previous_pass() {
        // A single spike in a 5x5 zero field: after one pass every cell in the
        // 3x3 block around it is exactly 1/9, which only holds with a snapshot.
        let mut grid = Grid::new_with(5, 5, 0.0f32);
        grid.set(2, 2, 9.0);
        smooth(&mut grid, 1);

        for y in 1..4 {
            for x in 1..4 {
                assert!((grid.get(x, y) - 1.0).abs() < 1e-6, "({}, {}) = {}", x, y, grid.get(x, y));
            }
        }
    }

    #[test]
    fn test_smooth_tiny_grids() {
        for (w, h) in [(1, 1), (2, 2), (2, 7), (7, 2)] {
            let mut grid = ramp(w, h);
            let before = grid.clone();
            smooth(&mut grid, 7);
            assert_eq!(grid, before);
        }
    }

    #[test]
    fn test_statistics() {
        let grid = Grid::from_fn(2, 2, |x, y| (x + 2 * y) as f32);
        let stats = statistics(&grid);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 3.0);
        assert!((stats.mean - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_bool_counts() {
        let grid = Grid::from_fn(4, 2, |x, _| x % 2 == 0);
        let counts = bool_counts(&grid);
        assert_eq!(counts.total, 8);
        assert_eq!(counts.true_count, 4);
        assert_eq!(counts.false_count, 4);
    }
}
