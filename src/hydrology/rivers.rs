//! Greedy river tracing with overflow pooling and branching.
//!
//! A river walks downhill from a high source. When every neighbour sits above
//! the local water level the river pools: the level rises and the budget shrinks
//! until something downhill appears. After each move, lower untouched neighbours
//! spawn branches with half the remaining budget.
//!
//! Branches are handled with an explicit stack of walkers instead of recursion.
//! A walker with pending branch candidates is suspended while the branch on top
//! of it runs to completion, which gives the same depth-first order as a
//! recursive trace with bounded stack use.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::grid::{Grid, NEIGHBORS_8};
use crate::hydrology::HydrologyParams;

/// Counters from tracing one or more rivers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RiverStats {
    pub rivers_traced: usize,
    pub rivers_skipped: usize,
    /// Cells visited, pooling retries included
    pub steps: usize,
    pub branches: usize,
    /// Rivers cut short by the per-river step cap
    pub truncated: usize,
}

impl RiverStats {
    pub fn absorb(&mut self, other: &RiverStats) {
        self.steps += other.steps;
        self.branches += other.branches;
        self.truncated += other.truncated;
    }
}

/// One active trace: the trunk or a branch.
struct Walker {
    x: usize,
    y: usize,
    water_level: f32,
    budget: u32,
    depth: u32,
    /// Neighbours still to be considered as branch starts, in shuffled order
    pending: VecDeque<(usize, usize)>,
    /// Budget handed to each branch spawned from `pending`
    branch_budget: u32,
}

impl Walker {
    fn new(elevation: &Grid<f32>, x: usize, y: usize, budget: u32, depth: u32, epsilon: f32) -> Self {
        Self {
            x,
            y,
            water_level: *elevation.get(x, y) + epsilon,
            budget,
            depth,
            pending: VecDeque::new(),
            branch_budget: 0,
        }
    }
}

/// Sample random cells until one sits at or above the source threshold.
/// Gives up after `max_source_attempts` samples.
pub fn find_source<R: Rng>(
    elevation: &Grid<f32>,
    params: &HydrologyParams,
    rng: &mut R,
) -> Option<(usize, usize)> {
    if elevation.is_empty() {
        return None;
    }
    for _ in 0..params.max_source_attempts {
        let x = rng.gen_range(0..elevation.width);
        let y = rng.gen_range(0..elevation.height);
        if *elevation.get(x, y) >= params.source_min_elevation {
            return Some((x, y));
        }
    }
    None
}

/// In-bounds neighbours in random order.
fn shuffled_neighbors<R: Rng>(elevation: &Grid<f32>, x: usize, y: usize, rng: &mut R) -> Vec<(usize, usize, f32)> {
    let mut dirs = NEIGHBORS_8;
    dirs.shuffle(rng);
    dirs.iter()
        .filter_map(|&(dx, dy)| {
            let nx = x as i64 + dx as i64;
            let ny = y as i64 + dy as i64;
            elevation.in_bounds(nx, ny).then(|| {
                let diagonal = dx != 0 && dy != 0;
                let distance = if diagonal { std::f32::consts::SQRT_2 } else { 1.0 };
                (nx as usize, ny as usize, distance)
            })
        })
        .collect()
}

/// Pick the lowest neighbour below the water level.
///
/// Equal elevations are settled by the steeper drop per unit distance, so a
/// diagonal step only wins when it is genuinely steeper. Remaining ties go to
/// the first candidate in shuffled order.
fn lowest_neighbor<R: Rng>(
    elevation: &Grid<f32>,
    x: usize,
    y: usize,
    water_level: f32,
    rng: &mut R,
) -> Option<(usize, usize)> {
    let here = *elevation.get(x, y);
    let mut best: Option<(usize, usize, f32, f32)> = None;

    for (nx, ny, distance) in shuffled_neighbors(elevation, x, y, rng) {
        let h = *elevation.get(nx, ny);
        if h >= water_level {
            continue;
        }
        let slope = (here - h) / distance;
        let better = match best {
            None => true,
            Some((_, _, best_h, best_slope)) => h < best_h || (h == best_h && slope > best_slope),
        };
        if better {
            best = Some((nx, ny, h, slope));
        }
    }

    best.map(|(nx, ny, _, _)| (nx, ny))
}

/// Trace a river and all of its branches from `source`, adding to `flow`.
/// `params` must already be validated.
pub(crate) fn trace_river<R: Rng>(
    elevation: &Grid<f32>,
    flow: &mut Grid<f32>,
    source: (usize, usize),
    params: &HydrologyParams,
    rng: &mut R,
) -> RiverStats {
    let mut stats = RiverStats::default();
    let length = rng.gen_range(params.min_length..=params.max_length);

    let mut stack = vec![Walker::new(elevation, source.0, source.1, length, 0, params.water_epsilon)];

    while let Some(walker) = stack.last_mut() {
        if stats.steps >= params.max_steps_per_river {
            debug!(steps = stats.steps, "river hit step cap");
            stats.truncated += 1;
            break;
        }

        // Suspended on branch candidates: start the next qualifying one.
        if let Some((bx, by)) = walker.pending.pop_front() {
            let qualifies = *elevation.get(bx, by) < walker.water_level && *flow.get(bx, by) == 0.0;
            if qualifies && walker.branch_budget > 0 && walker.depth < params.max_branch_depth {
                let branch = Walker::new(
                    elevation,
                    bx,
                    by,
                    walker.branch_budget,
                    walker.depth + 1,
                    params.water_epsilon,
                );
                stack.push(branch);
                stats.branches += 1;
            }
            continue;
        }

        if walker.budget == 0 {
            stack.pop();
            continue;
        }

        *flow.get_mut(walker.x, walker.y) += 1.0;
        stats.steps += 1;

        match lowest_neighbor(elevation, walker.x, walker.y, walker.water_level, rng) {
            None => {
                // Pool: raise the water until something is downhill
                walker.water_level += params.water_raise;
                walker.budget -= 1;
            }
            Some((nx, ny)) => {
                walker.x = nx;
                walker.y = ny;
                walker.water_level = walker.water_level.max(*elevation.get(nx, ny) + params.water_epsilon);
                walker.budget -= 1;

                walker.branch_budget = walker.budget / 2;
                if walker.branch_budget > 0 {
                    walker.pending = shuffled_neighbors(elevation, nx, ny, rng)
                        .into_iter()
                        .map(|(bx, by, _)| (bx, by))
                        .collect();
                }
            }
        }
    }

    stats
}

/// Blend each river cell with its in-bounds neighbours.
///
/// Only cells with positive flow change; dry cells stay exactly zero so the
/// river mask does not bleed onto the banks.
pub fn smooth_flow(flow: &Grid<f32>) -> Grid<f32> {
    flow.map(|x, y, &f| {
        if f <= 0.0 {
            return f;
        }
        let mut sum = f;
        let mut count = 1.0f32;
        for (nx, ny) in flow.neighbors_8(x, y) {
            sum += *flow.get(nx, ny);
            count += 1.0;
        }
        sum / count
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn slope_right(width: usize, height: usize) -> Grid<f32> {
        Grid::from_fn(width, height, |x, _| 1.0 - x as f32 / (width - 1) as f32)
    }

    fn diagonal_slope() -> Grid<f32> {
        Grid::from_fn(20, 20, |x, y| 1.0 - (x + y) as f32 / 38.0)
    }

    #[test]
    fn test_find_source_respects_threshold() {
        let elevation = slope_right(10, 4);
        let params = HydrologyParams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let (x, y) = find_source(&elevation, &params, &mut rng).expect("slope has high cells");
        assert!(*elevation.get(x, y) >= params.source_min_elevation);
    }

    #[test]
    fn test_find_source_gives_up() {
        let low = Grid::new_with(6, 6, 0.2f32);
        let params = HydrologyParams { max_source_attempts: 100, ..Default::default() };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(find_source(&low, &params, &mut rng), None);
    }

    #[test]
    fn test_river_runs_downhill() {
        let elevation = slope_right(12, 1);
        let mut flow = Grid::new_with(12, 1, 0.0f32);
        let params = HydrologyParams { min_length: 11, max_length: 11, ..Default::default() };
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        trace_river(&elevation, &mut flow, (0, 0), &params, &mut rng);

        // A strictly descending 1-row strip is walked cell by cell
        for x in 0..11 {
            assert!(*flow.get(x, 0) >= 1.0, "cell {} not visited", x);
        }
    }

    #[test]
    fn test_pit_pools_without_moving() {
        // A single low cell surrounded by higher ground: the river fills the pit
        let mut elevation = Grid::new_with(3, 3, 0.9f32);
        elevation.set(1, 1, 0.1);
        let mut flow = Grid::new_with(3, 3, 0.0f32);
        let params = HydrologyParams { min_length: 5, max_length: 5, ..Default::default() };
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let stats = trace_river(&elevation, &mut flow, (1, 1), &params, &mut rng);
        assert_eq!(stats.steps, 5);
        assert_eq!(*flow.get(1, 1), 5.0);
    }

    #[test]
    fn test_orthogonal_preferred_on_equal_elevation() {
        let mut elevation = Grid::new_with(3, 3, 0.9f32);
        elevation.set(1, 1, 0.8);
        elevation.set(2, 1, 0.5);
        elevation.set(2, 2, 0.5);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        for _ in 0..20 {
            let next = lowest_neighbor(&elevation, 1, 1, 0.81, &mut rng);
            assert_eq!(next, Some((2, 1)));
        }
    }

    #[test]
    fn test_branches_spawn_on_slope() {
        let elevation = diagonal_slope();
        let params = HydrologyParams { min_length: 200, max_length: 200, ..Default::default() };
        let mut flow = Grid::new_with(20, 20, 0.0f32);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let stats = trace_river(&elevation, &mut flow, (0, 0), &params, &mut rng);
        assert!(stats.branches > 0);
        // The trunk alone spends exactly its budget
        assert!(stats.steps > 200);
        assert_eq!(stats.truncated, 0);
    }

    #[test]
    fn test_branch_gets_half_remaining_budget() {
        let elevation = diagonal_slope();
        let params = HydrologyParams { min_length: 4, max_length: 4, ..Default::default() };
        let mut flow = Grid::new_with(20, 20, 0.0f32);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let stats = trace_river(&elevation, &mut flow, (0, 0), &params, &mut rng);

        // Trunk budget 4 leaves 3 and 2 after its first moves, so every
        // branch gets 1 and stops after a single step.
        assert!(stats.branches > 0);
        assert_eq!(stats.steps, 4 + stats.branches);
    }

    #[test]
    fn test_branches_start_only_on_dry_cells_below_water() {
        let mut elevation = diagonal_slope();
        // Next to the trunk's first move but above its water level
        elevation.set(2, 0, 2.0);
        let params = HydrologyParams { min_length: 4, max_length: 4, ..Default::default() };
        let mut flow = Grid::new_with(20, 20, 0.0f32);
        // Next to the trunk's first move but already wet
        flow.set(0, 2, 5.0);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let stats = trace_river(&elevation, &mut flow, (0, 0), &params, &mut rng);

        assert!(stats.branches > 0);
        assert_eq!(*flow.get(2, 0), 0.0);
        assert_eq!(*flow.get(0, 2), 5.0);
        // Trunk runs straight down the diagonal
        for i in 0..4 {
            assert!(*flow.get(i, i) >= 1.0);
        }
    }

    #[test]
    fn test_branch_depth_cap() {
        let elevation = diagonal_slope();
        let params = HydrologyParams { min_length: 200, max_length: 200, max_branch_depth: 0, ..Default::default() };
        let mut flow = Grid::new_with(20, 20, 0.0f32);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let stats = trace_river(&elevation, &mut flow, (0, 0), &params, &mut rng);
        assert_eq!(stats.branches, 0);
    }

    #[test]
    fn test_step_cap_bounds_work() {
        let elevation = Grid::from_fn(30, 30, |x, y| ((x * 7 + y * 13) % 11) as f32 / 10.0);
        let params = HydrologyParams { min_length: 800, max_length: 800, max_steps_per_river: 50, ..Default::default() };
        let mut flow = Grid::new_with(30, 30, 0.0f32);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let stats = trace_river(&elevation, &mut flow, (15, 15), &params, &mut rng);
        assert_eq!(stats.steps, 50);
        assert_eq!(stats.truncated, 1);
    }

    #[test]
    fn test_smooth_flow_keeps_dry_cells() {
        let mut flow = Grid::new_with(4, 4, 0.0f32);
        flow.set(0, 0, 4.0);
        flow.set(1, 1, 2.0);

        let smoothed = smooth_flow(&flow);
        // (0, 0) has 3 neighbours: (4 + 0 + 0 + 2) / 4
        assert!((smoothed.get(0, 0) - 1.5).abs() < 1e-6);
        assert_eq!(*smoothed.get(3, 3), 0.0);
        assert_eq!(*smoothed.get(1, 0), 0.0);
    }
}
