//! Hydrology: rivers traced down the elevation field and lakes in low basins.
//!
//! Rivers are traced one at a time on a single thread. Each river owns a
//! ChaCha stream seeded from the river seed plus its index, so the result does
//! not depend on how many workers the rest of the pipeline uses.

pub mod lakes;
pub mod rivers;

pub use lakes::{mark_lakes, LakeParams, LakePolicy};
pub use rivers::{find_source, smooth_flow, RiverStats};

use rivers::trace_river;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, WorldGenError};
use crate::grid::Grid;

/// Parameters for river tracing and lake marking
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrologyParams {
    /// Number of rivers to attempt
    pub river_count: usize,
    /// Minimum (normalised) elevation for a river source
    pub source_min_elevation: f32,
    /// Random cells sampled per river before giving up on a source
    pub max_source_attempts: usize,
    /// Shortest path budget a river can start with
    pub min_length: u32,
    /// Longest path budget a river can start with (inclusive)
    pub max_length: u32,
    /// Margin kept between the water level and the current cell
    pub water_epsilon: f32,
    /// Water level rise when a river is stuck in a pit
    pub water_raise: f32,
    /// Deepest branch nesting allowed
    pub max_branch_depth: u32,
    /// Hard cap on trace steps per river, branches included
    pub max_steps_per_river: usize,
    pub lakes: LakeParams,
}

impl Default for HydrologyParams {
    fn default() -> Self {
        Self {
            river_count: 10,
            source_min_elevation: 0.7,
            max_source_attempts: 10_000,
            min_length: 500,
            max_length: 800,
            water_epsilon: 0.01,
            water_raise: 0.01,
            max_branch_depth: 8,
            max_steps_per_river: 100_000,
            lakes: LakeParams::default(),
        }
    }
}

impl HydrologyParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_length > self.max_length {
            return Err(WorldGenError::InvalidConfig(format!(
                "hydrology: min_length {} exceeds max_length {}",
                self.min_length, self.max_length
            )));
        }
        if !(self.water_raise > 0.0 && self.water_raise.is_finite()) {
            return Err(WorldGenError::InvalidConfig(
                "hydrology: water_raise must be finite and positive".to_string(),
            ));
        }
        if !(self.water_epsilon >= 0.0 && self.water_epsilon.is_finite()) {
            return Err(WorldGenError::InvalidConfig(
                "hydrology: water_epsilon must be finite and non-negative".to_string(),
            ));
        }
        self.lakes.validate()
    }
}

/// River flow and lake masks produced by `simulate`.
#[derive(Clone, Debug)]
pub struct Hydrology {
    /// Smoothed accumulated flow (0 = no river)
    pub rivers: Grid<f32>,
    pub lakes: Grid<bool>,
    pub stats: RiverStats,
}

/// Trace every river serially, smooth the flow field, then mark lakes.
///
/// Fails with `InvalidConfig` when `params` does not validate.
pub fn simulate(
    elevation: &Grid<f32>,
    temperature: &Grid<f32>,
    rainfall: &Grid<f32>,
    params: &HydrologyParams,
    river_seed: u64,
) -> Result<Hydrology> {
    params.validate()?;

    let mut flow = Grid::new_with(elevation.width, elevation.height, 0.0f32);
    let mut stats = RiverStats::default();

    for river in 0..params.river_count {
        let mut rng = ChaCha8Rng::seed_from_u64(river_seed.wrapping_add(river as u64));

        let Some((sx, sy)) = find_source(elevation, params, &mut rng) else {
            warn!(
                river,
                threshold = params.source_min_elevation,
                attempts = params.max_source_attempts,
                "no river source found, skipping river"
            );
            stats.rivers_skipped += 1;
            continue;
        };

        let traced = trace_river(elevation, &mut flow, (sx, sy), params, &mut rng);
        debug!(river, x = sx, y = sy, steps = traced.steps, branches = traced.branches, "traced river");
        stats.absorb(&traced);
        stats.rivers_traced += 1;
    }

    let rivers = smooth_flow(&flow);
    let lakes = mark_lakes(elevation, temperature, rainfall, &params.lakes);

    Ok(Hydrology { rivers, lakes, stats })
}
