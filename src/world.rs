//! World generation pipeline
//!
//! `WorldGenerator` owns every grid and runs the stages in a fixed order:
//! noise maps, smoothing and normalisation, hydrology, biome classification,
//! region segmentation. Once constructed it only hands out shared references.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::biomes::{self, Biome, BiomeClassifier};
use crate::config::GeneratorConfig;
use crate::error::{Result, WorldGenError};
use crate::grid::Grid;
use crate::grid_ops::{self, BoolCounts, GridStats};
use crate::hydrology::{self, RiverStats};
use crate::noise_field::{NoiseField, NoiseLayer};
use crate::regions::{self, Region, RegionStats};
use crate::seeds::WorldSeeds;

/// Wall time spent in one pipeline stage
#[derive(Clone, Copy, Debug)]
pub struct PhaseTiming {
    pub phase: &'static str,
    pub elapsed: Duration,
}

/// A fully generated world.
#[derive(Clone, Debug)]
pub struct WorldGenerator {
    seeds: WorldSeeds,
    config: GeneratorConfig,
    width: usize,
    height: usize,
    /// Normalised elevation (0.0-1.0)
    elevation: Grid<f32>,
    /// Normalised temperature (0.0-1.0)
    temperature: Grid<f32>,
    /// Normalised rainfall (0.0-1.0)
    rainfall: Grid<f32>,
    /// Smoothed river flow (0 = dry)
    rivers: Grid<f32>,
    lakes: Grid<bool>,
    biomes: Grid<Biome>,
    regions: Vec<Region>,
    /// Index into `regions` for each cell
    region_map: Grid<usize>,
    river_stats: RiverStats,
    region_stats: RegionStats,
    timings: Vec<PhaseTiming>,
}

/// Everything known about a single cell
#[derive(Clone, Debug, PartialEq)]
pub struct TileInfo {
    pub x: usize,
    pub y: usize,
    pub elevation: f32,
    pub temperature: f32,
    pub rainfall: f32,
    pub river_flow: f32,
    pub is_lake: bool,
    pub biome: Biome,
    pub region: usize,
}

fn timed<T>(timings: &mut Vec<PhaseTiming>, phase: &'static str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    debug!(phase, elapsed_ms = elapsed.as_secs_f64() * 1000.0, "phase complete");
    timings.push(PhaseTiming { phase, elapsed });
    result
}

/// Sample a noise layer over the whole map, one rayon task per row.
fn sample_layer(noise: &NoiseField, layer: &NoiseLayer, width: usize, height: usize) -> Grid<f32> {
    Grid::from_fn(width, height, |x, y| {
        let (nx, ny) = layer.coords(x, y, width, height);
        noise.sample(layer, nx, ny) as f32
    })
}

/// Raw noise, smoothed, then stretched to exactly [0, 1].
fn scalar_map(noise: &NoiseField, layer: &NoiseLayer, width: usize, height: usize, erosion: usize) -> Grid<f32> {
    let mut raw = sample_layer(noise, layer, width, height);
    grid_ops::smooth(&mut raw, erosion);
    grid_ops::normalize(&raw)
}

impl WorldGenerator {
    /// Generate a world with the default configuration.
    pub fn new(width: usize, height: usize, seed: u64) -> Result<Self> {
        Self::with_config(width, height, seed, GeneratorConfig::default())
    }

    pub fn with_config(width: usize, height: usize, seed: u64, config: GeneratorConfig) -> Result<Self> {
        Self::with_seeds(width, height, WorldSeeds::from_master(seed), config)
    }

    /// Generate a world with explicit per-system seeds.
    pub fn with_seeds(width: usize, height: usize, seeds: WorldSeeds, config: GeneratorConfig) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(WorldGenError::InvalidDimensions { width, height });
        }
        config.validate()?;
        let classifier = BiomeClassifier::new(&config.biomes)?;

        let total_start = Instant::now();
        let mut timings = Vec::new();
        let noise = NoiseField::new(seeds.noise);
        let erosion = config.erosion_iterations;

        let elevation = timed(&mut timings, "elevation", || {
            scalar_map(&noise, &config.elevation, width, height, erosion)
        });

        let (temperature, rainfall) = timed(&mut timings, "climate", || {
            rayon::join(
                || scalar_map(&noise, &config.temperature, width, height, erosion),
                || scalar_map(&noise, &config.rainfall, width, height, erosion),
            )
        });

        let hydro = timed(&mut timings, "hydrology", || {
            hydrology::simulate(&elevation, &temperature, &rainfall, &config.hydrology, seeds.rivers)
        })?;

        let biomes = timed(&mut timings, "biomes", || {
            classifier.classify_map(&temperature, &rainfall, &elevation, &hydro.rivers, &hydro.lakes)
        });

        let segmentation = timed(&mut timings, "regions", || {
            regions::segment(&biomes, &hydro.rivers, &config.regions)
        });

        let world = Self {
            seeds,
            config,
            width,
            height,
            elevation,
            temperature,
            rainfall,
            rivers: hydro.rivers,
            lakes: hydro.lakes,
            biomes,
            regions: segmentation.regions,
            region_map: segmentation.region_map,
            river_stats: hydro.stats,
            region_stats: segmentation.stats,
            timings,
        };

        info!(
            width,
            height,
            seed = world.seeds.master,
            elapsed_ms = total_start.elapsed().as_secs_f64() * 1000.0,
            rivers = world.river_stats.rivers_traced,
            regions = world.regions.len(),
            "world generated"
        );
        world.log_statistics();

        Ok(world)
    }

    fn log_statistics(&self) {
        for (name, grid) in [
            ("elevation", &self.elevation),
            ("temperature", &self.temperature),
            ("rainfall", &self.rainfall),
            ("rivers", &self.rivers),
        ] {
            let stats = grid_ops::statistics(grid);
            debug!(grid = name, min = stats.min, max = stats.max, mean = stats.mean, "grid statistics");
        }

        let lakes = grid_ops::bool_counts(&self.lakes);
        debug!(
            grid = "lakes",
            total = lakes.total,
            true_count = lakes.true_count,
            false_count = lakes.false_count,
            "grid statistics"
        );

        let rs = &self.region_stats;
        debug!(
            discovered = rs.discovered,
            merged = rs.merged,
            surviving = rs.count,
            smallest = rs.smallest,
            largest = rs.largest,
            undersized = rs.undersized,
            "region statistics"
        );
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn seeds(&self) -> &WorldSeeds {
        &self.seeds
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn elevation(&self) -> &Grid<f32> {
        &self.elevation
    }

    pub fn temperature(&self) -> &Grid<f32> {
        &self.temperature
    }

    pub fn rainfall(&self) -> &Grid<f32> {
        &self.rainfall
    }

    pub fn rivers(&self) -> &Grid<f32> {
        &self.rivers
    }

    pub fn lakes(&self) -> &Grid<bool> {
        &self.lakes
    }

    pub fn biomes(&self) -> &Grid<Biome> {
        &self.biomes
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn river_stats(&self) -> &RiverStats {
        &self.river_stats
    }

    pub fn region_stats(&self) -> &RegionStats {
        &self.region_stats
    }

    pub fn timings(&self) -> &[PhaseTiming] {
        &self.timings
    }

    pub fn elevation_stats(&self) -> GridStats {
        grid_ops::statistics(&self.elevation)
    }

    pub fn lake_counts(&self) -> BoolCounts {
        grid_ops::bool_counts(&self.lakes)
    }

    /// Cells per biome, indexed like `Biome::ALL`.
    pub fn biome_counts(&self) -> [usize; 12] {
        biomes::biome_counts(&self.biomes)
    }

    /// The region containing a cell.
    pub fn region_at(&self, x: usize, y: usize) -> Option<&Region> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.regions.get(*self.region_map.get(x, y))
    }

    /// Get tile info at coordinates
    pub fn tile_info(&self, x: usize, y: usize) -> Option<TileInfo> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(TileInfo {
            x,
            y,
            elevation: *self.elevation.get(x, y),
            temperature: *self.temperature.get(x, y),
            rainfall: *self.rainfall.get(x, y),
            river_flow: *self.rivers.get(x, y),
            is_lake: *self.lakes.get(x, y),
            biome: *self.biomes.get(x, y),
            region: *self.region_map.get(x, y),
        })
    }
}
