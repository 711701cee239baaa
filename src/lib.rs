//! Procedural 2D world map generation library
//!
//! Noise-driven elevation and climate maps, rivers and lakes, biome
//! classification and region segmentation. Re-exports modules for use by
//! binaries and tools.

pub mod biomes;
pub mod config;
pub mod error;
pub mod grid;
pub mod grid_ops;
pub mod hydrology;
pub mod logging;
pub mod noise_field;
pub mod regions;
pub mod seeds;
pub mod world;

pub use biomes::{Biome, BiomeClassifier, BiomeTable};
pub use config::GeneratorConfig;
pub use error::{Result, WorldGenError};
pub use grid::Grid;
pub use regions::{Region, RegionStats};
pub use seeds::WorldSeeds;
pub use world::{TileInfo, WorldGenerator};
