//! Generator configuration
//!
//! All knobs of the pipeline in one serde-friendly struct. Every field has a
//! default, so a JSON file only needs to name what it changes:
//!
//! ```json
//! { "hydrology": { "river_count": 20 }, "regions": { "min_area": 50 } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::biomes::BiomeParams;
use crate::error::{Result, WorldGenError};
use crate::hydrology::HydrologyParams;
use crate::noise_field::NoiseLayer;
use crate::regions::RegionParams;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub elevation: NoiseLayer,
    pub temperature: NoiseLayer,
    pub rainfall: NoiseLayer,
    /// Box-blur passes applied to each noise map before normalisation
    pub erosion_iterations: usize,
    pub hydrology: HydrologyParams,
    pub biomes: BiomeParams,
    pub regions: RegionParams,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            elevation: NoiseLayer::elevation(),
            temperature: NoiseLayer::temperature(),
            rainfall: NoiseLayer::rainfall(),
            erosion_iterations: 7,
            hydrology: HydrologyParams::default(),
            biomes: BiomeParams::default(),
            regions: RegionParams::default(),
        }
    }
}

impl GeneratorConfig {
    /// Defaults tuned for maps of a few hundred cells: small regions survive
    /// and rivers are short enough not to flood the whole map.
    pub fn small_map() -> Self {
        let mut config = Self::default();
        config.regions.min_area = 5;
        config.hydrology.river_count = 3;
        config.hydrology.min_length = 20;
        config.hydrology.max_length = 40;
        config
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(WorldGenError::ConfigParse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(WorldGenError::ConfigRead)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(WorldGenError::ConfigParse)
    }

    pub fn validate(&self) -> Result<()> {
        self.elevation.validate("elevation")?;
        self.temperature.validate("temperature")?;
        self.rainfall.validate("rainfall")?;
        self.hydrology.validate()?;
        self.biomes.table.validate()?;
        if !self.biomes.mountain_threshold.is_finite() {
            return Err(WorldGenError::InvalidConfig(
                "biomes: mountain_threshold must be finite".to_string(),
            ));
        }
        Ok(())
    }
}
