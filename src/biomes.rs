//! Biome classification
//!
//! Water and height are checked first (river, then lake, then mountain). Every
//! other cell is looked up in a quantised temperature x rainfall table, so the
//! same inputs always give the same biome and no combination is left uncovered.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorldGenError};
use crate::grid::Grid;

/// The canonical biome catalogue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Biome {
    // Climate biomes
    Arctic,
    Tundra,
    ConiferousForest,
    #[default]
    Grassland,
    TemperateForest,
    Swamp,
    Desert,
    Savanna,
    Jungle,

    // Special biomes
    Mountain,
    River,
    Lake,
}

impl Biome {
    pub const ALL: [Biome; 12] = [
        Biome::Arctic,
        Biome::Tundra,
        Biome::ConiferousForest,
        Biome::Grassland,
        Biome::TemperateForest,
        Biome::Swamp,
        Biome::Desert,
        Biome::Savanna,
        Biome::Jungle,
        Biome::Mountain,
        Biome::River,
        Biome::Lake,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Biome::Arctic => "Arctic",
            Biome::Tundra => "Tundra",
            Biome::ConiferousForest => "Coniferous Forest",
            Biome::Grassland => "Grassland",
            Biome::TemperateForest => "Temperate Forest",
            Biome::Swamp => "Swamp",
            Biome::Desert => "Desert",
            Biome::Savanna => "Savanna",
            Biome::Jungle => "Jungle",
            Biome::Mountain => "Mountain",
            Biome::River => "River",
            Biome::Lake => "Lake",
        }
    }

    /// Index into `ALL`
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn is_water(&self) -> bool {
        matches!(self, Biome::River | Biome::Lake)
    }

    /// Biomes assigned by the overrides rather than the climate table
    pub fn is_special(&self) -> bool {
        matches!(self, Biome::Mountain | Biome::River | Biome::Lake)
    }
}

impl std::fmt::Display for Biome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Square climate lookup table.
///
/// Rows are temperature buckets (cold to hot), columns are rainfall buckets
/// (dry to wet). Entry `[t * buckets + r]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BiomeTable {
    buckets: usize,
    entries: Vec<Biome>,
}

impl Default for BiomeTable {
    fn default() -> Self {
        use Biome::*;
        #[rustfmt::skip]
        let entries = vec![
            // dry -----------------------------------------------------------> wet
            Arctic,    Arctic,    Arctic,           Tundra,           Tundra,
            Tundra,    Tundra,    ConiferousForest, ConiferousForest, Swamp,
            Grassland, Grassland, TemperateForest,  TemperateForest,  Swamp,
            Desert,    Savanna,   Grassland,        TemperateForest,  Swamp,
            Desert,    Desert,    Savanna,          Jungle,           Jungle,
        ];
        Self { buckets: 5, entries }
    }
}

impl BiomeTable {
    pub fn new(buckets: usize, entries: Vec<Biome>) -> Result<Self> {
        let table = Self { buckets, entries };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        let expected = self.buckets.checked_mul(self.buckets).unwrap_or(usize::MAX);
        if self.buckets == 0 || self.entries.len() != expected {
            return Err(WorldGenError::InvalidBiomeTable {
                expected,
                actual: self.entries.len(),
            });
        }
        Ok(())
    }

    pub fn buckets(&self) -> usize {
        self.buckets
    }

    /// `clamp(floor(value * N), 0, N - 1)`; NaN lands in bucket 0.
    pub fn bucket(&self, value: f32) -> usize {
        let scaled = (value * self.buckets as f32).floor();
        if scaled.is_nan() || scaled < 0.0 {
            0
        } else {
            (scaled as usize).min(self.buckets - 1)
        }
    }

    pub fn get(&self, temperature_bucket: usize, rainfall_bucket: usize) -> Biome {
        self.entries[temperature_bucket * self.buckets + rainfall_bucket]
    }

    pub fn lookup(&self, temperature: f32, rainfall: f32) -> Biome {
        self.get(self.bucket(temperature), self.bucket(rainfall))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeParams {
    /// Cells strictly above this elevation are Mountain
    pub mountain_threshold: f32,
    pub table: BiomeTable,
}

impl Default for BiomeParams {
    fn default() -> Self {
        Self {
            mountain_threshold: 0.9,
            table: BiomeTable::default(),
        }
    }
}

/// Maps per-cell climate and water flags to a biome.
#[derive(Clone, Debug)]
pub struct BiomeClassifier {
    mountain_threshold: f32,
    table: BiomeTable,
}

impl BiomeClassifier {
    pub fn new(params: &BiomeParams) -> Result<Self> {
        params.table.validate()?;
        if !params.mountain_threshold.is_finite() {
            return Err(WorldGenError::InvalidConfig(
                "biomes: mountain_threshold must be finite".to_string(),
            ));
        }
        Ok(Self {
            mountain_threshold: params.mountain_threshold,
            table: params.table.clone(),
        })
    }

    pub fn table(&self) -> &BiomeTable {
        &self.table
    }

    /// First match wins: river, lake, mountain, then the climate table.
    pub fn classify(
        &self,
        temperature: f32,
        rainfall: f32,
        elevation: f32,
        is_river: bool,
        is_lake: bool,
    ) -> Biome {
        if is_river {
            return Biome::River;
        }
        if is_lake {
            return Biome::Lake;
        }
        if elevation > self.mountain_threshold {
            return Biome::Mountain;
        }
        self.table.lookup(temperature, rainfall)
    }

    /// Classify every cell, one rayon task per row.
    pub fn classify_map(
        &self,
        temperature: &Grid<f32>,
        rainfall: &Grid<f32>,
        elevation: &Grid<f32>,
        rivers: &Grid<f32>,
        lakes: &Grid<bool>,
    ) -> Grid<Biome> {
        Grid::from_fn(elevation.width, elevation.height, |x, y| {
            self.classify(
                *temperature.get(x, y),
                *rainfall.get(x, y),
                *elevation.get(x, y),
                *rivers.get(x, y) > 0.0,
                *lakes.get(x, y),
            )
        })
    }
}

/// Count cells per biome, indexed like `Biome::ALL`.
pub fn biome_counts(biomes: &Grid<Biome>) -> [usize; 12] {
    let mut counts = [0usize; 12];
    for (_, _, biome) in biomes.iter() {
        counts[biome.index()] += 1;
    }
    counts
}
