//! Lake marking by elevation, optionally gated by climate.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorldGenError};
use crate::grid::Grid;

/// Which conditions make a low cell a lake
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LakePolicy {
    /// Any cell below the elevation threshold
    #[default]
    ElevationOnly,
    /// Below the elevation threshold and neither arid nor frozen
    Climate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LakeParams {
    pub policy: LakePolicy,
    /// Cells strictly below this elevation can hold a lake
    pub max_elevation: f32,
    /// `Climate` policy: minimum rainfall
    pub min_rainfall: f32,
    /// `Climate` policy: minimum temperature
    pub min_temperature: f32,
}

impl Default for LakeParams {
    fn default() -> Self {
        Self {
            policy: LakePolicy::ElevationOnly,
            max_elevation: 0.3,
            min_rainfall: 0.25,
            min_temperature: 0.15,
        }
    }
}

impl LakeParams {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("max_elevation", self.max_elevation),
            ("min_rainfall", self.min_rainfall),
            ("min_temperature", self.min_temperature),
        ] {
            if !value.is_finite() {
                return Err(WorldGenError::InvalidConfig(format!("lakes: {field} must be finite")));
            }
        }
        Ok(())
    }

    pub fn is_lake(&self, elevation: f32, temperature: f32, rainfall: f32) -> bool {
        if elevation >= self.max_elevation {
            return false;
        }
        match self.policy {
            LakePolicy::ElevationOnly => true,
            LakePolicy::Climate => rainfall >= self.min_rainfall && temperature >= self.min_temperature,
        }
    }
}

/// Lake mask over the whole map, evaluated row-parallel.
pub fn mark_lakes(
    elevation: &Grid<f32>,
    temperature: &Grid<f32>,
    rainfall: &Grid<f32>,
    params: &LakeParams,
) -> Grid<bool> {
    Grid::from_fn(elevation.width, elevation.height, |x, y| {
        params.is_lake(*elevation.get(x, y), *temperature.get(x, y), *rainfall.get(x, y))
    })
}
