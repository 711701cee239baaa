//! Seeded gradient noise
//!
//! A classic improved-gradient (Perlin) sampler built on its own permutation
//! table, so that output depends only on the seed and never on a library's
//! internal hashing. Layers are summed into fractal noise and renormalised by
//! the total amplitude.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorldGenError};

/// Sampling parameters for one noise-derived map.
///
/// A cell at `(x, y)` of a `width x height` grid is sampled at
/// `((x / width + pre_offset) * scale + post_offset, ...)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseLayer {
    /// Number of summed octaves
    pub octaves: u32,
    /// Amplitude decay per octave
    pub persistence: f64,
    /// Frequency growth per octave
    pub lacunarity: f64,
    /// Amplitude of the first octave
    pub amplitude: f64,
    /// Frequency of the first octave
    pub frequency: f64,
    /// Multiplier applied to normalised cell coordinates
    pub scale: f64,
    /// Added to normalised coordinates before scaling (centres the map)
    pub pre_offset: f64,
    /// Added after scaling (moves the sample window to another part of the field)
    pub post_offset: f64,
}

impl Default for NoiseLayer {
    fn default() -> Self {
        Self {
            octaves: 8,
            persistence: 0.5,
            lacunarity: 2.0,
            amplitude: 1.0,
            frequency: 1.0,
            scale: 5.0,
            pre_offset: 0.0,
            post_offset: 0.0,
        }
    }
}

impl NoiseLayer {
    /// Elevation layer: centred window, smooth decay.
    pub fn elevation() -> Self {
        Self {
            persistence: 0.5,
            amplitude: 3.0,
            frequency: 1.1,
            pre_offset: -0.5,
            ..Self::default()
        }
    }

    /// Temperature layer: broad, slowly varying bands.
    pub fn temperature() -> Self {
        Self {
            persistence: 0.8,
            amplitude: 3.0,
            frequency: 0.3,
            post_offset: 100.0,
            ..Self::default()
        }
    }

    /// Rainfall layer: mid-frequency patches.
    pub fn rainfall() -> Self {
        Self {
            persistence: 0.4,
            amplitude: 3.0,
            frequency: 0.6,
            post_offset: 50.0,
            ..Self::default()
        }
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if self.octaves == 0 {
            return Err(WorldGenError::InvalidConfig(format!("{name}: octaves must be at least 1")));
        }
        let positive = [
            ("persistence", self.persistence),
            ("lacunarity", self.lacunarity),
            ("amplitude", self.amplitude),
            ("frequency", self.frequency),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(WorldGenError::InvalidConfig(format!(
                    "{name}: {field} must be finite and positive, got {value}"
                )));
            }
        }
        if !self.scale.is_finite() || !self.pre_offset.is_finite() || !self.post_offset.is_finite() {
            return Err(WorldGenError::InvalidConfig(format!("{name}: coordinates must be finite")));
        }
        Ok(())
    }

    /// Map a cell to the noise-space coordinate sampled for it.
    pub fn coords(&self, x: usize, y: usize, width: usize, height: usize) -> (f64, f64) {
        let nx = x as f64 / width as f64 + self.pre_offset;
        let ny = y as f64 / height as f64 + self.pre_offset;
        (nx * self.scale + self.post_offset, ny * self.scale + self.post_offset)
    }
}

/// Deterministic multi-octave gradient noise.
#[derive(Clone, Debug)]
pub struct NoiseField {
    /// 0..=255 shuffled, then repeated once so `perm[i + 1]` never needs a wrap
    perm: [u8; 512],
    /// Tile period; disabled when <= 0
    repeat: i32,
}

impl NoiseField {
    pub fn new(seed: u64) -> Self {
        Self::with_repeat(seed, -1)
    }

    pub fn with_repeat(seed: u64, repeat: i32) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut base: Vec<u8> = (0..=255u8).collect();
        base.shuffle(&mut rng);

        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = base[i & 255];
        }

        Self { perm, repeat }
    }

    pub fn permutation(&self) -> &[u8; 512] {
        &self.perm
    }

    /// Fractal noise in `[0, 1]`.
    ///
    /// Each octave multiplies frequency by `lacunarity` and amplitude by
    /// `persistence`, starting from `frequency_scale` / `amplitude_scale`. The sum
    /// is divided by the total amplitude so the octave count does not change the
    /// output range.
    pub fn noise(
        &self,
        x: f64,
        y: f64,
        octaves: u32,
        persistence: f64,
        lacunarity: f64,
        amplitude_scale: f64,
        frequency_scale: f64,
    ) -> f64 {
        let mut total = 0.0;
        let mut frequency = frequency_scale;
        let mut amplitude = amplitude_scale;
        let mut max_value = 0.0;

        for _ in 0..octaves {
            total += self.single(x * frequency, y * frequency) * amplitude;
            max_value += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }

        if max_value <= 0.0 || !max_value.is_finite() {
            // No usable octave; report the midpoint rather than NaN.
            return 0.5;
        }
        (total / max_value).clamp(0.0, 1.0)
    }

    /// Sample with the parameters of a `NoiseLayer`.
    pub fn sample(&self, layer: &NoiseLayer, x: f64, y: f64) -> f64 {
        self.noise(
            x,
            y,
            layer.octaves,
            layer.persistence,
            layer.lacunarity,
            layer.amplitude,
            layer.frequency,
        )
    }

    /// One octave of improved gradient noise, remapped from [-1, 1] to [0, 1].
    fn single(&self, mut x: f64, mut y: f64) -> f64 {
        if self.repeat > 0 {
            x %= self.repeat as f64;
            y %= self.repeat as f64;
        }

        let xi = (x.floor() as i64 & 255) as usize;
        let yi = (y.floor() as i64 & 255) as usize;

        let xf = x - x.floor();
        let yf = y - y.floor();

        let u = fade(xf);
        let v = fade(yf);

        let p = &self.perm;
        let aa = p[p[xi] as usize + yi] as usize;
        let ab = p[p[xi] as usize + yi + 1] as usize;
        let ba = p[p[xi + 1] as usize + yi] as usize;
        let bb = p[p[xi + 1] as usize + yi + 1] as usize;

        let bottom = lerp(u, grad(p[aa], xf, yf), grad(p[ba], xf - 1.0, yf));
        let top = lerp(u, grad(p[ab], xf, yf - 1.0), grad(p[bb], xf - 1.0, yf - 1.0));

        (lerp(v, bottom, top) + 1.0) / 2.0
    }
}

/// 6t^5 - 15t^4 + 10t^3
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

fn grad(hash: u8, x: f64, y: f64) -> f64 {
    let h = hash & 3;
    let (u, v) = if h < 2 { (x, y) } else { (y, x) };
    let u = if h & 1 == 0 { u } else { -u };
    let v = if h & 2 == 0 { v } else { -v };
    u + v
}
