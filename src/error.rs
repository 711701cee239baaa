//! Error types for world generation.

/// Errors surfaced to callers of the generator.
///
/// Only malformed inputs end up here. Flat grids, unreachable river sources and
/// regions without a merge target are handled in place and logged instead.
#[derive(Debug, thiserror::Error)]
pub enum WorldGenError {
    /// Width or height was zero.
    #[error("invalid world dimensions {width}x{height}: both must be positive")]
    InvalidDimensions { width: usize, height: usize },

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A climate table does not cover every bucket pair.
    #[error("biome table must have {expected} entries, got {actual}")]
    InvalidBiomeTable { expected: usize, actual: usize },

    /// Failed to read a configuration file.
    #[error("failed to read config: {0}")]
    ConfigRead(#[source] std::io::Error),

    /// Failed to parse a configuration file.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WorldGenError>;
