//! Error types for the trajectory publisher.
//!
//! Configuration problems surface at construction and are fatal to startup.
//! Runtime failures (bad selector index) are reported and leave state untouched.

use thiserror::Error;

/// Unified error type for the trajectory publisher.
#[derive(Debug, Error)]
pub enum TrajectoryError {
    /// Configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Shape rotation axis has (near) zero length.
    #[error("Shape rotation axis must be non-zero, got [{0}, {1}, {2}]")]
    DegenerateAxis(f64, f64, f64),

    /// Selector index outside the primitive collection.
    #[error("Primitive index {index} out of range (0..{len})")]
    InvalidSelection { index: i64, len: usize },

    /// Reading the configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML for `TrajectoryConfig`.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The engine task has shut down.
    #[error("Reference engine is no longer running")]
    EngineStopped,
}

/// Convenience alias for `Result<T, TrajectoryError>`.
pub type Result<T> = std::result::Result<T, TrajectoryError>;
