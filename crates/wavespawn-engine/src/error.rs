//! Error types for the Wavespawn engine binary.
//!
//! [`EngineError`] wraps every failure mode that can stop the host before
//! or after the game loop. Rule-table problems are not among them: the rule
//! engine degrades to fallback spawns instead of failing.

use std::path::PathBuf;

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: wavespawn_core::config::ConfigError,
    },

    /// The run report could not be serialized.
    #[error("report serialization error: {source}")]
    Serialize {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The run report could not be written.
    #[error("failed to write report to {}: {source}", .path.display())]
    ReportWrite {
        /// Destination path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
