//! Error types for cache construction
//!
//! Provides unified error handling using thiserror. Operation-time outcomes
//! are plain `bool`/`Option` values; only building a cache can fail.

use thiserror::Error;

// == Hook Error ==
/// Error returned by an on-start handler.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

// == Engine Error ==
/// The storage engine rejected its configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Maximum capacity must be positive
    #[error("Invalid capacity: {0}")]
    InvalidCapacity(u64),
}

// == Option Error ==
/// Error returned by a configuration option.
#[derive(Error, Debug)]
pub enum OptionError {
    /// The option rejected its own arguments
    #[error("Invalid option: {0}")]
    Invalid(String),

    /// The option failed for another reason
    #[error(transparent)]
    Other(#[from] HookError),
}

// == Build Error ==
/// Unified error type for building a hooked cache.
///
/// Each variant names the stage that failed, so no partially built cache is
/// ever handed to the caller.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Finalizing the storage engine failed
    #[error("Storage engine rejected configuration: {0}")]
    Engine(#[from] EngineError),

    /// The option at `index` failed; later options were not applied
    #[error("Option #{index} failed: {source}")]
    Option {
        index: usize,
        #[source]
        source: OptionError,
    },

    /// The on-start handler at `index` failed; the built engine was discarded
    #[error("On-start handler #{index} failed: {source}")]
    OnStart {
        index: usize,
        #[source]
        source: HookError,
    },
}

// == Result Type Alias ==
/// Convenience Result type for cache construction.
pub type Result<T> = std::result::Result<T, BuildError>;
