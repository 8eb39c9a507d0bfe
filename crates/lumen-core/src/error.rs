//! Error types for the Lumen ranking pipeline.
//!
//! Errors are split by who can fix them: configuration problems, pipeline
//! failures (decode, encoder, storage, invariant violations), and validation
//! errors the user recovers from by changing their input.

use thiserror::Error;

/// Top-level error type for Lumen operations.
#[derive(Error, Debug)]
pub enum LumenError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Recoverable user-input errors
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline processing errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image bytes could not be decoded
    #[error("Decode error for {id}: {message}")]
    Decode { id: String, message: String },

    /// Model files missing or failed to load
    #[error("Model error: {message}")]
    Model { message: String },

    /// Encoder forward pass failed
    #[error("Embedding failed: {message}")]
    Embedding { message: String },

    /// Bad batch size, mismatched prompts/weights, and similar caller errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Score vector does not line up with the tracked images
    #[error("Length mismatch: expected {expected} scores, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Every image in a batch failed to decode
    #[error("All {size} images in batch {batch} failed to decode")]
    BatchFailed { batch: usize, size: usize },

    /// Source or destination access failed
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Operation timed out
    #[error("Timeout in {stage} stage after {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },
}

/// User-facing validation failures. None of these leave partial side effects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Neither sorting nor filtering was requested
    #[error("At least one output method (sort or filter) must be selected")]
    NoPolicySelected,

    /// Prompt or source collection missing at run start
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// A run is already preparing or running
    #[error("A ranking run is already in progress")]
    RunInProgress,

    /// Export target is the collection the images came from
    #[error("Destination {0} is the source collection; choose another destination")]
    SameSourceAsDestination(String),

    /// Export requested before a run completed
    #[error("No completed ranking run to export")]
    NoCompletedRun,
}

/// Convenience type alias for Lumen results.
pub type Result<T> = std::result::Result<T, LumenError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
