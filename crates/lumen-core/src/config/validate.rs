//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

/// Largest batch the inference settings accept.
pub const MAX_BATCH_SIZE: usize = 1024;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inference.batch_size == 0 || self.inference.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "inference.batch_size must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        if self.inference.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "inference.model must not be empty".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if !self.ranking.threshold.is_finite() {
            return Err(ConfigError::ValidationError(
                "ranking.threshold must be a finite number".into(),
            ));
        }
        if self.export.upload_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "export.upload_batch_size must be > 0".into(),
            ));
        }
        if !matches!(self.output.format.as_str(), "json" | "jsonl") {
            return Err(ConfigError::ValidationError(
                "output.format must be \"json\" or \"jsonl\"".into(),
            ));
        }
        Ok(())
    }
}
