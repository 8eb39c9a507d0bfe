//! Lumen Core - prompt-based image ranking library.
//!
//! Lumen scores every image of a collection against one or more weighted
//! text prompts with a CLIP-family encoder, ranks the images by score, and
//! exports a sorted/filtered selection into a new collection.
//!
//! # Architecture
//!
//! ```text
//! list → download → Preprocess → Batch → Score → Aggregate/Rank → Sort/Filter → Export
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use lumen_core::{CancelToken, Config, Lumen, LocalStore, PromptSet, RunState};
//!
//! #[tokio::main]
//! async fn main() -> lumen_core::Result<()> {
//!     let lumen = Lumen::new(Config::load()?);
//!     let store = std::sync::Arc::new(LocalStore::new("./exports", lumen.config().processing.clone()));
//!     let ranker = lumen.ranker(lumen.load_encoder()?, store);
//!
//!     let mut state = RunState::new();
//!     state.select_source("./photos".into());
//!     ranker.run(&mut state, &PromptSet::single("a dog"), &CancelToken::new(), |_| {}).await?;
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod encoder;
pub mod error;
pub mod export;
pub mod math;
pub mod output;
pub mod pipeline;
pub mod storage;
pub mod types;

use std::sync::Arc;

// Re-exports for convenient access
pub use config::Config;
pub use encoder::{EncoderRegistry, ImageTextEncoder, InputSpec};
pub use error::{ConfigError, LumenError, PipelineError, PipelineResult, Result, ValidationError};
pub use export::{ExportOptions, ExportReport, Exporter};
pub use output::{OutputFormat, OutputWriter, RunReport};
pub use pipeline::{
    CancelToken, FilterMode, OutputPolicy, Preview, Ranker, RunOptions, RunOutcome, RunProgress,
    RunResults, RunState, RunStatus, SortOrder,
};
pub use storage::{Destination, LocalStore, SourceCollection};
pub use types::{CollectionId, ImageId, ImageRecord, PromptSet, RankedImage, SkippedImage};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Entry point tying configuration to encoders, rankers and exporters.
pub struct Lumen {
    config: Config,
    registry: EncoderRegistry,
}

impl Lumen {
    /// Create an instance with the built-in encoders.
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, EncoderRegistry::with_builtin())
    }

    /// Create an instance with a custom encoder registry.
    pub fn with_registry(config: Config, registry: EncoderRegistry) -> Self {
        tracing::debug!("Initializing Lumen v{}", VERSION);
        Self { config, registry }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn registry(&self) -> &EncoderRegistry {
        &self.registry
    }

    /// Get the model directory path.
    pub fn model_dir(&self) -> std::path::PathBuf {
        self.config.model_dir()
    }

    /// Load the encoder named by `inference.model`.
    pub fn load_encoder(&self) -> Result<Arc<dyn ImageTextEncoder>> {
        Ok(self
            .registry
            .create(&self.config.inference.model, &self.model_dir())?)
    }

    /// A ranker over `source` using the configured batch size and limits.
    pub fn ranker(
        &self,
        encoder: Arc<dyn ImageTextEncoder>,
        source: Arc<dyn SourceCollection>,
    ) -> Ranker {
        Ranker::new(encoder, source, RunOptions::from(&self.config))
    }

    /// An exporter using the configured upload settings.
    pub fn exporter(
        &self,
        source: Arc<dyn SourceCollection>,
        destination: Arc<dyn Destination>,
        collection_name: Option<String>,
    ) -> Exporter {
        let mut options = ExportOptions::from(&self.config.export);
        options.collection_name = collection_name;
        Exporter::new(source, destination, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_lumen_new() {
        let lumen = Lumen::new(Config::default());
        assert_eq!(lumen.config().inference.batch_size, 32);
        assert!(lumen.registry().contains("clip-vit-base-patch32"));
    }

    #[test]
    fn test_load_encoder_unknown_model() {
        let mut config = Config::default();
        config.inference.model = "not-a-model".to_string();
        let lumen = Lumen::new(config);
        assert!(matches!(
            lumen.load_encoder().err(),
            Some(LumenError::Pipeline(PipelineError::Model { .. }))
        ));
    }
}
