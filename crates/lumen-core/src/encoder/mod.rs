//! Image/text encoders.
//!
//! The ranking pipeline only sees the [`ImageTextEncoder`] trait: a batch of
//! preprocessed images in, one embedding per image out; a batch of strings
//! in, one embedding per string out, both in the same space. Concrete
//! encoders are created by name through an [`EncoderRegistry`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use lumen_core::encoder::EncoderRegistry;
//!
//! let registry = EncoderRegistry::with_builtin();
//! let encoder = registry.create("clip-vit-base-patch32", &config.model_dir())?;
//! let prompts = encoder.encode_text(&["a red car".to_string()])?;
//! ```

pub mod clip;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::pipeline::ModelInput;

pub use self::clip::ClipEncoder;

/// CLIP image normalization mean (RGB).
pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];

/// CLIP image normalization standard deviation (RGB).
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Local filename of the vision tower.
pub const VISUAL_MODEL_FILENAME: &str = "visual.onnx";

/// Local filename of the text tower.
pub const TEXT_MODEL_FILENAME: &str = "text.onnx";

/// Local filename of the tokenizer.
pub const TOKENIZER_FILENAME: &str = "tokenizer.json";

/// What an encoder expects its image inputs to look like.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    /// Square input side in pixels
    pub image_size: u32,
    /// Per-channel mean subtracted after scaling to [0, 1]
    pub mean: [f32; 3],
    /// Per-channel standard deviation divided out after the mean
    pub std: [f32; 3],
}

impl InputSpec {
    /// Standard CLIP preprocessing at the given input size.
    pub fn clip(image_size: u32) -> Self {
        Self {
            image_size,
            mean: CLIP_MEAN,
            std: CLIP_STD,
        }
    }
}

/// Something that embeds images and text into a shared vector space.
///
/// Implementations return raw (not necessarily normalized) embeddings; the
/// scorer normalizes both sides itself.
pub trait ImageTextEncoder: Send + Sync {
    /// Registry name of this encoder.
    fn name(&self) -> &str;

    /// Image input shape and normalization.
    fn input_spec(&self) -> InputSpec;

    /// Embed a batch of preprocessed images with one forward pass.
    fn encode_images(&self, batch: &[ModelInput]) -> Result<Vec<Vec<f32>>, PipelineError>;

    /// Embed a batch of strings with one forward pass.
    fn encode_text(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;
}

/// A downloadable model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelVariant {
    /// Registry name, also the directory under the model dir
    pub name: &'static str,
    /// Short human label
    pub label: &'static str,
    /// HuggingFace repository hosting the ONNX export
    pub repo: &'static str,
    /// Input side in pixels
    pub image_size: u32,
}

impl ModelVariant {
    /// Remote path → local filename for every file the variant needs.
    pub fn files(&self) -> [(&'static str, &'static str); 3] {
        [
            ("onnx/vision_model.onnx", VISUAL_MODEL_FILENAME),
            ("onnx/text_model.onnx", TEXT_MODEL_FILENAME),
            ("tokenizer.json", TOKENIZER_FILENAME),
        ]
    }

    /// True when every file of this variant is present under `model_dir`.
    pub fn is_installed(&self, model_dir: &Path) -> bool {
        let dir = model_dir.join(self.name);
        self.files()
            .iter()
            .all(|(_, local)| dir.join(local).exists())
    }
}

/// Built-in CLIP variants.
pub const CLIP_VARIANTS: &[ModelVariant] = &[
    ModelVariant {
        name: "clip-vit-base-patch32",
        label: "ViT-B/32 (fast)",
        repo: "Xenova/clip-vit-base-patch32",
        image_size: 224,
    },
    ModelVariant {
        name: "clip-vit-base-patch16",
        label: "ViT-B/16 (balanced)",
        repo: "Xenova/clip-vit-base-patch16",
        image_size: 224,
    },
    ModelVariant {
        name: "clip-vit-large-patch14",
        label: "ViT-L/14 (accurate)",
        repo: "Xenova/clip-vit-large-patch14",
        image_size: 224,
    },
];

/// Look up a built-in variant by name.
pub fn find_variant(name: &str) -> Option<&'static ModelVariant> {
    CLIP_VARIANTS.iter().find(|v| v.name == name)
}

type Constructor =
    Box<dyn Fn(&Path) -> Result<Arc<dyn ImageTextEncoder>, PipelineError> + Send + Sync>;

/// Named encoder constructors, selected by the configured model string.
#[derive(Default)]
pub struct EncoderRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl EncoderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in CLIP variant.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for variant in CLIP_VARIANTS {
            registry.register(variant.name, move |model_dir: &Path| {
                let encoder = ClipEncoder::load(variant, &model_dir.join(variant.name))?;
                Ok(Arc::new(encoder) as Arc<dyn ImageTextEncoder>)
            });
        }
        registry
    }

    /// Register (or replace) a constructor under `name`.
    ///
    /// The constructor receives the configured model directory.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&Path) -> Result<Arc<dyn ImageTextEncoder>, PipelineError> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Construct the encoder registered under `name`.
    pub fn create(
        &self,
        name: &str,
        model_dir: &Path,
    ) -> Result<Arc<dyn ImageTextEncoder>, PipelineError> {
        let constructor = self.constructors.get(name).ok_or_else(|| PipelineError::Model {
            message: format!(
                "Unknown model '{name}'. Available: {}",
                self.names().join(", ")
            ),
        })?;
        constructor(model_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant;

    impl ImageTextEncoder for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn input_spec(&self) -> InputSpec {
            InputSpec::clip(8)
        }

        fn encode_images(&self, batch: &[ModelInput]) -> Result<Vec<Vec<f32>>, PipelineError> {
            Ok(vec![vec![1.0, 0.0]; batch.len()])
        }

        fn encode_text(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
            Ok(vec![vec![0.0, 1.0]; texts.len()])
        }
    }

    #[test]
    fn test_builtin_registry_lists_clip_variants() {
        let registry = EncoderRegistry::with_builtin();
        assert_eq!(
            registry.names(),
            vec![
                "clip-vit-base-patch16",
                "clip-vit-base-patch32",
                "clip-vit-large-patch14"
            ]
        );
    }

    #[test]
    fn test_unknown_name_is_model_error() {
        let registry = EncoderRegistry::with_builtin();
        let err = registry
            .create("resnet-9000", Path::new("/nonexistent"))
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Model { .. }));
        assert!(err.to_string().contains("clip-vit-base-patch32"));
    }

    #[test]
    fn test_missing_model_files_is_model_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = EncoderRegistry::with_builtin();
        let err = registry
            .create("clip-vit-base-patch32", dir.path())
            .err()
            .unwrap();
        assert!(err.to_string().contains("models download"));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = EncoderRegistry::new();
        registry.register("constant", |_: &Path| {
            Ok(Arc::new(Constant) as Arc<dyn ImageTextEncoder>)
        });

        let encoder = registry.create("constant", Path::new(".")).unwrap();
        assert_eq!(encoder.name(), "constant");
        assert_eq!(encoder.input_spec().image_size, 8);
        assert_eq!(encoder.encode_text(&["x".to_string()]).unwrap().len(), 1);
    }

    #[test]
    fn test_variant_install_check() {
        let dir = tempfile::tempdir().unwrap();
        let variant = find_variant("clip-vit-base-patch32").unwrap();
        assert!(!variant.is_installed(dir.path()));

        let variant_dir = dir.path().join(variant.name);
        std::fs::create_dir_all(&variant_dir).unwrap();
        for (_, local) in variant.files() {
            std::fs::write(variant_dir.join(local), b"").unwrap();
        }
        assert!(variant.is_installed(dir.path()));
    }
}
