//! Core data types shared across the ranking pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::PipelineError;

/// Identifier of an image, unique within its collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub String);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a source or destination collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(pub String);

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CollectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque per-image metadata carried through to the export.
pub type ImageMeta = BTreeMap<String, serde_json::Value>;

/// An image listed from a source collection (metadata only; bytes are
/// downloaded on demand).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Identifier within the source collection
    pub id: ImageId,

    /// Display name (usually the file name)
    pub name: String,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Free-form metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: ImageMeta,
}

/// One text prompt and its weight in the combined score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedPrompt {
    pub text: String,
    pub weight: f32,
}

/// Ordered (text, weight) pairs scored against every image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PromptSet {
    prompts: Vec<WeightedPrompt>,
}

impl PromptSet {
    /// A single prompt with unit weight.
    pub fn single(text: impl Into<String>) -> Self {
        Self {
            prompts: vec![WeightedPrompt {
                text: text.into(),
                weight: 1.0,
            }],
        }
    }

    /// Build from parallel text and weight lists.
    ///
    /// An empty `weights` list means every prompt gets weight 1.0; any other
    /// length must match `texts`.
    pub fn from_parts(texts: Vec<String>, weights: Vec<f32>) -> Result<Self, PipelineError> {
        let weights = if weights.is_empty() {
            vec![1.0; texts.len()]
        } else {
            weights
        };

        if texts.len() != weights.len() {
            return Err(PipelineError::InvalidArgument(format!(
                "{} prompts but {} weights",
                texts.len(),
                weights.len()
            )));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite()) {
            return Err(PipelineError::InvalidArgument(format!(
                "prompt weight {w} is not finite"
            )));
        }

        Ok(Self {
            prompts: texts
                .into_iter()
                .zip(weights)
                .map(|(text, weight)| WeightedPrompt { text, weight })
                .collect(),
        })
    }

    /// True when there are no prompts or every prompt is blank.
    pub fn is_blank(&self) -> bool {
        self.prompts.iter().all(|p| p.text.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeightedPrompt> {
        self.prompts.iter()
    }

    pub fn texts(&self) -> Vec<String> {
        self.prompts.iter().map(|p| p.text.clone()).collect()
    }

    pub fn weights(&self) -> Vec<f32> {
        self.prompts.iter().map(|p| p.weight).collect()
    }

    /// Human-readable label used in export metadata and tag names.
    ///
    /// A single prompt is used verbatim; several are joined with " | ".
    pub fn label(&self) -> String {
        self.prompts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// An image that was dropped from a run because it could not be decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedImage {
    /// Position in the listed source order
    pub index: usize,
    pub id: ImageId,
    pub name: String,
    pub reason: String,
}

/// A scored image in its final (sorted and/or filtered) position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedImage {
    /// Position in the final output, starting at 0
    pub position: usize,

    /// Position among the scored images in source order
    pub source_index: usize,

    pub id: ImageId,
    pub name: String,
    pub width: u32,
    pub height: u32,

    /// Weighted prompt similarity
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_set_single_has_unit_weight() {
        let prompts = PromptSet::single("a dog on a beach");
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts.weights(), vec![1.0]);
        assert_eq!(prompts.label(), "a dog on a beach");
    }

    #[test]
    fn test_prompt_set_default_weights() {
        let prompts =
            PromptSet::from_parts(vec!["cat".to_string(), "dog".to_string()], vec![]).unwrap();
        assert_eq!(prompts.weights(), vec![1.0, 1.0]);
        assert_eq!(prompts.label(), "cat | dog");
    }

    #[test]
    fn test_prompt_set_rejects_length_mismatch() {
        let err = PromptSet::from_parts(vec!["cat".to_string()], vec![1.0, -0.5]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
        assert!(err.to_string().contains("1 prompts but 2 weights"));
    }

    #[test]
    fn test_prompt_set_rejects_nan_weight() {
        let err = PromptSet::from_parts(vec!["cat".to_string()], vec![f32::NAN]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[test]
    fn test_blank_prompt_set() {
        assert!(PromptSet::default().is_blank());
        assert!(PromptSet::single("   ").is_blank());
        assert!(!PromptSet::single("sunset").is_blank());
    }

    #[test]
    fn test_image_record_skips_empty_meta() {
        let record = ImageRecord {
            id: ImageId::from("photos/a.jpg"),
            name: "a.jpg".to_string(),
            width: 640,
            height: 480,
            meta: ImageMeta::new(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"id\":\"photos/a.jpg\""));
        assert!(!json.contains("meta"));
    }
}
