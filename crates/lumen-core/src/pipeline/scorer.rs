//! Prompt similarity scoring.
//!
//! Every image and prompt embedding is L2-normalized before the dot product,
//! so each logit is a cosine similarity in [-1, 1]. Per-image scores are the
//! weighted sum of those logits and are deliberately left unnormalized.

use std::sync::Arc;

use ndarray::{Array1, Array2, ArrayView1};

use crate::encoder::ImageTextEncoder;
use crate::error::PipelineError;
use crate::math::l2_normalize;
use crate::types::PromptSet;

use super::preprocess::ModelInput;

/// Scores image batches against a fixed prompt set.
///
/// Prompt embeddings are computed once (one batched text call) and reused
/// for every image batch of the run.
pub struct Scorer {
    encoder: Arc<dyn ImageTextEncoder>,
    prompt_embeddings: Vec<Vec<f32>>,
    weights: Array1<f32>,
}

impl Scorer {
    /// Encode the prompt set and build a scorer for it.
    pub fn new(encoder: Arc<dyn ImageTextEncoder>, prompts: &PromptSet) -> Result<Self, PipelineError> {
        if prompts.is_empty() {
            return Err(PipelineError::InvalidArgument(
                "prompt set must not be empty".to_string(),
            ));
        }

        let prompt_embeddings = encoder.encode_text(&prompts.texts())?;
        if prompt_embeddings.len() != prompts.len() {
            return Err(PipelineError::Embedding {
                message: format!(
                    "Text encoder returned {} embeddings for {} prompts",
                    prompt_embeddings.len(),
                    prompts.len()
                ),
            });
        }
        tracing::debug!(
            "Encoded {} prompt(s) with {}",
            prompt_embeddings.len(),
            encoder.name()
        );

        Ok(Self {
            encoder,
            prompt_embeddings,
            weights: Array1::from(prompts.weights()),
        })
    }

    pub fn prompt_count(&self) -> usize {
        self.prompt_embeddings.len()
    }

    /// Per-prompt logits for a batch: `[batch.len(), prompt_count]`.
    pub fn score_batch(&self, batch: &[ModelInput]) -> Result<Array2<f32>, PipelineError> {
        score_batch(self.encoder.as_ref(), batch, &self.prompt_embeddings)
    }

    /// Weighted per-image scores for a logits matrix.
    pub fn combine(&self, logits: &Array2<f32>) -> Vec<f32> {
        logits
            .rows()
            .into_iter()
            .map(|row| combine_row(row, self.weights.view()))
            .collect()
    }
}

/// Encode a batch of images (one encoder call) and compare against the
/// prompt embeddings.
pub fn score_batch(
    encoder: &dyn ImageTextEncoder,
    batch: &[ModelInput],
    prompt_embeddings: &[Vec<f32>],
) -> Result<Array2<f32>, PipelineError> {
    if batch.is_empty() {
        return Ok(Array2::zeros((0, prompt_embeddings.len())));
    }

    let image_embeddings = encoder.encode_images(batch)?;
    if image_embeddings.len() != batch.len() {
        return Err(PipelineError::Embedding {
            message: format!(
                "Image encoder returned {} embeddings for {} images",
                image_embeddings.len(),
                batch.len()
            ),
        });
    }

    similarity_matrix(&image_embeddings, prompt_embeddings)
}

/// Cosine similarity matrix `[images, prompts]` of raw embeddings.
pub fn similarity_matrix(
    images: &[Vec<f32>],
    prompts: &[Vec<f32>],
) -> Result<Array2<f32>, PipelineError> {
    let dim = match (images.first(), prompts.first()) {
        (Some(i), _) => i.len(),
        (None, Some(p)) => p.len(),
        (None, None) => return Ok(Array2::zeros((0, 0))),
    };

    let images = normalized_matrix(images, dim, "image")?;
    let prompts = normalized_matrix(prompts, dim, "text")?;
    Ok(images.dot(&prompts.t()))
}

/// Weighted sum of one row of logits.
pub fn combine_scores(logits_row: &[f32], weights: &[f32]) -> Result<f32, PipelineError> {
    if logits_row.len() != weights.len() {
        return Err(PipelineError::InvalidArgument(format!(
            "{} logits but {} weights",
            logits_row.len(),
            weights.len()
        )));
    }
    Ok(combine_row(
        ArrayView1::from(logits_row),
        ArrayView1::from(weights),
    ))
}

fn combine_row(row: ArrayView1<'_, f32>, weights: ArrayView1<'_, f32>) -> f32 {
    row.dot(&weights)
}

fn normalized_matrix(
    rows: &[Vec<f32>],
    dim: usize,
    side: &str,
) -> Result<Array2<f32>, PipelineError> {
    let mut flat = Vec::with_capacity(rows.len() * dim);
    for row in rows {
        if row.len() != dim {
            return Err(PipelineError::Embedding {
                message: format!(
                    "{side} embedding has dimension {}, expected {dim}",
                    row.len()
                ),
            });
        }
        flat.extend(l2_normalize(row));
    }
    Array2::from_shape_vec((rows.len(), dim), flat).map_err(|e| PipelineError::Embedding {
        message: format!("Failed to build {side} embedding matrix: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_normalizes_before_dot() {
        // Magnitudes differ wildly; cosine must not.
        let images = vec![vec![10.0, 0.0], vec![0.0, 0.5]];
        let prompts = vec![vec![3.0, 3.0]];
        let sim = similarity_matrix(&images, &prompts).unwrap();

        assert_eq!(sim.shape(), &[2, 1]);
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((sim[[0, 0]] - expected).abs() < 1e-6);
        assert!((sim[[1, 0]] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_bounds() {
        let images = vec![vec![1.0, 2.0, 3.0]];
        let prompts = vec![vec![1.0, 2.0, 3.0], vec![-1.0, -2.0, -3.0]];
        let sim = similarity_matrix(&images, &prompts).unwrap();
        assert!((sim[[0, 0]] - 1.0).abs() < 1e-6);
        assert!((sim[[0, 1]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_rejects_dimension_mismatch() {
        let err = similarity_matrix(&[vec![1.0, 0.0]], &[vec![1.0, 0.0, 0.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::Embedding { .. }));
    }

    #[test]
    fn test_single_unit_weight_is_identity() {
        assert!((combine_scores(&[0.8], &[1.0]).unwrap() - 0.8).abs() < 1e-7);
        assert!((combine_scores(&[0.3], &[1.0]).unwrap() - 0.3).abs() < 1e-7);
    }

    #[test]
    fn test_weighted_sum_is_not_normalized() {
        let score = combine_scores(&[0.9, 0.8], &[2.0, 1.5]).unwrap();
        assert!((score - 3.0).abs() < 1e-6);

        let score = combine_scores(&[0.5, 0.4], &[1.0, -1.0]).unwrap();
        assert!((score - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_combine_rejects_length_mismatch() {
        let err = combine_scores(&[0.5, 0.4], &[1.0]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }
}
