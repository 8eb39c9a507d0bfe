//! CLIP encoder backed by ONNX Runtime.
//!
//! Loads the vision and text towers of a CLIP ONNX export plus its
//! HuggingFace tokenizer. Both towers project into the same space, so the
//! `image_embeds` and `text_embeds` outputs can be compared directly.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Value;
use tokenizers::Tokenizer;

use crate::error::PipelineError;
use crate::pipeline::ModelInput;

use super::{
    ImageTextEncoder, InputSpec, ModelVariant, TEXT_MODEL_FILENAME, TOKENIZER_FILENAME,
    VISUAL_MODEL_FILENAME,
};

/// CLIP text context length.
pub const CONTEXT_LENGTH: usize = 77;

/// CLIP end-of-text token, also used as padding.
const END_OF_TEXT: &str = "<|endoftext|>";

/// CLIP vision + text towers.
///
/// Sessions sit behind a `Mutex` because `Session::run` requires `&mut self`.
pub struct ClipEncoder {
    name: String,
    spec: InputSpec,
    vision: Mutex<Session>,
    vision_input: String,
    text: Mutex<Session>,
    text_takes_mask: bool,
    tokenizer: Tokenizer,
    pad_id: u32,
}

impl ClipEncoder {
    /// Load a variant from `dir` (usually `{model_dir}/{variant.name}`).
    pub fn load(variant: &ModelVariant, dir: &Path) -> Result<Self, PipelineError> {
        let visual_path = dir.join(VISUAL_MODEL_FILENAME);
        let text_path = dir.join(TEXT_MODEL_FILENAME);
        let tokenizer_path = dir.join(TOKENIZER_FILENAME);

        for path in [&visual_path, &text_path, &tokenizer_path] {
            if !path.exists() {
                return Err(PipelineError::Model {
                    message: format!(
                        "{:?} not found. Run `lumen models download --model {}` first.",
                        path, variant.name
                    ),
                });
            }
        }

        tracing::info!("Loading {} from {:?}", variant.name, dir);
        let vision = load_session(&visual_path)?;
        let text = load_session(&text_path)?;

        let mut tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|e| PipelineError::Model {
                message: format!("Failed to load tokenizer: {e}"),
            })?;
        tokenizer.with_padding(None);
        let pad_id = tokenizer.token_to_id(END_OF_TEXT).unwrap_or(0);

        let vision_input = vision
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "pixel_values".to_string());
        let text_takes_mask = text.inputs().iter().any(|i| i.name() == "attention_mask");

        tracing::debug!(
            "CLIP towers ready (vision input: {:?}, text attention_mask: {})",
            vision_input,
            text_takes_mask
        );

        Ok(Self {
            name: variant.name.to_string(),
            spec: InputSpec::clip(variant.image_size),
            vision: Mutex::new(vision),
            vision_input,
            text: Mutex::new(text),
            text_takes_mask,
            tokenizer,
            pad_id,
        })
    }

    /// Token ids and attention mask, each `[texts.len() * CONTEXT_LENGTH]`.
    fn tokenize(&self, texts: &[String]) -> Result<(Vec<i64>, Vec<i64>), PipelineError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| PipelineError::Model {
                message: format!("Tokenization failed: {e}"),
            })?;

        let rows: Vec<(&[u32], &[u32])> = encodings
            .iter()
            .map(|e| (e.get_ids(), e.get_attention_mask()))
            .collect();
        Ok(pack_tokens(&rows, self.pad_id))
    }
}

/// Lay out `(ids, attention_mask)` rows as fixed `[N, 77]` id and mask
/// buffers. Masked-out positions are written as `pad_id` with mask 0.
fn pack_tokens(rows: &[(&[u32], &[u32])], pad_id: u32) -> (Vec<i64>, Vec<i64>) {
    let mut ids = vec![pad_id as i64; rows.len() * CONTEXT_LENGTH];
    let mut mask = vec![0i64; rows.len() * CONTEXT_LENGTH];

    for (i, (row_ids, row_mask)) in rows.iter().enumerate() {
        let offset = i * CONTEXT_LENGTH;
        let pairs = row_ids.iter().zip(row_mask.iter()).take(CONTEXT_LENGTH);
        for (j, (&id, &attend)) in pairs.enumerate() {
            if attend != 0 {
                ids[offset + j] = id as i64;
                mask[offset + j] = 1;
            }
        }
        // Over-long prompts keep their end-of-text marker.
        if row_ids.len() > CONTEXT_LENGTH {
            ids[offset + CONTEXT_LENGTH - 1] = pad_id as i64;
        }
    }

    (ids, mask)
}

impl ImageTextEncoder for ClipEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_spec(&self) -> InputSpec {
        self.spec.clone()
    }

    fn encode_images(&self, batch: &[ModelInput]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let batch_size = batch.len();
        if batch_size == 0 {
            return Ok(vec![]);
        }

        let shape_0 = batch[0].shape();
        if let Some(t) = batch.iter().find(|t| t.shape() != shape_0) {
            return Err(PipelineError::Embedding {
                message: format!(
                    "Tensor shape mismatch in batch: expected {:?}, got {:?}",
                    shape_0,
                    t.shape()
                ),
            });
        }

        // Stack [3, H, W] tensors into one [N, 3, H, W] input.
        let mut flat = Vec::with_capacity(batch_size * batch[0].len());
        for t in batch {
            flat.extend(t.iter().copied());
        }
        let shape = vec![
            batch_size as i64,
            shape_0[0] as i64,
            shape_0[1] as i64,
            shape_0[2] as i64,
        ];

        let input = Value::from_array((shape, flat)).map_err(|e| PipelineError::Embedding {
            message: format!("Failed to create image tensor: {e}"),
        })?;

        let mut session = self.vision.lock().map_err(|e| PipelineError::Embedding {
            message: format!("Vision session lock poisoned: {e}"),
        })?;
        let outputs = session
            .run(ort::inputs![self.vision_input.as_str() => input])
            .map_err(|e| PipelineError::Embedding {
                message: format!("Vision inference failed: {e}"),
            })?;

        let (_, output) = outputs
            .iter()
            .find(|(name, _)| *name == "image_embeds")
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| PipelineError::Embedding {
                message: "Vision model produced no outputs".to_string(),
            })?;
        let (out_shape, data) =
            output
                .try_extract_tensor::<f32>()
                .map_err(|e| PipelineError::Embedding {
                    message: format!("Failed to extract image embeddings: {e}"),
                })?;

        split_rows(&out_shape[..], data, batch_size)
    }

    fn encode_text(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let batch_size = texts.len();
        if batch_size == 0 {
            return Ok(vec![]);
        }

        let (ids, mask) = self.tokenize(texts)?;
        let shape = vec![batch_size as i64, CONTEXT_LENGTH as i64];
        let ids = Value::from_array((shape.clone(), ids)).map_err(|e| PipelineError::Model {
            message: format!("Failed to create input_ids tensor: {e}"),
        })?;

        let mut session = self.text.lock().map_err(|e| PipelineError::Model {
            message: format!("Text session lock poisoned: {e}"),
        })?;
        let outputs = if self.text_takes_mask {
            let mask = Value::from_array((shape, mask)).map_err(|e| PipelineError::Model {
                message: format!("Failed to create attention_mask tensor: {e}"),
            })?;
            session.run(ort::inputs!["input_ids" => ids, "attention_mask" => mask])
        } else {
            session.run(ort::inputs!["input_ids" => ids])
        }
        .map_err(|e| PipelineError::Model {
            message: format!("Text inference failed: {e}"),
        })?;

        let (_, output) = outputs
            .iter()
            .find(|(name, _)| *name == "text_embeds")
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| PipelineError::Model {
                message: "Text model produced no outputs".to_string(),
            })?;
        let (out_shape, data) =
            output
                .try_extract_tensor::<f32>()
                .map_err(|e| PipelineError::Model {
                    message: format!("Failed to extract text embeddings: {e}"),
                })?;

        split_rows(&out_shape[..], data, batch_size)
    }
}

fn load_session(path: &Path) -> Result<Session, PipelineError> {
    Session::builder()
        .map_err(|e| PipelineError::Model {
            message: format!("Failed to create ONNX session builder: {e}"),
        })?
        .commit_from_file(path)
        .map_err(|e| PipelineError::Model {
            message: format!("Failed to load {:?}: {e}", path),
        })
}

/// Split a flat `[rows, dim]` output into one vector per row.
fn split_rows(shape: &[i64], data: &[f32], rows: usize) -> Result<Vec<Vec<f32>>, PipelineError> {
    let dim = match shape {
        [n, d] if *n as usize == rows => *d as usize,
        _ => {
            return Err(PipelineError::Embedding {
                message: format!("Unexpected embedding shape {shape:?} for {rows} inputs"),
            })
        }
    };
    if dim == 0 || data.len() != rows * dim {
        return Err(PipelineError::Embedding {
            message: format!("Embedding buffer of {} floats does not fit {shape:?}", data.len()),
        });
    }
    Ok(data.chunks(dim).map(<[f32]>::to_vec).collect())
}
