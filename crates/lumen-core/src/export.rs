//! Export of a ranked selection into a new collection.
//!
//! Nothing is written until the policy and destination have been validated.
//! Images are uploaded in their final order, renamed with a zero-padded
//! position prefix, and carry their own score in metadata (and optionally as
//! a tag).

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::config::ExportConfig;
use crate::error::{PipelineError, Result, ValidationError};
use crate::pipeline::{OutputPolicy, RunState};
use crate::storage::{Destination, SourceCollection, UploadItem};
use crate::types::{CollectionId, ImageId, RankedImage};

/// Metadata key holding the per-image prompt score.
pub const CONFIDENCE_META_KEY: &str = "Prompt based confidence";

/// Export settings for one export.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Destination collection name; a timestamped name is used when absent
    pub collection_name: Option<String>,
    pub upload_batch_size: usize,
    pub add_score_tag: bool,
}

impl From<&ExportConfig> for ExportOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            collection_name: None,
            upload_batch_size: config.upload_batch_size,
            add_score_tag: config.add_score_tag,
        }
    }
}

/// What an export produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub collection: CollectionId,
    pub uploaded: Vec<ImageId>,
    pub count: usize,
}

/// Copies ranked images from the source into a destination collection.
pub struct Exporter {
    source: Arc<dyn SourceCollection>,
    destination: Arc<dyn Destination>,
    options: ExportOptions,
}

impl Exporter {
    pub fn new(
        source: Arc<dyn SourceCollection>,
        destination: Arc<dyn Destination>,
        options: ExportOptions,
    ) -> Self {
        Self {
            source,
            destination,
            options,
        }
    }

    /// Export the last completed run of `state` under `policy`.
    ///
    /// `on_progress` receives `(uploaded, total)` after every upload batch.
    pub async fn export<F>(
        &self,
        state: &RunState,
        policy: &OutputPolicy,
        mut on_progress: F,
    ) -> Result<ExportReport>
    where
        F: FnMut(usize, usize),
    {
        let results = state.results().ok_or(ValidationError::NoCompletedRun)?;
        if self.options.upload_batch_size == 0 {
            return Err(PipelineError::InvalidArgument(
                "upload batch size must be a positive integer".to_string(),
            )
            .into());
        }

        let ranked = results.apply(policy)?;
        let label = results.prompts.label();
        let name = self
            .options
            .collection_name
            .clone()
            .unwrap_or_else(|| default_collection_name(&label, &chrono::Local::now().naive_local()));

        if self.destination.is_same_collection(&name, &results.collection) {
            return Err(ValidationError::SameSourceAsDestination(name).into());
        }

        let collection = self.destination.create_collection(&name).await?;
        tracing::info!(
            "Exporting {} of {} images to {}",
            ranked.len(),
            results.images.len(),
            collection
        );

        let total = ranked.len();
        let mut uploaded = Vec::with_capacity(total);

        for chunk in ranked.chunks(self.options.upload_batch_size) {
            let src_ids: Vec<ImageId> = chunk.iter().map(|r| r.id.clone()).collect();
            let bytes = self
                .source
                .download_bytes(&results.collection, &src_ids)
                .await?;
            if bytes.len() != chunk.len() {
                return Err(PipelineError::Storage {
                    message: format!(
                        "Requested {} images but received {}",
                        chunk.len(),
                        bytes.len()
                    ),
                }
                .into());
            }

            let items = chunk
                .iter()
                .zip(bytes)
                .map(|(r, bytes)| UploadItem {
                    name: export_name(r),
                    bytes,
                    meta: {
                        let mut meta = results.images[r.source_index].meta.clone();
                        meta.insert(
                            CONFIDENCE_META_KEY.to_string(),
                            serde_json::Value::String(confidence_label(&label, r.score)),
                        );
                        meta
                    },
                })
                .collect();

            let new_ids = self.destination.upload(&collection, items).await?;
            if new_ids.len() != chunk.len() {
                return Err(PipelineError::LengthMismatch {
                    expected: chunk.len(),
                    actual: new_ids.len(),
                }
                .into());
            }
            self.destination.copy_annotations(&src_ids, &new_ids).await?;

            if self.options.add_score_tag {
                let tag = score_tag(&label);
                for (id, r) in new_ids.iter().zip(chunk) {
                    self.destination.add_score_tag(id, &tag, r.score).await?;
                }
            }

            uploaded.extend(new_ids);
            tracing::debug!("Uploaded {}/{}", uploaded.len(), total);
            on_progress(uploaded.len(), total);
        }

        tracing::info!("Export complete: {} images in {}", uploaded.len(), collection);
        Ok(ExportReport {
            collection,
            count: uploaded.len(),
            uploaded,
        })
    }
}

/// `"{YYYY-MM-DD HH:MM}_({prompt})"`.
pub fn default_collection_name(prompt_label: &str, now: &NaiveDateTime) -> String {
    format!("{}_({})", now.format("%Y-%m-%d %H:%M"), prompt_label)
}

/// Uploaded file name: zero-padded output position, then the original name.
pub fn export_name(image: &RankedImage) -> String {
    format!("{:05}_{}", image.position, image.name)
}

pub fn confidence_label(prompt_label: &str, score: f32) -> String {
    format!("{prompt_label} - {score:.4}")
}

pub fn score_tag(prompt_label: &str) -> String {
    format!("CLIP score ({prompt_label})")
}
