//! Access to the data platform holding source and destination collections.
//!
//! The ranking pipeline reads through [`SourceCollection`] and the export
//! stage writes through [`Destination`]. Neither retries on failure.

pub mod local;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::types::{CollectionId, ImageId, ImageMeta, ImageRecord};

pub use self::local::LocalStore;

/// One image to upload to a destination collection.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub name: String,
    pub bytes: Vec<u8>,
    pub meta: ImageMeta,
}

/// Read access to an existing image collection.
#[async_trait]
pub trait SourceCollection: Send + Sync {
    /// All images in the collection, in a stable order.
    async fn list_images(&self, collection: &CollectionId)
        -> Result<Vec<ImageRecord>, PipelineError>;

    /// Raw bytes for `ids`, aligned to the order of `ids`.
    async fn download_bytes(
        &self,
        collection: &CollectionId,
        ids: &[ImageId],
    ) -> Result<Vec<Vec<u8>>, PipelineError>;
}

/// Write access for exporting a ranked selection.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Create a new collection named `name` (or a close variant of it).
    async fn create_collection(&self, name: &str) -> Result<CollectionId, PipelineError>;

    /// Whether a collection named `name` would be `source` itself.
    fn is_same_collection(&self, name: &str, source: &CollectionId) -> bool {
        name == source.0
    }

    /// Upload items and return their new ids, aligned to `items`.
    async fn upload(
        &self,
        collection: &CollectionId,
        items: Vec<UploadItem>,
    ) -> Result<Vec<ImageId>, PipelineError>;

    /// Copy annotations from each `src` image to the `dst` image at the same position.
    async fn copy_annotations(&self, src: &[ImageId], dst: &[ImageId])
        -> Result<(), PipelineError>;

    /// Attach a numeric tag to an uploaded image.
    async fn add_score_tag(
        &self,
        image: &ImageId,
        tag: &str,
        value: f32,
    ) -> Result<(), PipelineError>;
}
