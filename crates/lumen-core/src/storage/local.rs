//! Filesystem-backed collections.
//!
//! A collection is a directory and an image id is the path of an image file
//! inside it. Per-image metadata lives next to the image in
//! `<file>.meta.json`, annotations in `<file>.ann.json`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::config::ProcessingConfig;
use crate::error::PipelineError;
use crate::types::{CollectionId, ImageId, ImageMeta, ImageRecord};

use super::{Destination, SourceCollection, UploadItem};

const META_SUFFIX: &str = ".meta.json";
const ANNOTATION_SUFFIX: &str = ".ann.json";

/// Local directory store.
///
/// New collections are created under `root`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    config: ProcessingConfig,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, config: ProcessingConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check if a file has a supported extension.
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext_lower = ext.to_lowercase();
                self.config
                    .supported_formats
                    .iter()
                    .any(|fmt| fmt.to_lowercase() == ext_lower)
            })
            .unwrap_or(false)
    }

    fn scan(&self, dir: &Path) -> Result<Vec<ImageRecord>, PipelineError> {
        if !dir.is_dir() {
            return Err(PipelineError::Storage {
                message: format!("Collection {:?} is not a directory", dir),
            });
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && self.is_supported(p))
            .collect();
        // Sort by path for deterministic ordering
        paths.sort();

        let records = paths
            .into_iter()
            .map(|path| {
                let (width, height) = image::image_dimensions(&path).unwrap_or_else(|e| {
                    tracing::debug!("Cannot read dimensions of {:?}: {e}", path);
                    (0, 0)
                });
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let meta = read_meta(&path);
                ImageRecord {
                    id: ImageId(path.to_string_lossy().into_owned()),
                    name,
                    width,
                    height,
                    meta,
                }
            })
            .collect();
        Ok(records)
    }
}

#[async_trait]
impl SourceCollection for LocalStore {
    async fn list_images(
        &self,
        collection: &CollectionId,
    ) -> Result<Vec<ImageRecord>, PipelineError> {
        let store = self.clone();
        let dir = PathBuf::from(&collection.0);
        let records = tokio::task::spawn_blocking(move || store.scan(&dir))
            .await
            .map_err(|e| PipelineError::Storage {
                message: format!("Task join error: {e}"),
            })??;

        tracing::info!("Found {} images in {}", records.len(), collection);
        Ok(records)
    }

    async fn download_bytes(
        &self,
        _collection: &CollectionId,
        ids: &[ImageId],
    ) -> Result<Vec<Vec<u8>>, PipelineError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let bytes = tokio::fs::read(&id.0)
                .await
                .map_err(|e| PipelineError::Storage {
                    message: format!("Failed to read {id}: {e}"),
                })?;
            out.push(bytes);
        }
        Ok(out)
    }
}

#[async_trait]
impl Destination for LocalStore {
    async fn create_collection(&self, name: &str) -> Result<CollectionId, PipelineError> {
        let dir = unique_dir(&self.root, name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PipelineError::Storage {
                message: format!("Failed to create collection {:?}: {e}", dir),
            })?;
        tracing::info!("Created collection {:?}", dir);
        Ok(CollectionId(dir.to_string_lossy().into_owned()))
    }

    fn is_same_collection(&self, name: &str, source: &CollectionId) -> bool {
        let target = self.root.join(name);
        let source = Path::new(&source.0);
        match (target.canonicalize(), source.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => target == source,
        }
    }

    async fn upload(
        &self,
        collection: &CollectionId,
        items: Vec<UploadItem>,
    ) -> Result<Vec<ImageId>, PipelineError> {
        let dir = PathBuf::from(&collection.0);
        let mut ids = Vec::with_capacity(items.len());

        for item in items {
            let path = dir.join(&item.name);
            tokio::fs::write(&path, &item.bytes)
                .await
                .map_err(|e| storage_error("write", &path, e))?;
            if !item.meta.is_empty() {
                write_meta(&path, &item.meta).await?;
            }
            ids.push(ImageId(path.to_string_lossy().into_owned()));
        }

        tracing::debug!("Uploaded {} images to {}", ids.len(), collection);
        Ok(ids)
    }

    async fn copy_annotations(&self, src: &[ImageId], dst: &[ImageId]) -> Result<(), PipelineError> {
        if src.len() != dst.len() {
            return Err(PipelineError::InvalidArgument(format!(
                "{} source ids but {} destination ids",
                src.len(),
                dst.len()
            )));
        }

        let mut copied = 0;
        for (s, d) in src.iter().zip(dst) {
            let from = sidecar(Path::new(&s.0), ANNOTATION_SUFFIX);
            if !from.exists() {
                continue;
            }
            let to = sidecar(Path::new(&d.0), ANNOTATION_SUFFIX);
            tokio::fs::copy(&from, &to)
                .await
                .map_err(|e| storage_error("copy", &from, e))?;
            copied += 1;
        }

        tracing::debug!("Copied {copied} annotation file(s)");
        Ok(())
    }

    async fn add_score_tag(
        &self,
        image: &ImageId,
        tag: &str,
        value: f32,
    ) -> Result<(), PipelineError> {
        let path = PathBuf::from(&image.0);
        let mut meta = read_meta(&path);

        let tags = meta
            .entry("tags".to_string())
            .or_insert_with(|| serde_json::Value::Object(Default::default()));
        if !tags.is_object() {
            *tags = serde_json::Value::Object(Default::default());
        }
        if let Some(tags) = tags.as_object_mut() {
            let rounded = (value as f64 * 10_000.0).round() / 10_000.0;
            tags.insert(tag.to_string(), serde_json::json!(rounded));
        }

        write_meta(&path, &meta).await
    }
}

/// `<path>` with `suffix` appended to the full file name.
fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn read_meta(path: &Path) -> ImageMeta {
    let meta_path = sidecar(path, META_SUFFIX);
    let Ok(content) = std::fs::read_to_string(&meta_path) else {
        return ImageMeta::new();
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!("Ignoring malformed metadata {:?}: {e}", meta_path);
        ImageMeta::new()
    })
}

async fn write_meta(path: &Path, meta: &ImageMeta) -> Result<(), PipelineError> {
    let meta_path = sidecar(path, META_SUFFIX);
    let json = serde_json::to_vec_pretty(meta).map_err(|e| PipelineError::Storage {
        message: format!("Failed to serialize metadata for {:?}: {e}", path),
    })?;
    tokio::fs::write(&meta_path, json)
        .await
        .map_err(|e| storage_error("write", &meta_path, e))
}

/// First of `name`, `name_001`, `name_002`, ... not yet present under `root`.
fn unique_dir(root: &Path, name: &str) -> PathBuf {
    let candidate = root.join(name);
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| root.join(format!("{name}_{n:03}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

fn storage_error(action: &str, path: &Path, e: std::io::Error) -> PipelineError {
    PipelineError::Storage {
        message: format!("Failed to {action} {:?}: {e}", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn store(root: &Path) -> LocalStore {
        LocalStore::new(root, ProcessingConfig::default())
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([1, 2, 3]))
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_images_sorted_with_dimensions_and_meta() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("b.png"), 4, 2);
        write_png(&dir.path().join("a.png"), 3, 5);
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();
        std::fs::write(
            dir.path().join("a.png.meta.json"),
            br#"{"camera": "x100"}"#,
        )
        .unwrap();

        let collection = CollectionId(dir.path().to_string_lossy().into_owned());
        let images = store(dir.path()).list_images(&collection).await.unwrap();

        assert_eq!(images.len(), 2);
        assert_eq!(images[0].name, "a.png");
        assert_eq!((images[0].width, images[0].height), (3, 5));
        assert_eq!(images[0].meta["camera"], "x100");
        assert_eq!(images[1].name, "b.png");
        assert!(images[1].meta.is_empty());
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let collection = CollectionId(dir.path().join("nope").to_string_lossy().into_owned());
        let err = store(dir.path()).list_images(&collection).await.unwrap_err();
        assert!(matches!(err, PipelineError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_download_bytes_aligned_to_ids() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.jpg"), b"1").unwrap();
        std::fs::write(dir.path().join("two.jpg"), b"22").unwrap();

        let ids = vec![
            ImageId(dir.path().join("two.jpg").to_string_lossy().into_owned()),
            ImageId(dir.path().join("one.jpg").to_string_lossy().into_owned()),
        ];
        let collection = CollectionId(dir.path().to_string_lossy().into_owned());
        let bytes = store(dir.path())
            .download_bytes(&collection, &ids)
            .await
            .unwrap();
        assert_eq!(bytes, vec![b"22".to_vec(), b"1".to_vec()]);
    }

    #[tokio::test]
    async fn test_create_collection_renames_on_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let first = store.create_collection("ranked").await.unwrap();
        let second = store.create_collection("ranked").await.unwrap();
        let third = store.create_collection("ranked").await.unwrap();

        assert!(first.0.ends_with("ranked"));
        assert!(second.0.ends_with("ranked_001"));
        assert!(third.0.ends_with("ranked_002"));
    }

    #[tokio::test]
    async fn test_upload_writes_bytes_and_meta() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let collection = store.create_collection("out").await.unwrap();

        let mut meta = ImageMeta::new();
        meta.insert("k".to_string(), serde_json::json!("v"));
        let ids = store
            .upload(
                &collection,
                vec![
                    UploadItem {
                        name: "00000_a.png".to_string(),
                        bytes: b"abc".to_vec(),
                        meta,
                    },
                    UploadItem {
                        name: "00001_b.png".to_string(),
                        bytes: b"def".to_vec(),
                        meta: ImageMeta::new(),
                    },
                ],
            )
            .await
            .unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(std::fs::read(&ids[0].0).unwrap(), b"abc");
        assert!(Path::new(&format!("{}.meta.json", ids[0].0)).exists());
        assert!(!Path::new(&format!("{}.meta.json", ids[1].0)).exists());
    }

    #[tokio::test]
    async fn test_copy_annotations_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let src_a = dir.path().join("a.png");
        let src_b = dir.path().join("b.png");
        std::fs::write(sidecar(&src_a, ANNOTATION_SUFFIX), br#"{"boxes": []}"#).unwrap();

        let dst_a = dir.path().join("x.png");
        let dst_b = dir.path().join("y.png");
        let to_id = |p: &PathBuf| ImageId(p.to_string_lossy().into_owned());

        store(dir.path())
            .copy_annotations(&[to_id(&src_a), to_id(&src_b)], &[to_id(&dst_a), to_id(&dst_b)])
            .await
            .unwrap();

        assert!(sidecar(&dst_a, ANNOTATION_SUFFIX).exists());
        assert!(!sidecar(&dst_b, ANNOTATION_SUFFIX).exists());
    }

    #[tokio::test]
    async fn test_copy_annotations_rejects_misaligned_ids() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(dir.path())
            .copy_annotations(&[ImageId::from("a")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_add_score_tag_merges_into_existing_meta() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("a.png");
        std::fs::write(sidecar(&image, META_SUFFIX), br#"{"camera": "x100"}"#).unwrap();
        let id = ImageId(image.to_string_lossy().into_owned());

        store(dir.path())
            .add_score_tag(&id, "CLIP score (cat)", 0.123456)
            .await
            .unwrap();

        let meta = read_meta(&image);
        assert_eq!(meta["camera"], "x100");
        assert_eq!(meta["tags"]["CLIP score (cat)"], serde_json::json!(0.1235));
    }

    #[test]
    fn test_same_collection_detection() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("photos")).unwrap();
        let source = CollectionId(dir.path().join("photos").to_string_lossy().into_owned());
        let store = store(dir.path());

        assert!(store.is_same_collection("photos", &source));
        assert!(!store.is_same_collection("ranked", &source));
    }

    #[test]
    fn test_sidecar_appends_suffix() {
        assert_eq!(
            sidecar(Path::new("/data/a.jpg"), ".ann.json"),
            PathBuf::from("/data/a.jpg.ann.json")
        );
    }
}
