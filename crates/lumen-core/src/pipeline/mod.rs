//! Batched similarity-ranking pipeline.
//!
//! Stages, in data-flow order:
//! - **decode**: Format detection and EXIF orientation correction
//! - **preprocess**: Resize, crop and normalize into encoder tensors
//! - **batch**: Lazy fixed-size batching
//! - **scorer**: Cosine logits per prompt, weighted into one score per image
//! - **aggregate**: Global score vector and stable descending rank
//! - **policy**: User sort/filter policy
//! - **runner**: Run state machine and the batch loop
//! - **preview**: Score statistics for the preview step

pub mod aggregate;
pub mod batch;
pub mod cancel;
pub mod decode;
pub mod policy;
pub mod preprocess;
pub mod preview;
pub mod runner;
pub mod scorer;

// Re-exports for convenient access
pub use aggregate::{aggregate, rank};
pub use batch::{batch_count, batched, Batches};
pub use cancel::CancelToken;
pub use decode::{DecodedImage, ImageDecoder};
pub use policy::{FilterMode, OutputPolicy, SortOrder};
pub use preprocess::{ModelInput, Preprocessor};
pub use preview::{histogram, Preview, ScoreSummary, ThresholdPreview};
pub use runner::{Ranker, RunOptions, RunOutcome, RunProgress, RunResults, RunState, RunStatus};
pub use scorer::{combine_scores, score_batch, similarity_matrix, Scorer};
