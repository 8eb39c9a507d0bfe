//! Run orchestration: the state machine and the batched ranking loop.
//!
//! A run moves `Idle → Preparing → Running → Completed | Cancelled`. Results
//! are written into [`RunState`] in one step when the last batch has been
//! scored; a cancelled or failed run leaves no partial results behind.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::config::{Config, LimitsConfig};
use crate::encoder::ImageTextEncoder;
use crate::error::{PipelineError, Result, ValidationError};
use crate::storage::SourceCollection;
use crate::types::{CollectionId, ImageId, ImageRecord, PromptSet, RankedImage, SkippedImage};

use super::aggregate::{aggregate, rank};
use super::batch::{batch_count, batched};
use super::cancel::CancelToken;
use super::policy::OutputPolicy;
use super::preprocess::{ModelInput, Preprocessor};
use super::scorer::Scorer;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Preparing,
    Running,
    Completed,
    Cancelled,
}

impl RunStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Preparing | Self::Running)
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct RunResults {
    pub collection: CollectionId,
    pub model: String,
    pub prompts: PromptSet,
    /// Scored images in source order
    pub images: Vec<ImageRecord>,
    /// One score per entry in `images`
    pub scores: Vec<f32>,
    /// Descending rank permutation over `scores`
    pub ranking: Vec<usize>,
    /// Images dropped because they could not be decoded
    pub skipped: Vec<SkippedImage>,
}

impl RunResults {
    /// Images and scores after the user's sort/filter policy.
    pub fn apply(&self, policy: &OutputPolicy) -> Result<Vec<RankedImage>> {
        policy.apply(&self.images, &self.scores)
    }

    /// Scores in descending order.
    pub fn ranked_scores(&self) -> Vec<f32> {
        self.ranking.iter().map(|&i| self.scores[i]).collect()
    }
}

/// Selected source, run status and the results of the last completed run.
#[derive(Debug, Clone)]
pub struct RunState {
    source: Option<CollectionId>,
    status: RunStatus,
    results: Option<RunResults>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            source: None,
            status: RunStatus::Idle,
            results: None,
        }
    }
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the source collection. Any previous results are discarded.
    pub fn select_source(&mut self, collection: CollectionId) {
        self.source = Some(collection);
        self.results = None;
        self.status = RunStatus::Idle;
    }

    pub fn source(&self) -> Option<&CollectionId> {
        self.source.as_ref()
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Results of the last completed run, if any.
    pub fn results(&self) -> Option<&RunResults> {
        self.results.as_ref()
    }

    /// Enter `Preparing`, discarding prior results.
    ///
    /// Fails without touching the state when a run is already active, the
    /// prompt set is blank, or no source is selected.
    pub fn begin(
        &mut self,
        prompts: &PromptSet,
    ) -> std::result::Result<CollectionId, ValidationError> {
        if self.status.is_active() {
            return Err(ValidationError::RunInProgress);
        }
        if prompts.is_blank() {
            return Err(ValidationError::MissingInput(
                "at least one non-empty prompt is required".to_string(),
            ));
        }
        let source = self.source.clone().ok_or_else(|| {
            ValidationError::MissingInput("no source collection selected".to_string())
        })?;

        self.results = None;
        self.status = RunStatus::Preparing;
        Ok(source)
    }

    fn mark_running(&mut self) {
        self.status = RunStatus::Running;
    }

    fn complete(&mut self, results: RunResults) {
        self.results = Some(results);
        self.status = RunStatus::Completed;
    }

    fn cancel(&mut self) {
        self.results = None;
        self.status = RunStatus::Cancelled;
    }

    fn fail(&mut self) {
        self.results = None;
        self.status = RunStatus::Idle;
    }
}

/// Per-batch progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunProgress {
    /// Batches finished so far (1-based after the first batch)
    pub batches_done: usize,
    pub total_batches: usize,
    pub scored: usize,
    pub skipped: usize,
}

/// How a run that did not fail ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        scored: usize,
        skipped: usize,
        elapsed: Duration,
    },
    Cancelled {
        batches_done: usize,
        total_batches: usize,
    },
}

/// Knobs for a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub batch_size: usize,
    pub limits: LimitsConfig,
}

impl From<&Config> for RunOptions {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.inference.batch_size,
            limits: config.limits.clone(),
        }
    }
}

/// Runs the batched ranking pipeline against one source.
pub struct Ranker {
    encoder: Arc<dyn ImageTextEncoder>,
    source: Arc<dyn SourceCollection>,
    options: RunOptions,
}

impl Ranker {
    pub fn new(
        encoder: Arc<dyn ImageTextEncoder>,
        source: Arc<dyn SourceCollection>,
        options: RunOptions,
    ) -> Self {
        Self {
            encoder,
            source,
            options,
        }
    }

    /// Score every image of the selected source against `prompts`.
    ///
    /// `cancel` is polled before each batch. On success the results are in
    /// `state.results()`. Any error returns the state to `Idle`.
    pub async fn run<F>(
        &self,
        state: &mut RunState,
        prompts: &PromptSet,
        cancel: &CancelToken,
        on_progress: F,
    ) -> Result<RunOutcome>
    where
        F: FnMut(RunProgress),
    {
        let collection = state.begin(prompts)?;

        match self
            .execute(state, collection, prompts, cancel, on_progress)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                state.fail();
                Err(e.into())
            }
        }
    }

    async fn execute<F>(
        &self,
        state: &mut RunState,
        collection: CollectionId,
        prompts: &PromptSet,
        cancel: &CancelToken,
        mut on_progress: F,
    ) -> std::result::Result<RunOutcome, PipelineError>
    where
        F: FnMut(RunProgress),
    {
        let start = Instant::now();
        let batch_size = self.options.batch_size;

        let images = self.source.list_images(&collection).await?;
        let batches = batched(images.iter().enumerate(), batch_size)?;
        let total_batches = batch_count(images.len(), batch_size);

        let encoder = Arc::clone(&self.encoder);
        let prompt_set = prompts.clone();
        let scorer = Arc::new(
            blocking("prompt encoding", move || Scorer::new(encoder, &prompt_set)).await?,
        );
        let preprocessor = Preprocessor::new(self.encoder.input_spec(), self.options.limits.clone());

        state.mark_running();
        tracing::info!(
            "Ranking {} images in {} batch(es) of up to {} with {}",
            images.len(),
            total_batches,
            batch_size,
            self.encoder.name()
        );

        let mut scored: Vec<ImageRecord> = Vec::with_capacity(images.len());
        let mut batch_scores: Vec<Vec<f32>> = Vec::with_capacity(total_batches);
        let mut skipped: Vec<SkippedImage> = Vec::new();

        for (batch_idx, batch) in batches.enumerate() {
            if cancel.is_cancelled() {
                tracing::info!("Run cancelled after {batch_idx}/{total_batches} batches");
                state.cancel();
                return Ok(RunOutcome::Cancelled {
                    batches_done: batch_idx,
                    total_batches,
                });
            }

            let batch_start = Instant::now();
            let ids: Vec<ImageId> = batch.iter().map(|(_, r)| r.id.clone()).collect();
            let bytes = self.source.download_bytes(&collection, &ids).await?;
            if bytes.len() != ids.len() {
                return Err(PipelineError::Storage {
                    message: format!(
                        "Requested {} images but received {}",
                        ids.len(),
                        bytes.len()
                    ),
                });
            }

            let inputs = self.preprocess_batch(&preprocessor, &ids, bytes).await;

            let mut tensors: Vec<ModelInput> = Vec::with_capacity(inputs.len());
            let mut kept: Vec<&ImageRecord> = Vec::with_capacity(inputs.len());
            for ((index, record), input) in batch.iter().zip(inputs) {
                match input {
                    Ok(tensor) => {
                        tensors.push(tensor);
                        kept.push(*record);
                    }
                    Err(e) => {
                        tracing::warn!("Skipping {}: {}", record.id, e);
                        skipped.push(SkippedImage {
                            index: *index,
                            id: record.id.clone(),
                            name: record.name.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
            if tensors.is_empty() {
                return Err(PipelineError::BatchFailed {
                    batch: batch_idx,
                    size: batch.len(),
                });
            }

            let batch_scorer = Arc::clone(&scorer);
            let scores = blocking("scoring", move || {
                let logits = batch_scorer.score_batch(&tensors)?;
                Ok(batch_scorer.combine(&logits))
            })
            .await?;
            if scores.len() != kept.len() {
                return Err(PipelineError::LengthMismatch {
                    expected: kept.len(),
                    actual: scores.len(),
                });
            }

            scored.extend(kept.into_iter().cloned());
            batch_scores.push(scores);
            tracing::debug!(
                "Batch {}/{}: {} scored, {} skipped so far",
                batch_idx + 1,
                total_batches,
                scored.len(),
                skipped.len()
            );
            tracing::trace!("  Batch time: {:?}", batch_start.elapsed());

            on_progress(RunProgress {
                batches_done: batch_idx + 1,
                total_batches,
                scored: scored.len(),
                skipped: skipped.len(),
            });
        }

        let scores = aggregate(batch_scores);
        let ranking = rank(&scores, scored.len())?;
        let elapsed = start.elapsed();
        tracing::info!(
            "Ranked {} images ({} skipped) in {:.1}s",
            scored.len(),
            skipped.len(),
            elapsed.as_secs_f64()
        );

        let outcome = RunOutcome::Completed {
            scored: scored.len(),
            skipped: skipped.len(),
            elapsed,
        };
        state.complete(RunResults {
            collection,
            model: self.encoder.name().to_string(),
            prompts: prompts.clone(),
            images: scored,
            scores,
            ranking,
            skipped,
        });
        Ok(outcome)
    }

    /// Decode and preprocess one batch off the async runtime. Each image is
    /// bounded by the decode timeout on its own; failures are returned in place.
    async fn preprocess_batch(
        &self,
        preprocessor: &Preprocessor,
        ids: &[ImageId],
        bytes: Vec<Vec<u8>>,
    ) -> Vec<std::result::Result<ModelInput, PipelineError>> {
        let timeout_ms = self.options.limits.decode_timeout_ms;
        let mut inputs = Vec::with_capacity(bytes.len());

        for (b, id) in bytes.into_iter().zip(ids) {
            let preprocessor = preprocessor.clone();
            let id = id.0.clone();
            inputs.push(
                bounded_decode(timeout_ms, id.clone(), move || preprocessor.preprocess(&b, &id))
                    .await,
            );
        }

        inputs
    }
}

/// Run one image's decode work on the blocking pool under `timeout_ms`.
///
/// A timed-out image is reported as [`PipelineError::Timeout`]; the blocking
/// task is left to finish in the background.
async fn bounded_decode<F>(
    timeout_ms: u64,
    id: String,
    f: F,
) -> std::result::Result<ModelInput, PipelineError>
where
    F: FnOnce() -> std::result::Result<ModelInput, PipelineError> + Send + 'static,
{
    let result = timeout(Duration::from_millis(timeout_ms), async {
        tokio::task::spawn_blocking(f).await
    })
    .await;

    match result {
        Ok(Ok(input)) => input,
        Ok(Err(e)) => Err(PipelineError::Decode {
            id,
            message: format!("Task join error: {e}"),
        }),
        Err(_) => Err(PipelineError::Timeout {
            stage: "decode".to_string(),
            timeout_ms,
        }),
    }
}

/// Run blocking encoder work on the blocking pool.
async fn blocking<T, F>(stage: &str, f: F) -> std::result::Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce() -> std::result::Result<T, PipelineError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Embedding {
            message: format!("{stage} task failed: {e}"),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::InputSpec;
    use crate::error::LumenError;
    use crate::types::ImageMeta;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds an image as its mean red and blue intensity; text "red" is
    /// `[1, 0]`, anything else `[0, 1]`.
    struct ColorEncoder {
        image_calls: AtomicUsize,
    }

    impl ImageTextEncoder for ColorEncoder {
        fn name(&self) -> &str {
            "color"
        }

        fn input_spec(&self) -> InputSpec {
            InputSpec {
                image_size: 4,
                mean: [0.0; 3],
                std: [1.0; 3],
            }
        }

        fn encode_images(
            &self,
            batch: &[ModelInput],
        ) -> std::result::Result<Vec<Vec<f32>>, PipelineError> {
            self.image_calls.fetch_add(1, Ordering::SeqCst);
            Ok(batch
                .iter()
                .map(|t| {
                    let red = t.index_axis(ndarray::Axis(0), 0).mean().unwrap_or(0.0);
                    let blue = t.index_axis(ndarray::Axis(0), 2).mean().unwrap_or(0.0);
                    vec![red + 1e-3, blue + 1e-3]
                })
                .collect())
        }

        fn encode_text(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, PipelineError> {
            Ok(texts
                .iter()
                .map(|t| if t == "red" { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
                .collect())
        }
    }

    /// In-memory source: one entry per image, `None` bytes decode as garbage.
    struct MemorySource {
        images: Vec<(ImageRecord, Vec<u8>)>,
    }

    #[async_trait]
    impl SourceCollection for MemorySource {
        async fn list_images(
            &self,
            _collection: &CollectionId,
        ) -> std::result::Result<Vec<ImageRecord>, PipelineError> {
            Ok(self.images.iter().map(|(r, _)| r.clone()).collect())
        }

        async fn download_bytes(
            &self,
            _collection: &CollectionId,
            ids: &[ImageId],
        ) -> std::result::Result<Vec<Vec<u8>>, PipelineError> {
            Ok(ids
                .iter()
                .filter_map(|id| {
                    self.images
                        .iter()
                        .find(|(r, _)| &r.id == id)
                        .map(|(_, b)| b.clone())
                })
                .collect())
        }
    }

    fn png(red: u8, blue: u8) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(6, 6, Rgb([red, 0, blue])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn record(name: &str) -> ImageRecord {
        ImageRecord {
            id: ImageId::from(name),
            name: name.to_string(),
            width: 6,
            height: 6,
            meta: ImageMeta::new(),
        }
    }

    fn ranker(images: Vec<(ImageRecord, Vec<u8>)>, batch_size: usize) -> (Ranker, Arc<ColorEncoder>) {
        let encoder = Arc::new(ColorEncoder {
            image_calls: AtomicUsize::new(0),
        });
        let ranker = Ranker::new(
            encoder.clone(),
            Arc::new(MemorySource { images }),
            RunOptions {
                batch_size,
                limits: LimitsConfig::default(),
            },
        );
        (ranker, encoder)
    }

    fn dataset() -> Vec<(ImageRecord, Vec<u8>)> {
        vec![
            (record("dim.png"), png(40, 200)),
            (record("red.png"), png(250, 10)),
            (record("mid.png"), png(150, 150)),
            (record("blue.png"), png(5, 250)),
            (record("warm.png"), png(200, 60)),
        ]
    }

    fn selected_state() -> RunState {
        let mut state = RunState::new();
        state.select_source(CollectionId::from("memory"));
        state
    }

    #[tokio::test]
    async fn test_run_completes_with_full_results() {
        let (ranker, encoder) = ranker(dataset(), 2);
        let mut state = selected_state();
        let mut progress = Vec::new();

        let outcome = ranker
            .run(&mut state, &PromptSet::single("red"), &CancelToken::new(), |p| {
                progress.push(p)
            })
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Completed { scored: 5, skipped: 0, .. }));
        assert_eq!(state.status(), RunStatus::Completed);
        assert_eq!(encoder.image_calls.load(Ordering::SeqCst), 3);
        assert_eq!(progress.len(), 3);
        assert_eq!(progress[2].batches_done, 3);

        let results = state.results().unwrap();
        assert_eq!(results.scores.len(), 5);
        assert_eq!(results.model, "color");
        assert_eq!(results.images[results.ranking[0]].name, "red.png");
        assert_eq!(results.images[results.ranking[4]].name, "blue.png");
    }

    #[tokio::test]
    async fn test_scores_do_not_depend_on_batch_size() {
        let mut reference: Option<Vec<f32>> = None;
        for batch_size in [1, 2, 3, 5, 64] {
            let (ranker, _) = ranker(dataset(), batch_size);
            let mut state = selected_state();
            ranker
                .run(&mut state, &PromptSet::single("red"), &CancelToken::new(), |_| {})
                .await
                .unwrap();
            let scores = state.results().unwrap().scores.clone();
            match &reference {
                None => reference = Some(scores),
                Some(expected) => {
                    for (a, b) in expected.iter().zip(&scores) {
                        assert!((a - b).abs() < 1e-6, "batch size {batch_size}");
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_undecodable_image_is_skipped_and_recorded() {
        let mut images = dataset();
        images.insert(2, (record("broken.jpg"), b"not an image".to_vec()));
        let (ranker, _) = ranker(images, 2);
        let mut state = selected_state();

        let outcome = ranker
            .run(&mut state, &PromptSet::single("red"), &CancelToken::new(), |_| {})
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Completed { scored: 5, skipped: 1, .. }));
        let results = state.results().unwrap();
        assert_eq!(results.images.len(), results.scores.len());
        assert_eq!(results.skipped.len(), 1);
        assert_eq!(results.skipped[0].index, 2);
        assert_eq!(results.skipped[0].name, "broken.jpg");
        assert!(results.images.iter().all(|r| r.name != "broken.jpg"));
    }

    #[tokio::test]
    async fn test_batch_with_no_decodable_image_aborts() {
        let images = vec![
            (record("a.png"), png(10, 10)),
            (record("x.jpg"), b"garbage".to_vec()),
            (record("y.jpg"), b"garbage".to_vec()),
        ];
        let (ranker, _) = ranker(images, 1);
        let mut state = selected_state();

        let err = ranker
            .run(&mut state, &PromptSet::single("red"), &CancelToken::new(), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LumenError::Pipeline(PipelineError::BatchFailed { batch: 1, size: 1 })
        ));
        assert_eq!(state.status(), RunStatus::Idle);
        assert!(state.results().is_none());
    }

    #[tokio::test]
    async fn test_cancel_between_batches() {
        let (ranker, encoder) = ranker(dataset(), 2);
        let mut state = selected_state();
        let cancel = CancelToken::new();
        let handle = cancel.clone();

        let outcome = ranker
            .run(&mut state, &PromptSet::single("red"), &cancel, |p| {
                if p.batches_done == 1 {
                    handle.cancel();
                }
            })
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Cancelled {
                batches_done: 1,
                total_batches: 3
            }
        );
        assert_eq!(state.status(), RunStatus::Cancelled);
        assert!(state.results().is_none());
        // The in-flight batch finished; no further batch started.
        assert_eq!(encoder.image_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_prompt_keeps_idle() {
        let (ranker, _) = ranker(dataset(), 2);
        let mut state = selected_state();

        let err = ranker
            .run(&mut state, &PromptSet::single("  "), &CancelToken::new(), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LumenError::Validation(ValidationError::MissingInput(_))
        ));
        assert_eq!(state.status(), RunStatus::Idle);
    }

    #[tokio::test]
    async fn test_missing_source_keeps_idle() {
        let (ranker, _) = ranker(dataset(), 2);
        let mut state = RunState::new();

        let err = ranker
            .run(&mut state, &PromptSet::single("red"), &CancelToken::new(), |_| {})
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LumenError::Validation(ValidationError::MissingInput(_))
        ));
        assert_eq!(state.status(), RunStatus::Idle);
    }

    #[tokio::test]
    async fn test_new_run_replaces_previous_results() {
        let (ranker, _) = ranker(dataset(), 2);
        let mut state = selected_state();

        ranker
            .run(&mut state, &PromptSet::single("red"), &CancelToken::new(), |_| {})
            .await
            .unwrap();
        ranker
            .run(&mut state, &PromptSet::single("blue"), &CancelToken::new(), |_| {})
            .await
            .unwrap();

        let results = state.results().unwrap();
        assert_eq!(results.prompts.label(), "blue");
        assert_eq!(results.images[results.ranking[0]].name, "blue.png");
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_invalid_argument() {
        let (ranker, _) = ranker(dataset(), 0);
        let mut state = selected_state();

        let err = ranker
            .run(&mut state, &PromptSet::single("red"), &CancelToken::new(), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LumenError::Pipeline(PipelineError::InvalidArgument(_))
        ));
        assert_eq!(state.status(), RunStatus::Idle);
    }

    #[tokio::test]
    async fn test_slow_decode_times_out_alone() {
        let err = bounded_decode(20, "slow.png".to_string(), || {
            std::thread::sleep(Duration::from_millis(300));
            Ok(ModelInput::zeros((3, 4, 4)))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::Timeout { timeout_ms: 20, .. }));

        let ok = bounded_decode(5_000, "fast.png".to_string(), || {
            Ok(ModelInput::zeros((3, 4, 4)))
        })
        .await
        .unwrap();
        assert_eq!(ok.shape(), &[3, 4, 4]);
    }

    #[tokio::test]
    async fn test_decode_timeout_applies_per_image_not_per_batch() {
        let big = {
            let img = DynamicImage::ImageRgb8(RgbImage::from_fn(1200, 1200, |x, y| {
                Rgb([(x % 251) as u8, (y % 241) as u8, ((x ^ y) % 239) as u8])
            }));
            let mut buf = Cursor::new(Vec::new());
            img.write_to(&mut buf, ImageFormat::Png).unwrap();
            buf.into_inner()
        };
        let spec = InputSpec {
            image_size: 4,
            mean: [0.0; 3],
            std: [1.0; 3],
        };
        let started = Instant::now();
        Preprocessor::new(spec, LimitsConfig::default())
            .preprocess(&big, "probe")
            .unwrap();
        let single_ms = started.elapsed().as_millis() as u64;
        let limit_ms = (single_ms * 4).max(20);

        let images: Vec<(ImageRecord, Vec<u8>)> = (0..16)
            .map(|i| (record(&format!("big_{i:02}.png")), big.clone()))
            .collect();
        let encoder = Arc::new(ColorEncoder {
            image_calls: AtomicUsize::new(0),
        });
        let ranker = Ranker::new(
            encoder,
            Arc::new(MemorySource { images }),
            RunOptions {
                batch_size: 16,
                limits: LimitsConfig {
                    decode_timeout_ms: limit_ms,
                    ..LimitsConfig::default()
                },
            },
        );
        let mut state = selected_state();

        let outcome = ranker
            .run(&mut state, &PromptSet::single("red"), &CancelToken::new(), |_| {})
            .await
            .unwrap();

        match outcome {
            RunOutcome::Completed {
                scored, skipped, ..
            } => {
                assert_eq!(scored + skipped, 16);
                assert!(scored > 0);
            }
            other => panic!("expected a completed run, got {other:?}"),
        }
        assert_eq!(state.status(), RunStatus::Completed);
    }

    #[test]
    fn test_begin_while_active_is_run_in_progress() {
        let mut state = selected_state();
        state.begin(&PromptSet::single("red")).unwrap();
        assert_eq!(state.status(), RunStatus::Preparing);

        let err = state.begin(&PromptSet::single("red")).unwrap_err();
        assert_eq!(err, ValidationError::RunInProgress);
        assert_eq!(state.status(), RunStatus::Preparing);
    }

    #[test]
    fn test_select_source_clears_results() {
        let mut state = selected_state();
        state.complete(RunResults {
            collection: CollectionId::from("memory"),
            model: "color".to_string(),
            prompts: PromptSet::single("red"),
            images: vec![record("a.png")],
            scores: vec![0.5],
            ranking: vec![0],
            skipped: vec![],
        });
        assert!(state.results().is_some());

        state.select_source(CollectionId::from("other"));
        assert!(state.results().is_none());
        assert_eq!(state.status(), RunStatus::Idle);
    }
}
