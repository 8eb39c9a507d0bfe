//! Rank setup: config overrides, dataset resolution, encoder loading.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lumen_core::encoder::find_variant;
use lumen_core::{
    CollectionId, Config, FilterMode, ImageTextEncoder, LocalStore, Lumen, OutputPolicy,
    PromptSet, SortOrder,
};

use super::RankArgs;

/// Everything needed to run and export one ranking.
pub struct RankContext {
    pub lumen: Lumen,
    pub encoder: Arc<dyn ImageTextEncoder>,
    /// Store holding the dataset; also the default export destination
    pub store: Arc<LocalStore>,
    pub source: CollectionId,
    pub prompts: PromptSet,
    pub policy: OutputPolicy,
}

/// Apply command-line overrides on top of the loaded configuration.
pub fn apply_overrides(config: &mut Config, args: &RankArgs) {
    if let Some(model) = &args.model {
        config.inference.model = model.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.inference.batch_size = batch_size;
    }
    if args.add_score_tag {
        config.export.add_score_tag = true;
    }
}

/// Output policy from flags, falling back to the `[ranking]` defaults.
pub fn build_policy(config: &Config, args: &RankArgs) -> OutputPolicy {
    let mut policy = OutputPolicy::from(&config.ranking);
    if let Some(sort) = args.sort {
        policy.sort = SortOrder::from(sort);
    }
    if let Some(filter) = args.filter {
        policy.filter = FilterMode::from(filter);
    }
    if let Some(threshold) = args.threshold {
        policy.threshold = threshold;
    }
    policy
}

/// Validate the dataset path and turn it into a collection id.
pub fn resolve_dataset(path: &Path) -> anyhow::Result<CollectionId> {
    if !path.exists() {
        anyhow::bail!(
            "Dataset does not exist: {:?}\n\n  Hint: Pass a directory of images.",
            path
        );
    }
    if !path.is_dir() {
        anyhow::bail!(
            "Dataset is not a directory: {:?}\n\n  Hint: Lumen ranks whole directories of images.",
            path
        );
    }
    let canonical = path.canonicalize()?;
    Ok(CollectionId(canonical.to_string_lossy().into_owned()))
}

/// Directory new collections are created under: `--export-root`, else the
/// dataset's parent directory.
pub fn export_root(dataset: &CollectionId, export_root: Option<&Path>) -> PathBuf {
    match export_root {
        Some(root) => root.to_path_buf(),
        None => Path::new(&dataset.0)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    }
}

/// Load the configured encoder, pointing at `lumen models download` when
/// a built-in variant is not installed yet.
pub async fn load_encoder(lumen: &Lumen) -> anyhow::Result<Arc<dyn ImageTextEncoder>> {
    let model = &lumen.config().inference.model;
    if let Some(variant) = find_variant(model) {
        if !variant.is_installed(&lumen.model_dir()) {
            anyhow::bail!(
                "Model '{}' is not installed in {:?}\n\n  Hint: Run `lumen models download --model {}` first.",
                model,
                lumen.model_dir(),
                model
            );
        }
    }

    let encoder = lumen.load_encoder()?;
    tracing::info!("Loaded encoder {}", encoder.name());
    Ok(encoder)
}

/// Validate input, load config/models, and assemble everything needed for ranking.
pub async fn setup_rank(args: &RankArgs, mut config: Config) -> anyhow::Result<RankContext> {
    apply_overrides(&mut config, args);

    let prompts = PromptSet::from_parts(args.prompt.clone(), args.weight.clone())?;
    if prompts.is_blank() {
        anyhow::bail!("At least one non-empty --prompt is required");
    }

    // Reject an empty policy before spending time on inference.
    let policy = build_policy(&config, args);
    policy.validate()?;

    let source = resolve_dataset(&args.dataset)?;
    let root = export_root(&source, args.export_root.as_deref());
    let store = Arc::new(LocalStore::new(root, config.processing.clone()));

    let lumen = Lumen::new(config);
    let encoder = load_encoder(&lumen).await?;

    Ok(RankContext {
        lumen,
        encoder,
        store,
        source,
        prompts,
        policy,
    })
}
