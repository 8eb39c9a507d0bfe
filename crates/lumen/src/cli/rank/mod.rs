//! The `lumen rank` command: score a dataset against prompts, then report or export.

pub mod report;
pub mod run;
pub mod setup;
pub mod types;

pub use types::{FilterArg, OutputFormat, SortArg};

use clap::Args;
use lumen_core::output::OutputFormat as CoreOutputFormat;
use lumen_core::{Config, Preview, RunState};
use std::path::PathBuf;

use report::{export_selection, print_preview, write_report};
use run::{print_summary, run_with_progress};
use setup::setup_rank;

/// Arguments for the `rank` command.
#[derive(Args, Debug, Default)]
pub struct RankArgs {
    /// Directory of images to rank
    #[arg(required = true)]
    pub dataset: PathBuf,

    /// Text prompt (repeat for several prompts)
    #[arg(short, long = "prompt", required = true)]
    pub prompt: Vec<String>,

    /// Weight for the prompt at the same position (defaults to 1.0 each)
    #[arg(short, long = "weight", allow_negative_numbers = true)]
    pub weight: Vec<f32>,

    /// Encoder to use (see `lumen models list`)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Images per encoder forward pass
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Sort order of the output
    #[arg(long, value_enum)]
    pub sort: Option<SortArg>,

    /// Threshold filter applied after sorting
    #[arg(long, value_enum)]
    pub filter: Option<FilterArg>,

    /// Score threshold for --filter (inclusive)
    #[arg(short, long, allow_negative_numbers = true)]
    pub threshold: Option<f32>,

    /// Report file (defaults to stdout unless exporting)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Export the selection into a new collection under this directory
    #[arg(long)]
    pub export_root: Option<PathBuf>,

    /// Name of the exported collection (implies export)
    #[arg(long)]
    pub collection: Option<String>,

    /// Tag every exported image with its score
    #[arg(long)]
    pub add_score_tag: bool,

    /// Number of top images shown in the preview
    #[arg(long, default_value = "10")]
    pub top: usize,
}

impl RankArgs {
    /// Whether the selection should be copied into a new collection.
    pub fn exports(&self) -> bool {
        self.export_root.is_some() || self.collection.is_some()
    }
}

/// Execute the rank command.
pub async fn execute(args: RankArgs, config: Config) -> anyhow::Result<()> {
    let pretty = config.output.pretty;
    let format = args
        .format
        .map(CoreOutputFormat::from)
        .or_else(|| CoreOutputFormat::parse(&config.output.format))
        .unwrap_or(CoreOutputFormat::Json);

    let ctx = setup_rank(&args, config).await?;

    let mut state = RunState::new();
    state.select_source(ctx.source.clone());

    let outcome = run_with_progress(&ctx, &mut state).await?;
    print_summary(&outcome);

    let Some(results) = state.results() else {
        return Ok(());
    };

    print_preview(&Preview::new(results, args.top, ctx.policy.threshold));

    if args.output.is_some() || !args.exports() {
        let written = write_report(results, ctx.policy, format, pretty, args.output.as_deref())?;
        tracing::debug!("Report contains {} images", written);
    }

    if args.exports() {
        export_selection(
            &ctx,
            ctx.store.clone(),
            &state,
            &ctx.policy,
            args.collection.clone(),
        )
        .await?;
    }

    Ok(())
}
