//! Inference with a progress bar and Ctrl+C cancellation.

use lumen_core::{CancelToken, Ranker, RunOutcome, RunProgress, RunState};

use super::setup::RankContext;

/// Run inference for `ctx`, showing per-batch progress on stderr.
///
/// Ctrl+C cancels at the next batch boundary instead of killing the process.
pub async fn run_with_progress(
    ctx: &RankContext,
    state: &mut RunState,
) -> anyhow::Result<RunOutcome> {
    let ranker: Ranker = ctx
        .lumen
        .ranker(ctx.encoder.clone(), ctx.store.clone());

    let cancel = CancelToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let progress = create_progress_bar();
    let result = ranker
        .run(state, &ctx.prompts, &cancel, |p| update_progress(&progress, p))
        .await;
    watcher.abort();

    match &result {
        Ok(RunOutcome::Completed { .. }) => progress.finish_with_message("done"),
        Ok(RunOutcome::Cancelled { .. }) => progress.abandon_with_message("cancelled"),
        Err(_) => progress.abandon_with_message("failed"),
    }

    Ok(result?)
}

fn update_progress(progress: &indicatif::ProgressBar, p: RunProgress) {
    progress.set_length(p.total_batches as u64);
    progress.set_position(p.batches_done as u64);
    if p.skipped > 0 {
        progress.set_message(format!("{} scored, {} skipped", p.scored, p.skipped));
    } else {
        progress.set_message(format!("{} scored", p.scored));
    }
}

fn create_progress_bar() -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb.set_message("preparing...");
    pb
}

/// Print a formatted summary table after a run.
pub fn print_summary(outcome: &RunOutcome) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    match outcome {
        RunOutcome::Completed {
            scored,
            skipped,
            elapsed,
        } => {
            let secs = elapsed.as_secs_f64();
            let rate = if secs > 0.0 {
                *scored as f64 / secs
            } else {
                0.0
            };
            eprintln!("    Scored:       {:>8}", scored);
            if *skipped > 0 {
                eprintln!("    Skipped:      {:>8}", skipped);
            }
            eprintln!("  ------------------------------------");
            eprintln!("    Duration:     {:>7.1}s", secs);
            eprintln!("    Rate:         {:>7.1} img/sec", rate);
        }
        RunOutcome::Cancelled {
            batches_done,
            total_batches,
        } => {
            eprintln!("    Cancelled after {batches_done}/{total_batches} batches");
            eprintln!("    Previous results were discarded.");
        }
    }
    eprintln!("  ====================================");
}
