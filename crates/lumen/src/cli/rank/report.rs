//! Post-run output: score preview, report files, and export.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use console::Style;
use lumen_core::output::OutputFormat as CoreOutputFormat;
use lumen_core::pipeline::preview::HistogramBin;
use lumen_core::{
    Destination, ExportReport, LocalStore, OutputPolicy, OutputWriter, Preview, RunReport,
    RunResults, RunState, SourceCollection,
};

use super::setup::RankContext;

const BAR_WIDTH: usize = 30;

/// Print the score summary, histogram, top images and threshold counts.
pub fn print_preview(preview: &Preview) {
    let dim = Style::new().for_stderr().dim();
    let cyan = Style::new().for_stderr().cyan();
    let label = Style::new().for_stderr().bold();

    eprintln!();
    let Some(summary) = preview.summary else {
        eprintln!("  {}", dim.apply_to("No images were scored."));
        eprintln!();
        return;
    };

    eprintln!("  {}", cyan.apply_to("Scores:"));
    eprintln!(
        "    {:<10} {}   {:<8} {:.4}   {:<8} {:.4}",
        label.apply_to("Images:"),
        summary.count,
        label.apply_to("Min:"),
        summary.min,
        label.apply_to("Max:"),
        summary.max
    );
    eprintln!(
        "    {:<10} {:.4}   {:<8} {:.4}",
        label.apply_to("Mean:"),
        summary.mean,
        label.apply_to("Median:"),
        summary.median
    );

    eprintln!();
    for line in histogram_lines(&preview.histogram) {
        eprintln!("    {}", line);
    }

    if !preview.top.is_empty() {
        eprintln!();
        eprintln!("  {}", cyan.apply_to(format!("Top {}:", preview.top.len())));
        for image in &preview.top {
            eprintln!(
                "    {:>3}. {:.4}  {}",
                image.position + 1,
                image.score,
                image.name
            );
        }
    }

    eprintln!();
    eprintln!(
        "  {} {} at or above {:.4}, {} at or below",
        cyan.apply_to("Threshold:"),
        preview.threshold.at_or_above,
        preview.threshold.threshold,
        preview.threshold.at_or_below
    );
    eprintln!();
}

/// Render histogram bins as `[lower, upper) count ████` lines.
fn histogram_lines(bins: &[HistogramBin]) -> Vec<String> {
    let max = bins.iter().map(|b| b.count).max().unwrap_or(0);
    bins.iter()
        .map(|bin| {
            let width = if max == 0 {
                0
            } else {
                (bin.count * BAR_WIDTH).div_ceil(max)
            };
            format!(
                "{:>7.4} .. {:<7.4} {:>6}  {}",
                bin.lower,
                bin.upper,
                bin.count,
                "█".repeat(width)
            )
        })
        .collect()
}

/// Write the filtered report to `output`, or stdout when `None`.
///
/// Returns the number of ranked images written.
pub fn write_report(
    results: &RunResults,
    policy: OutputPolicy,
    format: CoreOutputFormat,
    pretty: bool,
    output: Option<&Path>,
) -> anyhow::Result<usize> {
    let ranked = results.apply(&policy)?;
    let report = RunReport::new(results, policy, ranked);

    let written = match output {
        Some(path) => {
            let file = File::create(path)?;
            let count = write_to(BufWriter::new(file), &report, format, pretty)?;
            tracing::info!("Report written to {:?}", path);
            count
        }
        None => write_to(std::io::stdout().lock(), &report, format, pretty)?,
    };
    Ok(written)
}

fn write_to<W: Write>(
    writer: W,
    report: &RunReport,
    format: CoreOutputFormat,
    pretty: bool,
) -> anyhow::Result<usize> {
    let mut writer = OutputWriter::new(writer, format, pretty);
    writer.write_report(report)?;
    writer.flush()?;
    Ok(writer.items_written())
}

/// Export the last completed run into a new collection under `destination`.
pub async fn export_selection(
    ctx: &RankContext,
    destination: Arc<LocalStore>,
    state: &RunState,
    policy: &OutputPolicy,
    collection_name: Option<String>,
) -> anyhow::Result<ExportReport> {
    let source: Arc<dyn SourceCollection> = ctx.store.clone();
    let destination: Arc<dyn Destination> = destination;
    let exporter = ctx.lumen.exporter(source, destination, collection_name);

    let progress = indicatif::ProgressBar::new(0);
    progress.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} uploaded")
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
            .progress_chars("##-"),
    );

    let result = exporter
        .export(state, policy, |done, total| {
            progress.set_length(total as u64);
            progress.set_position(done as u64);
        })
        .await;
    progress.finish_and_clear();

    let report = result?;
    let done = Style::new().for_stderr().green();
    eprintln!(
        "  {} Exported {} images to {}",
        done.apply_to("✓"),
        report.count,
        report.collection
    );
    Ok(report)
}
