//! Guided ranking: dataset, model, prompts, inference, preview, policy, export.

use std::path::PathBuf;
use std::sync::Arc;

use console::Style;
use dialoguer::{Confirm, Input, Select};
use lumen_core::encoder::CLIP_VARIANTS;
use lumen_core::pipeline::ThresholdPreview;
use lumen_core::{
    Config, FilterMode, LocalStore, LumenError, OutputFormat as CoreOutputFormat, OutputPolicy,
    Preview, RunState, SortOrder,
};

use crate::cli::models::download_variant;
use crate::cli::rank::report::{export_selection, print_preview, write_report};
use crate::cli::rank::run::{print_summary, run_with_progress};
use crate::cli::rank::setup::{export_root, resolve_dataset, setup_rank, RankContext};
use crate::cli::rank::{RankArgs, SortArg};

use super::handle_interrupt;
use super::theme::lumen_theme;

const PREVIEW_TOP: usize = 10;

/// Run the guided ranking flow, returning to the main menu on Esc / Ctrl+C.
pub async fn guided_rank(config: &Config) -> anyhow::Result<()> {
    let theme = lumen_theme();
    let err_style = Style::new().for_stderr().red();

    // ── Step 1: Dataset ─────────────────────────────────────────────────────

    let Some(dataset) = prompt_dataset(&theme)? else {
        return Ok(());
    };

    // ── Step 2: Model and batch size ────────────────────────────────────────

    let Some(model) = select_model(&theme, config).await? else {
        return Ok(());
    };

    let Some(batch_size) = handle_interrupt(
        Input::<usize>::with_theme(&theme)
            .with_prompt("Batch size")
            .default(config.inference.batch_size)
            .validate_with(|n: &usize| {
                if (1..=1024).contains(n) {
                    Ok(())
                } else {
                    Err("batch size must be between 1 and 1024")
                }
            })
            .interact_text(),
    )?
    else {
        return Ok(());
    };

    // ── Step 3: Prompts ─────────────────────────────────────────────────────

    let Some((prompts, weights)) = prompt_texts(&theme)? else {
        return Ok(());
    };

    // ── Step 4: Inference ───────────────────────────────────────────────────

    let args = RankArgs {
        dataset,
        prompt: prompts,
        weight: weights,
        model: Some(model),
        batch_size: Some(batch_size),
        sort: Some(SortArg::Desc),
        top: PREVIEW_TOP,
        ..RankArgs::default()
    };

    let mut ctx = match setup_rank(&args, config.clone()).await {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("  {} {e}", err_style.apply_to("✗"));
            return Ok(());
        }
    };

    let mut state = RunState::new();
    state.select_source(ctx.source.clone());

    match run_with_progress(&ctx, &mut state).await {
        Ok(outcome) => print_summary(&outcome),
        Err(e) => {
            eprintln!("  {} Ranking failed: {e}", err_style.apply_to("✗"));
            return Ok(());
        }
    }

    let Some(results) = state.results() else {
        return Ok(());
    };

    // ── Step 5: Preview ─────────────────────────────────────────────────────

    print_preview(&Preview::new(
        results,
        PREVIEW_TOP,
        config.ranking.threshold,
    ));
    if !preview_thresholds(&theme, &results.scores, config.ranking.threshold)? {
        return Ok(());
    }

    // ── Step 6: Sort / filter ───────────────────────────────────────────────

    let Some(policy) = select_policy(&theme, config)? else {
        return Ok(());
    };
    let selected = match results.apply(&policy) {
        Ok(ranked) => ranked.len(),
        Err(e) => {
            eprintln!("  {} {e}", err_style.apply_to("✗"));
            return Ok(());
        }
    };
    let dim = Style::new().for_stderr().dim();
    eprintln!(
        "  {}",
        dim.apply_to(format!(
            "{selected} of {} images selected",
            results.images.len()
        ))
    );

    // ── Step 7: Destination / save ──────────────────────────────────────────

    loop {
        let choice = Select::with_theme(&theme)
            .with_prompt("Save the selection")
            .items(&[
                "Export to a new collection",
                "Write a report file",
                "Done",
            ])
            .default(0)
            .interact_opt()?;

        match choice {
            Some(0) => {
                if !export_step(&theme, &mut ctx, &state, &policy).await? {
                    break;
                }
            }
            Some(1) => {
                let Some(path) = prompt_path(&theme, "Report file", "./ranking.json")? else {
                    break;
                };
                let format = report_format(&path);
                match write_report(results, policy, format, true, Some(&path)) {
                    Ok(n) => eprintln!(
                        "  {} Wrote {n} images to {}",
                        Style::new().for_stderr().green().apply_to("✓"),
                        path.display()
                    ),
                    Err(e) => eprintln!("  {} {e}", err_style.apply_to("✗")),
                }
            }
            _ => break,
        }
    }

    Ok(())
}

/// Ask for a dataset directory until it resolves or the user backs out.
fn prompt_dataset(theme: &dialoguer::theme::ColorfulTheme) -> anyhow::Result<Option<PathBuf>> {
    let err_style = Style::new().for_stderr().red();

    loop {
        let Some(path) = prompt_path(theme, "Dataset directory", ".")? else {
            return Ok(None);
        };
        match resolve_dataset(&path) {
            Ok(_) => return Ok(Some(path)),
            Err(e) => eprintln!("  {} {e}", err_style.apply_to("✗")),
        }
    }
}

/// Pick a CLIP variant, offering a download when it is not installed.
async fn select_model(
    theme: &dialoguer::theme::ColorfulTheme,
    config: &Config,
) -> anyhow::Result<Option<String>> {
    let model_dir = config.model_dir();
    let items: Vec<String> = CLIP_VARIANTS
        .iter()
        .map(|v| {
            let status = if v.is_installed(&model_dir) {
                ""
            } else {
                "  (not installed)"
            };
            format!("{}  {}{}", v.name, v.label, status)
        })
        .collect();
    let default = CLIP_VARIANTS
        .iter()
        .position(|v| v.name == config.inference.model)
        .unwrap_or(0);

    let Some(idx) = Select::with_theme(theme)
        .with_prompt("Model")
        .items(&items)
        .default(default)
        .interact_opt()?
    else {
        return Ok(None);
    };

    let variant = &CLIP_VARIANTS[idx];
    if !variant.is_installed(&model_dir) {
        let download = Confirm::with_theme(theme)
            .with_prompt(format!("{} is not installed. Download it now?", variant.name))
            .default(true)
            .interact_opt()?;
        if download != Some(true) {
            return Ok(None);
        }
        download_variant(variant, &model_dir, &reqwest::Client::new()).await?;
    }

    Ok(Some(variant.name.to_string()))
}

/// Collect one or more prompts with their weights.
fn prompt_texts(
    theme: &dialoguer::theme::ColorfulTheme,
) -> anyhow::Result<Option<(Vec<String>, Vec<f32>)>> {
    let mut texts = Vec::new();
    let mut weights = Vec::new();

    loop {
        let Some(text) = handle_interrupt(
            Input::<String>::with_theme(theme)
                .with_prompt(format!("Prompt {}", texts.len() + 1))
                .validate_with(|s: &String| {
                    if s.trim().is_empty() {
                        Err("prompt must not be empty")
                    } else {
                        Ok(())
                    }
                })
                .interact_text(),
        )?
        else {
            return Ok(None);
        };

        let Some(weight) = handle_interrupt(
            Input::<f32>::with_theme(theme)
                .with_prompt("Weight")
                .default(1.0)
                .validate_with(|w: &f32| {
                    if w.is_finite() {
                        Ok(())
                    } else {
                        Err("weight must be a finite number")
                    }
                })
                .interact_text(),
        )?
        else {
            return Ok(None);
        };

        texts.push(text.trim().to_string());
        weights.push(weight);

        let more = Confirm::with_theme(theme)
            .with_prompt("Add another prompt?")
            .default(false)
            .interact_opt()?;
        match more {
            Some(true) => continue,
            Some(false) => return Ok(Some((texts, weights))),
            None => return Ok(None),
        }
    }
}

/// Let the user try thresholds against the scores before choosing a filter.
///
/// Returns `false` when the user backs out of the flow.
fn preview_thresholds(
    theme: &dialoguer::theme::ColorfulTheme,
    scores: &[f32],
    initial: f32,
) -> anyhow::Result<bool> {
    let mut threshold = initial;

    loop {
        let again = Confirm::with_theme(theme)
            .with_prompt("Preview a different threshold?")
            .default(false)
            .interact_opt()?;
        match again {
            Some(true) => {}
            Some(false) => return Ok(true),
            None => return Ok(false),
        }

        let Some(t) = handle_interrupt(
            Input::<f32>::with_theme(theme)
                .with_prompt("Threshold")
                .default(threshold)
                .interact_text(),
        )?
        else {
            return Ok(false);
        };
        threshold = t;

        let preview = ThresholdPreview::new(scores, threshold);
        eprintln!(
            "    {} at or above {:.4}, {} at or below",
            preview.at_or_above, preview.threshold, preview.at_or_below
        );
    }
}

/// Choose sort order and filter, re-asking until at least one is set.
fn select_policy(
    theme: &dialoguer::theme::ColorfulTheme,
    config: &Config,
) -> anyhow::Result<Option<OutputPolicy>> {
    const SORTS: [SortOrder; 3] = [SortOrder::Descending, SortOrder::Ascending, SortOrder::None];
    const FILTERS: [FilterMode; 3] = [FilterMode::None, FilterMode::KeepAbove, FilterMode::KeepBelow];
    let err_style = Style::new().for_stderr().red();

    loop {
        let Some(sort) = Select::with_theme(theme)
            .with_prompt("Sort order")
            .items(&["Highest score first", "Lowest score first", "Keep dataset order"])
            .default(SORTS.iter().position(|s| *s == config.ranking.sort).unwrap_or(0))
            .interact_opt()?
        else {
            return Ok(None);
        };

        let Some(filter) = Select::with_theme(theme)
            .with_prompt("Threshold filter")
            .items(&["Keep everything", "Keep scores at or above", "Keep scores at or below"])
            .default(FILTERS.iter().position(|f| *f == config.ranking.filter).unwrap_or(0))
            .interact_opt()?
        else {
            return Ok(None);
        };

        let mut policy = OutputPolicy {
            sort: SORTS[sort],
            filter: FILTERS[filter],
            threshold: config.ranking.threshold,
        };

        if policy.filter != FilterMode::None {
            let Some(t) = handle_interrupt(
                Input::<f32>::with_theme(theme)
                    .with_prompt("Threshold")
                    .default(config.ranking.threshold)
                    .interact_text(),
            )?
            else {
                return Ok(None);
            };
            policy.threshold = t;
        }

        match policy.validate() {
            Ok(()) => return Ok(Some(policy)),
            Err(e) => eprintln!("  {} {e}", err_style.apply_to("✗")),
        }
    }
}

/// Ask for a destination and export. Returns `false` when the user backs out.
async fn export_step(
    theme: &dialoguer::theme::ColorfulTheme,
    ctx: &mut RankContext,
    state: &RunState,
    policy: &OutputPolicy,
) -> anyhow::Result<bool> {
    let err_style = Style::new().for_stderr().red();
    let default_root = export_root(&ctx.source, None);

    let Some(root) = prompt_path(theme, "Export under", &default_root.to_string_lossy())? else {
        return Ok(false);
    };

    let Some(name) = handle_interrupt(
        Input::<String>::with_theme(theme)
            .with_prompt("Collection name (empty for date + prompt)")
            .allow_empty(true)
            .interact_text(),
    )?
    else {
        return Ok(false);
    };
    let name = Some(name.trim().to_string()).filter(|n| !n.is_empty());

    let Some(tag) = Confirm::with_theme(theme)
        .with_prompt("Tag exported images with their score?")
        .default(ctx.lumen.config().export.add_score_tag)
        .interact_opt()?
    else {
        return Ok(false);
    };
    ctx.lumen.config_mut().export.add_score_tag = tag;

    let destination = Arc::new(LocalStore::new(
        root,
        ctx.lumen.config().processing.clone(),
    ));
    match export_selection(ctx, destination, state, policy, name).await {
        Ok(_) => {}
        Err(e) => match e.downcast_ref::<LumenError>() {
            Some(LumenError::Validation(v)) => eprintln!("  {} {v}", err_style.apply_to("✗")),
            _ => eprintln!("  {} Export failed: {e}", err_style.apply_to("✗")),
        },
    }
    Ok(true)
}

/// Prompt for a path with a default, expanding `~`.
/// Returns `Ok(None)` if the user interrupts (Ctrl+C).
fn prompt_path(
    theme: &dialoguer::theme::ColorfulTheme,
    prompt: &str,
    default: &str,
) -> anyhow::Result<Option<PathBuf>> {
    let Some(path) = handle_interrupt(
        Input::<String>::with_theme(theme)
            .with_prompt(prompt)
            .default(default.to_string())
            .interact_text(),
    )?
    else {
        return Ok(None);
    };
    Ok(Some(PathBuf::from(shellexpand::tilde(&path).into_owned())))
}

/// Report format from the file extension, JSON when unknown.
fn report_format(path: &std::path::Path) -> CoreOutputFormat {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(CoreOutputFormat::parse)
        .unwrap_or(CoreOutputFormat::Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn report_format_from_extension() {
        assert_eq!(
            report_format(Path::new("out.jsonl")),
            CoreOutputFormat::JsonLines
        );
        assert_eq!(
            report_format(Path::new("out.ndjson")),
            CoreOutputFormat::JsonLines
        );
        assert_eq!(report_format(Path::new("out.json")), CoreOutputFormat::Json);
        assert_eq!(report_format(Path::new("out")), CoreOutputFormat::Json);
    }
}
