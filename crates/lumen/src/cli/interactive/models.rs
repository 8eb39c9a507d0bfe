//! Guided model management: show install status and offer downloads.

use console::Style;
use dialoguer::Select;
use lumen_core::encoder::{ModelVariant, CLIP_VARIANTS};
use lumen_core::Config;

use crate::cli::models::download_variant;

use super::theme::lumen_theme;

/// Show installed model status and offer download options.
pub async fn guided_models(config: &Config) -> anyhow::Result<()> {
    let theme = lumen_theme();
    let model_dir = config.model_dir();

    loop {
        print_status(config);

        let missing: Vec<&ModelVariant> = CLIP_VARIANTS
            .iter()
            .filter(|v| !v.is_installed(&model_dir))
            .collect();

        let mut items: Vec<String> = missing
            .iter()
            .map(|v| format!("Download {} ({})", v.label, v.name))
            .collect();
        items.push("Show model directory".to_string());
        items.push("Back".to_string());

        let selection = Select::with_theme(&theme)
            .with_prompt("Model management")
            .items(&items)
            .default(0)
            .interact_opt()?;

        match selection {
            Some(idx) if idx < missing.len() => {
                let client = reqwest::Client::new();
                download_variant(missing[idx], &model_dir, &client).await?;
                let done = Style::new().for_stderr().green();
                eprintln!();
                eprintln!("{}", done.apply_to("  Download complete."));
                eprintln!();
            }
            Some(idx) if idx == missing.len() => {
                eprintln!();
                eprintln!("  {}", model_dir.display());
                eprintln!();
            }
            _ => break,
        }
    }

    Ok(())
}

/// Print one status line per built-in variant.
pub fn print_status(config: &Config) {
    let model_dir = config.model_dir();
    let green = Style::new().for_stderr().green();
    let dim = Style::new().for_stderr().dim();

    eprintln!();
    for variant in CLIP_VARIANTS {
        let status = if variant.is_installed(&model_dir) {
            green.apply_to("ready").to_string()
        } else {
            dim.apply_to("not installed").to_string()
        };
        let default_marker = if variant.name == config.inference.model {
            dim.apply_to(" (default)").to_string()
        } else {
            String::new()
        };
        eprintln!(
            "    {:<24} {:<22} {}{}",
            variant.name, variant.label, status, default_marker
        );
    }
    eprintln!();
}
