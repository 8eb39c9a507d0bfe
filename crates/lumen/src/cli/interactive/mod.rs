//! Interactive mode: a guided wizard for bare `lumen` invocation.
//!
//! When `lumen` is invoked with no subcommand on a TTY, this module walks
//! the user through dataset, model, prompts, inference, preview, sort/filter
//! and export, reusing the same building blocks as `lumen rank`.

pub mod models;
pub mod rank;
pub mod theme;

use console::Style;
use dialoguer::Select;
use lumen_core::Config;

/// Convert a dialoguer result into `Ok(Some(value))` on success, `Ok(None)` on
/// interrupt (Ctrl+C / terminal disconnect), and `Err` for other I/O failures.
fn handle_interrupt<T>(result: dialoguer::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
        Err(e) => Err(e.into()),
    }
}

const MENU_ITEMS: &[&str] = &[
    "Rank a dataset",
    "Download / manage models",
    "Show settings",
    "Exit",
];

/// Entry point for interactive mode.
pub async fn run(config: Config) -> anyhow::Result<()> {
    theme::print_banner();

    let theme = theme::lumen_theme();

    loop {
        let selection = Select::with_theme(&theme)
            .with_prompt("What would you like to do?")
            .items(MENU_ITEMS)
            .default(0)
            .interact_opt()?;

        match selection {
            Some(0) => rank::guided_rank(&config).await?,
            Some(1) => models::guided_models(&config).await?,
            Some(2) => show_config(&config)?,
            _ => break,
        }
    }

    Ok(())
}

/// Print a summary of the active settings and optionally the full TOML.
fn show_config(config: &Config) -> anyhow::Result<()> {
    let theme = theme::lumen_theme();
    let dim = Style::new().for_stderr().dim();
    let yellow = Style::new().for_stderr().yellow();
    let label = Style::new().for_stderr().bold();

    let config_path = Config::default_path();
    let path_note = if config_path.exists() {
        "(exists)"
    } else {
        "(using defaults)"
    };

    eprintln!();
    eprintln!("  {}", yellow.apply_to("Current configuration:"));
    eprintln!();
    eprintln!(
        "    {:<18} {} {}",
        label.apply_to("Config file:"),
        config_path.display(),
        dim.apply_to(path_note)
    );
    eprintln!(
        "    {:<18} {}",
        label.apply_to("Model dir:"),
        config.model_dir().display()
    );
    eprintln!(
        "    {:<18} {} (batch size {})",
        label.apply_to("Model:"),
        config.inference.model,
        config.inference.batch_size
    );
    eprintln!(
        "    {:<18} sort {}, filter {}, threshold {}",
        label.apply_to("Ranking:"),
        config.ranking.sort,
        config.ranking.filter,
        config.ranking.threshold
    );
    eprintln!(
        "    {:<18} batches of {}{}",
        label.apply_to("Export:"),
        config.export.upload_batch_size,
        if config.export.add_score_tag {
            ", with score tags"
        } else {
            ""
        }
    );
    eprintln!(
        "    {:<18} {}",
        label.apply_to("Log level:"),
        config.logging.level
    );
    eprintln!();

    let show_toml = Select::with_theme(&theme)
        .with_prompt("Configuration")
        .items(&["View full config (TOML)", "Back"])
        .default(1)
        .interact_opt()?;

    if show_toml == Some(0) {
        eprintln!();
        eprintln!("{}", dim.apply_to("─".repeat(50)));
        eprintln!("{}", config.to_toml()?);
        eprintln!("{}", dim.apply_to("─".repeat(50)));
        eprintln!();
    }

    Ok(())
}
