//! Dialoguer theme and banner for the interactive wizard.

use console::{style, Style};
use dialoguer::theme::ColorfulTheme;

/// Returns a `ColorfulTheme` configured with Lumen's colours.
///
/// - Prompt prefix: yellow `?`
/// - Active item indicator: yellow `▸`
/// - Success prefix: green `✓`
/// - Error prefix: red `✗`
pub fn lumen_theme() -> ColorfulTheme {
    ColorfulTheme {
        prompt_prefix: style("?".to_string()).for_stderr().yellow(),
        prompt_style: Style::new().for_stderr().bold(),
        prompt_suffix: style("›".to_string()).for_stderr().bright().black(),
        active_item_prefix: style("▸".to_string()).for_stderr().yellow(),
        active_item_style: Style::new().for_stderr().yellow(),
        success_prefix: style("✓".to_string()).for_stderr().green(),
        success_suffix: style("·".to_string()).for_stderr().bright().black(),
        error_prefix: style("✗".to_string()).for_stderr().red(),
        error_style: Style::new().for_stderr().red(),
        values_style: Style::new().for_stderr().green(),
        ..ColorfulTheme::default()
    }
}

/// Prints the Lumen banner to stderr so stdout stays clean for piped data.
pub fn print_banner() {
    let version_line = format!("Lumen v{}", lumen_core::VERSION);
    let tagline = "Rank images by what they show";

    let inner_width = tagline.len() + 4;

    let top = format!("  ╭{:─<width$}╮", "", width = inner_width);
    let mid1 = format!("  │{:^width$}│", version_line, width = inner_width);
    let mid2 = format!("  │{:^width$}│", tagline, width = inner_width);
    let bot = format!("  ╰{:─<width$}╯", "", width = inner_width);

    let yellow = Style::new().for_stderr().yellow();

    eprintln!();
    for line in [&top, &mid1, &mid2, &bot] {
        eprintln!("{}", yellow.apply_to(line));
    }
    eprintln!();
}
