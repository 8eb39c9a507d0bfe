//! CLI enum types for the rank command: sort order, filter mode, output format.

use clap::ValueEnum;
use lumen_core::{FilterMode, OutputFormat as CoreOutputFormat, SortOrder};

/// Sort order for the ranked output.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SortArg {
    /// Lowest score first
    Asc,
    /// Highest score first
    Desc,
    /// Keep dataset order
    None,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Asc => SortOrder::Ascending,
            SortArg::Desc => SortOrder::Descending,
            SortArg::None => SortOrder::None,
        }
    }
}

/// Threshold filter for the ranked output.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FilterArg {
    /// Keep scores at or above the threshold
    Above,
    /// Keep scores at or below the threshold
    Below,
    /// Keep everything
    None,
}

impl From<FilterArg> for FilterMode {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::Above => FilterMode::KeepAbove,
            FilterArg::Below => FilterMode::KeepBelow,
            FilterArg::None => FilterMode::None,
        }
    }
}

/// Supported report formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON report object
    Json,
    /// One ranked image per line (newline-delimited)
    Jsonl,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

impl From<OutputFormat> for CoreOutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => CoreOutputFormat::Json,
            OutputFormat::Jsonl => CoreOutputFormat::JsonLines,
        }
    }
}
