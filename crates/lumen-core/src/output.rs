//! Ranking reports as JSON or JSON Lines.
//!
//! JSON output is a single [`RunReport`] object (run parameters, skipped
//! images and the ranked list). JSONL output is one [`RankedImage`] per
//! line, which streams well into other tools.

use serde::Serialize;
use std::io::{self, Write};

use crate::pipeline::{OutputPolicy, RunResults};
use crate::types::{RankedImage, SkippedImage, WeightedPrompt};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One report object
    Json,
    /// One ranked image per line
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Full description of a ranking run and its filtered output.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub version: &'static str,
    pub source: String,
    pub model: String,
    pub prompts: Vec<WeightedPrompt>,
    pub policy: OutputPolicy,
    pub scored: usize,
    pub skipped: Vec<SkippedImage>,
    pub results: Vec<RankedImage>,
}

impl RunReport {
    pub fn new(results: &RunResults, policy: OutputPolicy, ranked: Vec<RankedImage>) -> Self {
        Self {
            version: crate::VERSION,
            source: results.collection.to_string(),
            model: results.model.clone(),
            prompts: results.prompts.iter().cloned().collect(),
            policy,
            scored: results.images.len(),
            skipped: results.skipped.clone(),
            results: ranked,
        }
    }
}

/// Serializes reports to any writer.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    items_written: usize,
}

impl<W: Write> OutputWriter<W> {
    /// `pretty` only affects JSON; JSONL is always one compact object per line.
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            items_written: 0,
        }
    }

    /// Write a report in the configured format.
    pub fn write_report(&mut self, report: &RunReport) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                self.write_json(report)?;
                self.items_written += report.results.len();
            }
            OutputFormat::JsonLines => {
                for item in &report.results {
                    self.write_line(item)?;
                }
            }
        }
        Ok(())
    }

    fn write_json<T: Serialize>(&mut self, value: &T) -> io::Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, value).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, value).map_err(io::Error::other)?;
        }
        writeln!(self.writer)
    }

    fn write_line<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        writeln!(self.writer)?;
        self.items_written += 1;
        Ok(())
    }

    /// Ranked images written so far.
    pub fn items_written(&self) -> usize {
        self.items_written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
