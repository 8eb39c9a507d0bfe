//! Score statistics shown before the user picks a sort/filter policy.

use serde::Serialize;

use crate::types::RankedImage;

use super::runner::RunResults;

/// Default number of histogram bins.
pub const DEFAULT_BINS: usize = 10;

/// Summary statistics over a score vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub count: usize,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub median: f32,
}

impl ScoreSummary {
    /// `None` for an empty score vector.
    pub fn from_scores(scores: &[f32]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }

        let mut sorted = scores.to_vec();
        sorted.sort_by(f32::total_cmp);
        let n = sorted.len();
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };
        let mean = (sorted.iter().map(|&s| s as f64).sum::<f64>() / n as f64) as f32;

        Some(Self {
            count: n,
            min: sorted[0],
            max: sorted[n - 1],
            mean,
            median,
        })
    }
}

/// One histogram bin covering `[lower, upper)` (the last bin is closed).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f32,
    pub upper: f32,
    pub count: usize,
}

/// Equal-width histogram between the smallest and largest score.
pub fn histogram(scores: &[f32], bins: usize) -> Vec<HistogramBin> {
    let Some(summary) = ScoreSummary::from_scores(scores) else {
        return Vec::new();
    };
    let bins = bins.max(1);
    let span = summary.max - summary.min;
    let width = if span > 0.0 { span / bins as f32 } else { 1.0 };

    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: summary.min + width * i as f32,
            upper: summary.min + width * (i + 1) as f32,
            count: 0,
        })
        .collect();

    for &s in scores {
        let idx = (((s - summary.min) / width) as usize).min(bins - 1);
        out[idx].count += 1;
    }
    out
}

/// How many scores a threshold filter would keep on either side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdPreview {
    pub threshold: f32,
    /// Scores `>= threshold`
    pub at_or_above: usize,
    /// Scores `<= threshold`
    pub at_or_below: usize,
}

impl ThresholdPreview {
    pub fn new(scores: &[f32], threshold: f32) -> Self {
        Self {
            threshold,
            at_or_above: scores.iter().filter(|&&s| s >= threshold).count(),
            at_or_below: scores.iter().filter(|&&s| s <= threshold).count(),
        }
    }
}

/// Everything the preview step shows for a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub summary: Option<ScoreSummary>,
    pub histogram: Vec<HistogramBin>,
    /// Best `top_n` images by descending score
    pub top: Vec<RankedImage>,
    pub threshold: ThresholdPreview,
}

impl Preview {
    pub fn new(results: &RunResults, top_n: usize, threshold: f32) -> Self {
        let top = results
            .ranking
            .iter()
            .take(top_n)
            .enumerate()
            .map(|(position, &i)| {
                let image = &results.images[i];
                RankedImage {
                    position,
                    source_index: i,
                    id: image.id.clone(),
                    name: image.name.clone(),
                    width: image.width,
                    height: image.height,
                    score: results.scores[i],
                }
            })
            .collect();

        Self {
            summary: ScoreSummary::from_scores(&results.scores),
            histogram: histogram(&results.scores, DEFAULT_BINS),
            top,
            threshold: ThresholdPreview::new(&results.scores, threshold),
        }
    }
}
