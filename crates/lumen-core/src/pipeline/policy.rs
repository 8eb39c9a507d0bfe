//! Sort and filter policy applied to a completed run.
//!
//! Sorting happens first and moves images and scores together; filtering
//! then keeps scores at or above (or at or below) the threshold. Both bounds
//! are inclusive.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::RankingConfig;
use crate::error::{PipelineError, Result, ValidationError};
use crate::types::{ImageRecord, RankedImage};

use super::aggregate::rank;

/// Requested ordering of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Keep source order
    None,
    /// Lowest score first
    Ascending,
    /// Highest score first
    #[default]
    Descending,
}

impl SortOrder {
    /// Parse a sort order (case-insensitive, accepts short forms).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "off" => Some(Self::None),
            "asc" | "ascending" => Some(Self::Ascending),
            "desc" | "descending" => Some(Self::Descending),
            _ => None,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        })
    }
}

/// Requested threshold filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    None,
    /// Keep scores `>= threshold`
    KeepAbove,
    /// Keep scores `<= threshold`
    KeepBelow,
}

impl FilterMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "off" => Some(Self::None),
            "above" | "keep_above" => Some(Self::KeepAbove),
            "below" | "keep_below" => Some(Self::KeepBelow),
            _ => None,
        }
    }

    fn keeps(self, score: f32, threshold: f32) -> bool {
        match self {
            Self::None => true,
            Self::KeepAbove => score >= threshold,
            Self::KeepBelow => score <= threshold,
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::KeepAbove => "keep_above",
            Self::KeepBelow => "keep_below",
        })
    }
}

/// Sort order, filter mode and threshold chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputPolicy {
    pub sort: SortOrder,
    pub filter: FilterMode,
    pub threshold: f32,
}

impl Default for OutputPolicy {
    fn default() -> Self {
        Self::from(&RankingConfig::default())
    }
}

impl From<&RankingConfig> for OutputPolicy {
    fn from(config: &RankingConfig) -> Self {
        Self {
            sort: config.sort,
            filter: config.filter,
            threshold: config.threshold,
        }
    }
}

impl OutputPolicy {
    /// Fails with `NoPolicySelected` when neither a sort nor a filter is set.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.sort == SortOrder::None && self.filter == FilterMode::None {
            return Err(ValidationError::NoPolicySelected);
        }
        Ok(())
    }

    /// Indices into `scores` in output order.
    pub fn select(&self, scores: &[f32]) -> Result<Vec<usize>> {
        self.validate()?;

        let order = match self.sort {
            SortOrder::None => (0..scores.len()).collect(),
            SortOrder::Descending => rank(scores, scores.len())?,
            SortOrder::Ascending => {
                let mut order: Vec<usize> = (0..scores.len()).collect();
                order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
                order
            }
        };

        Ok(order
            .into_iter()
            .filter(|&i| self.filter.keeps(scores[i], self.threshold))
            .collect())
    }

    /// Apply the policy to scored images.
    ///
    /// `images` and `scores` must be aligned by position.
    pub fn apply(&self, images: &[ImageRecord], scores: &[f32]) -> Result<Vec<RankedImage>> {
        if images.len() != scores.len() {
            return Err(PipelineError::LengthMismatch {
                expected: images.len(),
                actual: scores.len(),
            }
            .into());
        }

        let ranked = self
            .select(scores)?
            .into_iter()
            .enumerate()
            .map(|(position, i)| {
                let image = &images[i];
                RankedImage {
                    position,
                    source_index: i,
                    id: image.id.clone(),
                    name: image.name.clone(),
                    width: image.width,
                    height: image.height,
                    score: scores[i],
                }
            })
            .collect();
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LumenError;
    use crate::types::{ImageId, ImageMeta};

    fn policy(sort: SortOrder, filter: FilterMode, threshold: f32) -> OutputPolicy {
        OutputPolicy {
            sort,
            filter,
            threshold,
        }
    }

    fn records(n: usize) -> Vec<ImageRecord> {
        (0..n)
            .map(|i| ImageRecord {
                id: ImageId(format!("img-{i}")),
                name: format!("{i}.jpg"),
                width: 10,
                height: 10,
                meta: ImageMeta::new(),
            })
            .collect()
    }

    fn picked(scores: &[f32], idx: &[usize]) -> Vec<f32> {
        idx.iter().map(|&i| scores[i]).collect()
    }

    #[test]
    fn test_descending_sort() {
        let scores = [0.10, 0.90, 0.50];
        let idx = policy(SortOrder::Descending, FilterMode::None, 0.0)
            .select(&scores)
            .unwrap();
        assert_eq!(idx, vec![1, 2, 0]);
        assert_eq!(picked(&scores, &idx), vec![0.90, 0.50, 0.10]);
    }

    #[test]
    fn test_ascending_sort_is_stable() {
        let scores = [0.5, 0.1, 0.5, 0.3];
        let idx = policy(SortOrder::Ascending, FilterMode::None, 0.0)
            .select(&scores)
            .unwrap();
        assert_eq!(idx, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_keep_above_is_inclusive() {
        let scores = [0.90, 0.50, 0.10];
        let idx = policy(SortOrder::None, FilterMode::KeepAbove, 0.5)
            .select(&scores)
            .unwrap();
        assert_eq!(picked(&scores, &idx), vec![0.90, 0.50]);
    }

    #[test]
    fn test_keep_below_is_inclusive() {
        let scores = [0.90, 0.50, 0.10];
        let idx = policy(SortOrder::None, FilterMode::KeepBelow, 0.5)
            .select(&scores)
            .unwrap();
        assert_eq!(picked(&scores, &idx), vec![0.50, 0.10]);
    }

    #[test]
    fn test_sort_then_filter() {
        let scores = [0.2, 0.8, 0.6, 0.1];
        let idx = policy(SortOrder::Descending, FilterMode::KeepAbove, 0.5)
            .select(&scores)
            .unwrap();
        assert_eq!(idx, vec![1, 2]);
    }

    #[test]
    fn test_above_and_below_cover_sorted_sequence() {
        let scores = [0.3, 0.7, 0.5, 0.5, 0.9, 0.0];
        let threshold = 0.5;
        let sorted = policy(SortOrder::Descending, FilterMode::None, threshold)
            .select(&scores)
            .unwrap();
        let above = policy(SortOrder::Descending, FilterMode::KeepAbove, threshold)
            .select(&scores)
            .unwrap();
        let below = policy(SortOrder::Descending, FilterMode::KeepBelow, threshold)
            .select(&scores)
            .unwrap();

        for i in &sorted {
            assert!(above.contains(i) || below.contains(i));
        }
        // Elements equal to the threshold land in both.
        assert_eq!(above.len() + below.len(), sorted.len() + 2);
    }

    #[test]
    fn test_no_policy_selected() {
        let err = policy(SortOrder::None, FilterMode::None, 0.5)
            .select(&[0.1])
            .unwrap_err();
        assert!(matches!(
            err,
            LumenError::Validation(ValidationError::NoPolicySelected)
        ));
    }

    #[test]
    fn test_apply_keeps_images_and_scores_aligned() {
        let images = records(3);
        let scores = [0.10, 0.90, 0.50];
        let ranked = policy(SortOrder::Descending, FilterMode::None, 0.0)
            .apply(&images, &scores)
            .unwrap();

        assert_eq!(ranked.len(), 3);
        for (position, r) in ranked.iter().enumerate() {
            assert_eq!(r.position, position);
            assert_eq!(r.id, images[r.source_index].id);
            assert_eq!(r.score, scores[r.source_index]);
        }
        assert_eq!(ranked[0].name, "1.jpg");
    }

    #[test]
    fn test_apply_rejects_misaligned_input() {
        let err = policy(SortOrder::Descending, FilterMode::None, 0.0)
            .apply(&records(2), &[0.1])
            .unwrap_err();
        assert!(matches!(
            err,
            LumenError::Pipeline(PipelineError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_short_forms() {
        assert_eq!(SortOrder::parse("DESC"), Some(SortOrder::Descending));
        assert_eq!(SortOrder::parse("asc"), Some(SortOrder::Ascending));
        assert_eq!(FilterMode::parse("above"), Some(FilterMode::KeepAbove));
        assert_eq!(FilterMode::parse("keep_below"), Some(FilterMode::KeepBelow));
        assert_eq!(FilterMode::parse("sideways"), None);
    }
}
