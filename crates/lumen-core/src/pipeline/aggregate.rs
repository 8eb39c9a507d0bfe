//! Concatenation of per-batch scores and the stable rank permutation.

use crate::error::PipelineError;

/// Concatenate per-batch score vectors in the order the batches were produced.
pub fn aggregate<I>(batch_scores: I) -> Vec<f32>
where
    I: IntoIterator<Item = Vec<f32>>,
{
    batch_scores.into_iter().flatten().collect()
}

/// Indices of `scores` ordered by descending score.
///
/// Ties keep their original relative order. `expected_len` is the number of
/// images the run is tracking; any other length means a batch was dropped or
/// duplicated upstream and is reported as `LengthMismatch` instead of being
/// truncated or padded.
pub fn rank(scores: &[f32], expected_len: usize) -> Result<Vec<usize>, PipelineError> {
    if scores.len() != expected_len {
        return Err(PipelineError::LengthMismatch {
            expected: expected_len,
            actual: scores.len(),
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    // `sort_by` is stable, so equal scores stay in input order.
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descending_example() {
        let order = rank(&[0.10, 0.90, 0.50], 3).unwrap();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_ties_are_stable() {
        let order = rank(&[0.2, 0.9, 0.5, 0.9, 0.2], 5).unwrap();
        assert_eq!(order, vec![1, 3, 2, 0, 4]);
    }

    #[test]
    fn test_rank_is_permutation() {
        let scores: Vec<f32> = (0..57).map(|i| ((i * 37) % 11) as f32 / 7.0 - 0.5).collect();
        let mut order = rank(&scores, scores.len()).unwrap();
        for pair in order.windows(2) {
            assert!(scores[pair[0]] >= scores[pair[1]]);
        }
        order.sort_unstable();
        assert_eq!(order, (0..57).collect::<Vec<_>>());
    }

    #[test]
    fn test_short_vector_is_length_mismatch() {
        let err = rank(&[0.3, 0.2], 3).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::LengthMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_long_vector_is_length_mismatch() {
        assert!(rank(&[0.3, 0.2, 0.1], 2).is_err());
    }

    #[test]
    fn test_empty_rank() {
        assert!(rank(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn test_aggregate_preserves_batch_order() {
        let scores = aggregate(vec![vec![0.1, 0.2], vec![0.3, 0.4], vec![0.5]]);
        assert_eq!(scores, vec![0.1, 0.2, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn test_aggregate_is_partition_independent() {
        let whole: Vec<f32> = vec![0.4, 0.1, 0.9, 0.3, 0.7, 0.2];
        for size in 1..=whole.len() {
            let parts: Vec<Vec<f32>> = whole.chunks(size).map(|c| c.to_vec()).collect();
            assert_eq!(aggregate(parts), whole);
        }
    }
}
