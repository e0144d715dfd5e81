//! Reciprocal Rank Fusion
//!
//! Combines the dense and sparse rankings into one list using only rank
//! positions. Rank-based fusion is scale-invariant: cosine distances and
//! BM25 scores never need to be normalized against each other.

use crate::corpus::RecordId;
use std::collections::HashMap;

/// Standard RRF smoothing constant
pub const RRF_K: f32 = 60.0;

/// Fuse two ranked lists with Reciprocal Rank Fusion.
///
/// Each record contributes `1 / (smoothing + rank)` per list it appears
/// in, ranks 1-based. Records in neither list are absent from the output
/// (not ranked last). The output is descending by fused score, capped at
/// `k` entries; score ties are broken by ascending record id, which makes
/// the function symmetric in its two list arguments.
pub fn reciprocal_rank_fusion(
    dense_ranked: &[RecordId],
    sparse_ranked: &[RecordId],
    k: usize,
    smoothing: f32,
) -> Vec<(RecordId, f32)> {
    let mut scores: HashMap<RecordId, f32> = HashMap::new();

    for list in [dense_ranked, sparse_ranked] {
        for (i, &id) in list.iter().enumerate() {
            let rank = (i + 1) as f32;
            *scores.entry(id).or_insert(0.0) += 1.0 / (smoothing + rank);
        }
    }

    let mut fused: Vec<(RecordId, f32)> = scores.into_iter().collect();
    fused.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    fused.truncate(k);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_in_both_lists_beats_single_list_rank_one() {
        // Record 0 is rank 1 in both lists; record 1 is rank 1 in one only
        let fused = reciprocal_rank_fusion(&[0, 2], &[1, 0], 10, RRF_K);

        let score = |id: RecordId| fused.iter().find(|(r, _)| *r == id).unwrap().1;
        assert!(score(0) > score(1));
        assert!(score(0) > score(2));
    }

    #[test]
    fn test_expected_rrf_scores() {
        let fused = reciprocal_rank_fusion(&[0, 1], &[1, 2], 10, RRF_K);

        let score = |id: RecordId| fused.iter().find(|(r, _)| *r == id).unwrap().1;
        // id 1: 1/(60+2) + 1/(60+1); id 0: 1/(60+1); id 2: 1/(60+2)
        assert!((score(1) - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-6);
        assert!((score(0) - 1.0 / 61.0).abs() < 1e-6);
        assert!((score(2) - 1.0 / 62.0).abs() < 1e-6);
        assert_eq!(fused[0].0, 1);
    }

    #[test]
    fn test_fusion_is_commutative() {
        let dense = vec![4, 2, 9, 1];
        let sparse = vec![7, 2, 5];

        let a = reciprocal_rank_fusion(&dense, &sparse, 10, RRF_K);
        let b = reciprocal_rank_fusion(&sparse, &dense, 10, RRF_K);
        assert_eq!(a, b);
    }

    #[test]
    fn test_absent_records_are_excluded() {
        let fused = reciprocal_rank_fusion(&[3], &[5], 10, RRF_K);

        assert_eq!(fused.len(), 2);
        assert!(fused.iter().all(|(id, _)| *id == 3 || *id == 5));
    }

    #[test]
    fn test_empty_inputs_fuse_to_empty() {
        assert!(reciprocal_rank_fusion(&[], &[], 10, RRF_K).is_empty());
    }

    #[test]
    fn test_output_capped_at_k() {
        let fused = reciprocal_rank_fusion(&[0, 1, 2, 3], &[4, 5, 6, 7], 3, RRF_K);
        assert_eq!(fused.len(), 3);
    }

    #[test]
    fn test_ties_broken_by_record_id() {
        // Records 8 and 2 each appear once at rank 1, so they tie
        let fused = reciprocal_rank_fusion(&[8], &[2], 10, RRF_K);
        assert_eq!(fused[0].0, 2);
        assert_eq!(fused[1].0, 8);
    }
}
