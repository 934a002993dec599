//! Consensus computation.
//!
//! Pure functions over the current vote set of an item; never stored,
//! always recomputed, so replicas that hold the same votes report the
//! same consensus.

use yoriai_shared::protocol::{ConsensusResult, EstimateValue, Scale};

use super::entity::Vote;

/// Compute the consensus for an item from its current votes.
///
/// - Fibonacci: unanimous iff every vote is the same numeric value and no
///   sentinel is present. The average covers numeric votes only; the
///   `NeedInfo` / `TooBig` sentinels are excluded from it and force
///   `is_unanimous = false`.
/// - T-shirt: unanimous iff every label is equal; no average is computed.
pub fn compute_consensus(scale: Scale, votes: &[Vote]) -> ConsensusResult {
    if votes.is_empty() {
        return ConsensusResult {
            value: None,
            is_unanimous: false,
            average: None,
        };
    }

    let has_sentinel = votes.iter().any(|v| v.value.is_sentinel());

    match scale {
        Scale::Fibonacci => {
            let points: Vec<u32> = votes
                .iter()
                .filter_map(|v| match v.value {
                    EstimateValue::Points { points } => Some(points),
                    _ => None,
                })
                .collect();

            let average = if points.is_empty() {
                None
            } else {
                let mean = points.iter().map(|p| *p as f64).sum::<f64>() / points.len() as f64;
                Some((mean * 100.0).round() / 100.0)
            };

            let unanimous = !has_sentinel
                && !points.is_empty()
                && points.len() == votes.len()
                && points.iter().all(|p| *p == points[0]);

            ConsensusResult {
                value: unanimous.then(|| EstimateValue::Points { points: points[0] }),
                is_unanimous: unanimous,
                average,
            }
        }
        Scale::TShirt => {
            let sizes: Vec<_> = votes
                .iter()
                .filter_map(|v| match v.value {
                    EstimateValue::Shirt { size } => Some(size),
                    _ => None,
                })
                .collect();

            let unanimous = !has_sentinel
                && !sizes.is_empty()
                && sizes.len() == votes.len()
                && sizes.iter().all(|s| *s == sizes[0]);

            ConsensusResult {
                value: unanimous.then(|| EstimateValue::Shirt { size: sizes[0] }),
                is_unanimous: unanimous,
                average: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::{ItemId, UserId};
    use yoriai_shared::protocol::ShirtSize;

    fn vote(voter: &str, value: EstimateValue) -> Vote {
        Vote {
            item_id: ItemId::new("item-1".to_string()).unwrap(),
            voter_id: UserId::new(voter.to_string()).unwrap(),
            voter_name: voter.to_string(),
            value,
            submitted_at: 1000,
            revealed: false,
        }
    }

    fn points(voter: &str, p: u32) -> Vote {
        vote(voter, EstimateValue::Points { points: p })
    }

    fn shirt(voter: &str, size: ShirtSize) -> Vote {
        vote(voter, EstimateValue::Shirt { size })
    }

    #[test]
    fn test_fibonacci_unanimous() {
        // テスト項目: 全員が同じ数値なら全会一致になる
        // given (前提条件):
        let votes = vec![points("alice", 5), points("bob", 5), points("charlie", 5)];

        // when (操作):
        let result = compute_consensus(Scale::Fibonacci, &votes);

        // then (期待する結果):
        assert!(result.is_unanimous);
        assert_eq!(result.value, Some(EstimateValue::Points { points: 5 }));
        assert_eq!(result.average, Some(5.0));
    }

    #[test]
    fn test_fibonacci_split_reports_average() {
        // テスト項目: 割れた数値投票は平均値を報告する
        // given (前提条件):
        let votes = vec![points("alice", 5), points("bob", 8), points("charlie", 13)];

        // when (操作):
        let result = compute_consensus(Scale::Fibonacci, &votes);

        // then (期待する結果):
        assert!(!result.is_unanimous);
        assert_eq!(result.value, None);
        assert_eq!(result.average, Some(8.67));
    }

    #[test]
    fn test_tshirt_split_has_no_average() {
        // テスト項目: T シャツスケールでは平均が計算されない
        // given (前提条件):
        let votes = vec![
            shirt("alice", ShirtSize::M),
            shirt("bob", ShirtSize::M),
            shirt("charlie", ShirtSize::L),
        ];

        // when (操作):
        let result = compute_consensus(Scale::TShirt, &votes);

        // then (期待する結果):
        assert!(!result.is_unanimous);
        assert_eq!(result.value, None);
        assert_eq!(result.average, None);
    }

    #[test]
    fn test_tshirt_unanimous() {
        // テスト項目: 全員が同じラベルなら全会一致になる
        // given (前提条件):
        let votes = vec![shirt("alice", ShirtSize::L), shirt("bob", ShirtSize::L)];

        // when (操作):
        let result = compute_consensus(Scale::TShirt, &votes);

        // then (期待する結果):
        assert!(result.is_unanimous);
        assert_eq!(result.value, Some(EstimateValue::Shirt { size: ShirtSize::L }));
    }

    #[test]
    fn test_sentinel_excluded_from_average_and_blocks_unanimity() {
        // テスト項目: TooBig は平均に寄与せず、他が一致していても全会一致を妨げる
        // given (前提条件):
        let votes = vec![
            points("alice", 8),
            points("bob", 8),
            vote("charlie", EstimateValue::TooBig),
        ];

        // when (操作):
        let result = compute_consensus(Scale::Fibonacci, &votes);

        // then (期待する結果):
        assert!(!result.is_unanimous);
        assert_eq!(result.value, None);
        assert_eq!(result.average, Some(8.0));
    }

    #[test]
    fn test_only_sentinels_yields_no_average() {
        // テスト項目: センチネルのみの投票では平均も値も無い
        // given (前提条件):
        let votes = vec![
            vote("alice", EstimateValue::NeedInfo),
            vote("bob", EstimateValue::TooBig),
        ];

        // when (操作):
        let result = compute_consensus(Scale::Fibonacci, &votes);

        // then (期待する結果):
        assert!(!result.is_unanimous);
        assert_eq!(result.average, None);
        assert_eq!(result.value, None);
    }

    #[test]
    fn test_empty_votes() {
        // テスト項目: 投票が無い場合は全会一致にならない
        // given (前提条件):
        let votes: Vec<Vote> = vec![];

        // when (操作):
        let result = compute_consensus(Scale::Fibonacci, &votes);

        // then (期待する結果):
        assert!(!result.is_unanimous);
        assert_eq!(result.average, None);
    }
}
