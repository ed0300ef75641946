//! Ranked leaderboard view derived from the rating table

use crate::rating::elo::round_half_up;
use crate::types::{CompetitorName, RatingTable};
use serde::{Deserialize, Serialize};

/// Numerator of the cosmetic ± figure shown next to a score
pub const CONFIDENCE_INTERVAL_CONSTANT: f64 = 150.0;

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    /// 1-based position
    pub rank: usize,
    pub name: CompetitorName,
    pub score: i64,
    pub votes: u64,
    /// `round(150 / sqrt(votes))`, only once a competitor has two votes
    pub confidence_interval: Option<i64>,
}

/// Cosmetic uncertainty figure for a vote count
pub fn confidence_interval(votes: u64) -> Option<i64> {
    if votes < 2 {
        return None;
    }
    Some(round_half_up(
        CONFIDENCE_INTERVAL_CONSTANT / (votes as f64).sqrt(),
    ))
}

/// Rank competitors by score, highest first. Equal scores are ordered by name.
pub fn standings(table: &RatingTable) -> Vec<Standing> {
    let mut rows: Vec<_> = table.iter().collect();
    rows.sort_by(|(name_a, a), (name_b, b)| b.score.cmp(&a.score).then_with(|| name_a.cmp(name_b)));

    rows.into_iter()
        .enumerate()
        .map(|(index, (name, record))| Standing {
            rank: index + 1,
            name: name.clone(),
            score: record.score,
            votes: record.votes,
            confidence_interval: confidence_interval(record.votes),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RatingRecord;

    #[test]
    fn test_confidence_interval() {
        assert_eq!(confidence_interval(0), None);
        assert_eq!(confidence_interval(1), None);
        assert_eq!(confidence_interval(2), Some(106));
        assert_eq!(confidence_interval(4), Some(75));
        assert_eq!(confidence_interval(100), Some(15));
    }

    #[test]
    fn test_standings_sorted_by_score() {
        let mut table = RatingTable::new();
        table.insert("low".to_string(), RatingRecord { score: 950, votes: 3 });
        table.insert("high".to_string(), RatingRecord { score: 1100, votes: 1 });
        table.insert("mid-b".to_string(), RatingRecord { score: 1000, votes: 2 });
        table.insert("mid-a".to_string(), RatingRecord { score: 1000, votes: 2 });

        let rows = standings(&table);
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["high", "mid-a", "mid-b", "low"]);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].confidence_interval, None);
        assert_eq!(rows[3].rank, 4);
        assert_eq!(rows[3].confidence_interval, Some(87));
    }

    #[test]
    fn test_empty_table() {
        assert!(standings(&RatingTable::new()).is_empty());
    }
}
