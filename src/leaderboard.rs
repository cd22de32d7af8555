use serde::Serialize;

use crate::store::ScoreRow;

#[derive(Clone, Debug, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub regno: String,
    pub bank_id: u64,
    pub score: u32,
    pub elapsed_secs: i64,
}

/// Total order over a session's aggregate rows: the most recently
/// introduced bank first (ids are monotonic), higher score breaks ties
/// within a bank, earlier completion breaks score ties. Tied entries are
/// never merged; distinct `(regno, bank)` pairs stay distinct rows.
pub fn rank(mut rows: Vec<ScoreRow>) -> Vec<LeaderboardEntry> {
    rows.sort_by(|a, b| {
        b.bank_id
            .cmp(&a.bank_id)
            .then(b.score.cmp(&a.score))
            .then(a.elapsed_secs.cmp(&b.elapsed_secs))
    });

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| LeaderboardEntry {
            rank: i + 1,
            regno: row.regno,
            bank_id: row.bank_id,
            score: row.score,
            elapsed_secs: row.elapsed_secs,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(regno: &str, bank_id: u64, score: u32, elapsed_secs: i64) -> ScoreRow {
        ScoreRow {
            regno: regno.into(),
            bank_id,
            session: 1,
            score,
            elapsed_secs,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn newest_bank_outranks_any_score_on_older_banks() {
        let ranked = rank(vec![
            row("a", 2, 10, 5),
            row("b", 2, 10, 3),
            row("c", 3, 1, 1),
        ]);

        // bank desc, then score desc, then time asc
        assert_eq!(ranked[0].regno, "c");
        assert_eq!(ranked[1].regno, "b");
        assert_eq!(ranked[2].regno, "a");
        assert_eq!(
            ranked.iter().map(|e| e.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn faster_completion_breaks_score_ties() {
        let ranked = rank(vec![
            row("slow", 1, 4, 120),
            row("fast", 1, 4, 45),
            row("low", 1, 2, 10),
        ]);
        assert_eq!(ranked[0].regno, "fast");
        assert_eq!(ranked[1].regno, "slow");
        assert_eq!(ranked[2].regno, "low");
    }

    #[test]
    fn identical_scores_stay_as_distinct_rows() {
        let ranked = rank(vec![row("a", 1, 3, 30), row("b", 1, 3, 30)]);
        assert_eq!(ranked.len(), 2);
        assert_ne!(ranked[0].rank, ranked[1].rank);
    }

    #[test]
    fn empty_input_ranks_to_nothing() {
        assert!(rank(Vec::new()).is_empty());
    }
}
