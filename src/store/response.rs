use chrono::Utc;

use super::{ContentKind, Store, StoreError};
use serde::Serialize;

/// Aggregate quiz result for one participant in one session, one row per
/// `(regno, bank, session)`. The leaderboard is derived from these rows and
/// never stored separately.
#[derive(Clone, Debug, Serialize)]
pub struct ScoreRow {
    pub regno: String,
    pub bank_id: u64,
    pub session: u32,
    pub score: u32,
    /// Seconds between the bank being shared and this row landing.
    pub elapsed_secs: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Outcome of a score submission. A duplicate is absorbed, not an error:
/// retries, re-renders and second tabs all funnel into `AlreadyRecorded`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    Recorded,
    AlreadyRecorded,
}

impl Store {
    /// Record a poll answer. Upsert keyed by `(regno, poll, session)`:
    /// answering again overwrites, last write wins, no history kept.
    pub fn submit_poll_answer(
        &self,
        regno: &str,
        poll_id: u64,
        option: usize,
        session: u32,
    ) -> std::result::Result<(), StoreError> {
        let poll = self
            .poll(poll_id)
            .ok_or(StoreError::UnknownContent(ContentKind::Poll, poll_id))?;
        if option >= poll.options.len() {
            return Err(StoreError::OptionOutOfRange {
                option,
                options: poll.options.len(),
            });
        }

        self.poll_responses
            .insert((regno.to_string(), poll_id, session), option);
        Ok(())
    }

    /// Recount every response row for the poll. Recomputed in full on every
    /// change rather than maintained incrementally; one classroom's worth of
    /// rows does not justify counters.
    pub fn tally(&self, poll_id: u64, session: u32) -> std::result::Result<Vec<u64>, StoreError> {
        let poll = self
            .poll(poll_id)
            .ok_or(StoreError::UnknownContent(ContentKind::Poll, poll_id))?;

        let mut counts = vec![0u64; poll.options.len()];
        for entry in self.poll_responses.iter() {
            let (_, row_poll, row_session) = entry.key();
            if *row_poll == poll_id && *row_session == session {
                if let Some(count) = counts.get_mut(*entry.value()) {
                    *count += 1;
                }
            }
        }
        Ok(counts)
    }

    /// Record a participant's total for a bank. Insert-if-absent: the first
    /// row for `(regno, bank, session)` wins and later calls are no-ops.
    /// This check is the real duplicate guard; any client-side flag only
    /// exists to save the round trip.
    pub fn submit_quiz_score(
        &self,
        regno: &str,
        bank_id: u64,
        session: u32,
        score: u32,
    ) -> std::result::Result<Submission, StoreError> {
        if self.bank(bank_id).is_none() {
            return Err(StoreError::UnknownContent(ContentKind::QuestionBank, bank_id));
        }

        let now = Utc::now();
        let elapsed_secs = self
            .session(session)
            .and_then(|s| s.bank_shared_at)
            .map(|shared| (now - shared).num_seconds().max(0))
            .unwrap_or(0);

        // The entry keeps check-and-insert atomic, so a second tab racing
        // the first still cannot overwrite
        match self.scores.entry((regno.to_string(), bank_id, session)) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(Submission::AlreadyRecorded),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(ScoreRow {
                    regno: regno.to_string(),
                    bank_id,
                    session,
                    score,
                    elapsed_secs,
                    created_at: now,
                });
                Ok(Submission::Recorded)
            }
        }
    }

    /// All aggregate rows for a session, unordered. Feed them through
    /// `leaderboard::rank` for display.
    pub fn score_rows(&self, session: u32) -> Vec<ScoreRow> {
        self.scores
            .iter()
            .filter(|entry| entry.session == session)
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::store::{Question, Store, StoreError, Submission};

    fn store_with_poll() -> (Store, u64, u32) {
        let store = Store::new();
        let session = store.create_session("alice");
        let poll = store.create_poll(
            "alice",
            "Best editor".into(),
            vec!["vim".into(), "emacs".into(), "helix".into()],
            None,
        );
        (store, poll.id, session.code)
    }

    #[test]
    fn poll_answers_upsert_per_participant() {
        let (store, poll, session) = store_with_poll();

        store.submit_poll_answer("21CS001", poll, 0, session).unwrap();
        store.submit_poll_answer("21CS001", poll, 0, session).unwrap();
        assert_eq!(store.tally(poll, session).unwrap(), vec![1, 0, 0]);

        // A different option for the same key overwrites, still one row
        store.submit_poll_answer("21CS001", poll, 2, session).unwrap();
        assert_eq!(store.tally(poll, session).unwrap(), vec![0, 0, 1]);

        store.submit_poll_answer("21CS002", poll, 2, session).unwrap();
        assert_eq!(store.tally(poll, session).unwrap(), vec![0, 0, 2]);
    }

    #[test]
    fn poll_answers_validate_the_option_index() {
        let (store, poll, session) = store_with_poll();
        assert!(matches!(
            store.submit_poll_answer("21CS001", poll, 3, session),
            Err(StoreError::OptionOutOfRange { option: 3, options: 3 })
        ));
    }

    #[test]
    fn tallies_are_scoped_to_the_session() {
        let (store, poll, session) = store_with_poll();
        let other = store.create_session("alice");

        store.submit_poll_answer("21CS001", poll, 1, session).unwrap();
        store.submit_poll_answer("21CS001", poll, 2, other.code).unwrap();

        assert_eq!(store.tally(poll, session).unwrap(), vec![0, 1, 0]);
        assert_eq!(store.tally(poll, other.code).unwrap(), vec![0, 0, 1]);
    }

    #[test]
    fn first_quiz_score_wins() {
        let store = Store::new();
        let session = store.create_session("alice");
        let bank = store.create_bank(
            "alice",
            "Unit 2".into(),
            vec![Question {
                title: "q".into(),
                options: vec!["a".into(), "b".into()],
                correct: 0,
            }],
        );

        assert_eq!(
            store.submit_quiz_score("21CS001", bank.id, session.code, 7).unwrap(),
            Submission::Recorded
        );
        assert_eq!(
            store.submit_quiz_score("21CS001", bank.id, session.code, 9).unwrap(),
            Submission::AlreadyRecorded
        );

        let rows = store.score_rows(session.code);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].score, 7);
    }

    #[test]
    fn scores_for_an_unknown_bank_are_rejected() {
        let store = Store::new();
        let session = store.create_session("alice");
        assert!(store
            .submit_quiz_score("21CS001", 404, session.code, 3)
            .is_err());
    }
}
