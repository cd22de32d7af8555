use crate::messaging::{OutgoingUserMessage, RoomEvent};
use crate::room::{QuizProgress, Room};
use crate::store::{Store, Submission};
use crate::Viewer;

use super::broadcast_to_room;

/// Record a poll answer and push fresh counts to the room. The answer is
/// the participant's own data so failures there go back to them; a tally
/// recompute failure only affects passive viewing and is logged, leaving
/// everyone's last counts on screen.
pub async fn handle_poll_answer(
    store: &Store,
    room: &Room,
    viewer: &Viewer,
    poll_id: u64,
    option: usize,
) {
    if let Err(e) = store.submit_poll_answer(&viewer.identity, poll_id, option, viewer.session) {
        warn!("{} could not answer poll {poll_id}: {e}", viewer.identity);
        viewer.send_ignore_fail(OutgoingUserMessage::Error(e.to_string()));
        return;
    }

    viewer.send_ignore_fail(OutgoingUserMessage::Success("answer recorded".to_string()));

    match store.tally(poll_id, viewer.session) {
        Ok(counts) => broadcast_to_room(RoomEvent::TallyChanged { poll_id, counts }, room).await,
        Err(e) => error!("Could not recount poll {poll_id} after an answer: {e}"),
    }
}

/// Evaluate one quiz answer against the currently shared bank and keep the
/// participant's running total. When the last question lands the total is
/// submitted; `flush_unsubmitted` covers participants the bank switches
/// away from first.
pub async fn handle_quiz_answer(
    store: &Store,
    room: &Room,
    viewer: &Viewer,
    question: usize,
    option: usize,
) {
    let bank_id = match store.session(viewer.session).and_then(|s| s.bank_id) {
        Some(id) => id,
        None => {
            viewer.send_ignore_fail(OutgoingUserMessage::Error(
                "no question bank is currently shared".to_string(),
            ));
            return;
        }
    };

    let bank = match store.bank(bank_id) {
        Some(bank) => bank,
        None => {
            error!("Session {} references missing bank {bank_id}", viewer.session);
            viewer.send_ignore_fail(OutgoingUserMessage::Error(
                "the shared question bank no longer exists".to_string(),
            ));
            return;
        }
    };

    let total = bank.questions.len();
    if question >= total {
        viewer.send_ignore_fail(OutgoingUserMessage::Error(format!(
            "question {question} is out of range for a bank with {total} questions"
        )));
        return;
    }

    let correct = bank.questions[question].is_correct(option);

    let (finished, score, already_submitted) = {
        let mut progress = room
            .quiz
            .entry(viewer.identity.clone())
            .or_insert_with(|| QuizProgress::for_bank(bank_id));
        if progress.bank_id != bank_id {
            *progress = QuizProgress::for_bank(bank_id);
        }
        if !progress.answered.insert(question) {
            drop(progress);
            viewer.send_ignore_fail(OutgoingUserMessage::Error(format!(
                "question {question} was already answered"
            )));
            return;
        }
        if correct {
            progress.correct += 1;
        }
        (
            progress.answered.len() == total,
            progress.correct,
            progress.submitted,
        )
    };

    viewer.send_ignore_fail(OutgoingUserMessage::AnswerResult { question, correct });

    if finished && !already_submitted {
        submit_total(store, room, viewer, bank_id, score).await;
    }
}

/// Push one participant's total to the store, exactly once per
/// `(regno, session, bank)`. The in-room `submitted` flag is only there to
/// save redundant store calls; the store's insert-if-absent check is what
/// actually guarantees a duplicate cannot overwrite anything. The attempt
/// is not retried on failure, but the failure does go back to the
/// participant since it is their score on the line.
async fn submit_total(store: &Store, room: &Room, viewer: &Viewer, bank_id: u64, score: u32) {
    match store.submit_quiz_score(&viewer.identity, bank_id, viewer.session, score) {
        Ok(Submission::Recorded) => {
            info!(
                "{} finished bank {bank_id} in session {} with {score}",
                viewer.identity, viewer.session
            );
            viewer.send_ignore_fail(OutgoingUserMessage::ScoreRecorded { bank_id, score });
        }
        Ok(Submission::AlreadyRecorded) => {
            info!(
                "Duplicate score submission from {} for bank {bank_id} absorbed",
                viewer.identity
            );
        }
        Err(e) => {
            warn!("Could not record score for {}: {e}", viewer.identity);
            viewer.send_ignore_fail(OutgoingUserMessage::Error(format!(
                "your score could not be recorded: {e}"
            )));
        }
    }

    if let Some(mut progress) = room.quiz.get_mut(&viewer.identity) {
        progress.submitted = true;
    }
}

/// Submit the running total of everyone who has started the outgoing bank
/// but not finished it. Called when the presenter shares a different bank,
/// mirroring the submit-on-switch each participant would do for itself.
pub async fn flush_unsubmitted(store: &Store, room: &Room, session: u32) {
    // Collect first so no map shard is held across store calls
    let pending: Vec<(String, u64, u32)> = room
        .quiz
        .iter()
        .filter(|progress| !progress.submitted)
        .map(|progress| (progress.key().clone(), progress.bank_id, progress.correct))
        .collect();

    for (regno, bank_id, score) in pending {
        match store.submit_quiz_score(&regno, bank_id, session, score) {
            Ok(Submission::Recorded) => {
                info!("Flushed score {score} for {regno} on bank switch");
                notify_viewer(room, &regno, OutgoingUserMessage::ScoreRecorded { bank_id, score });
            }
            Ok(Submission::AlreadyRecorded) => {
                info!("Score for {regno} on bank {bank_id} was already recorded");
            }
            Err(e) => warn!("Could not flush score for {regno}: {e}"),
        }
        if let Some(mut progress) = room.quiz.get_mut(&regno) {
            progress.submitted = true;
        }
    }
}

fn notify_viewer(room: &Room, regno: &str, message: OutgoingUserMessage) {
    let text = message.json();
    room.viewers
        .iter()
        .filter(|viewer| viewer.identity == regno)
        .for_each(|viewer| {
            if let Some(ref sender) = viewer.sender {
                let _ = sender.send(Ok(warp::ws::Message::text(&text)));
            }
        });
}
