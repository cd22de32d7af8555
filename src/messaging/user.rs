use serde::{Deserialize, Serialize};

use crate::messaging::RoomEvent;
use crate::sync::SessionSnapshot;

#[derive(Debug, Deserialize)]
pub enum IncomingUserMessage {
    /// Vote in a poll. Repeating with a different option overwrites the
    /// earlier answer.
    PollAnswer { poll_id: u64, option: usize },
    /// Answer one question of the currently shared bank. Each question is
    /// evaluated once per participant.
    QuizAnswer { question: usize, option: usize },
}

impl std::fmt::Display for IncomingUserMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PollAnswer { poll_id, option } => {
                write!(f, "option {option} in poll {poll_id}")
            }
            Self::QuizAnswer { question, option } => {
                write!(f, "option {option} for question {question}")
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub enum OutgoingUserMessage {
    /// Durable session state sent once on subscribe so late joiners land on
    /// whatever is currently shared without having seen any broadcast.
    Snapshot(SessionSnapshot),
    Event(RoomEvent),
    AnswerResult { question: usize, correct: bool },
    ScoreRecorded { bank_id: u64, score: u32 },
    Success(String),
    Error(String),
}

impl OutgoingUserMessage {
    pub fn json(&self) -> String {
        match serde_json::to_string(&self) {
            Ok(text) => text,
            Err(e) => {
                error!("Could not serialize outgoing user message: {e}");
                String::new()
            }
        }
    }
}
