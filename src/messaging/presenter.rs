use serde::{Deserialize, Serialize};

use crate::messaging::RoomEvent;
use crate::store::ContentKind;

#[derive(Debug, Deserialize)]
pub struct ShareContentMessage {
    pub kind: ContentKind,
    /// `None` withdraws whatever of this kind was shared.
    pub id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SetSlideMessage {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub enum IncomingPresenterMessage {
    ShareContent(ShareContentMessage),
    SetSlide(SetSlideMessage),
    SetTimer { minutes: u32 },
    SetLeaderboard { visible: bool },
    GetTally { poll_id: u64 },
    StopSession,
}

impl std::fmt::Display for IncomingPresenterMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShareContent(msg) => match msg.id {
                Some(id) => write!(f, "share {} {id}", msg.kind),
                None => write!(f, "clear shared {}", msg.kind),
            },
            Self::SetSlide(msg) => write!(f, "move to slide {}", msg.index),
            Self::SetTimer { minutes } => write!(f, "set countdown to {minutes} minutes"),
            Self::SetLeaderboard { visible } => write!(f, "set leaderboard visible: {visible}"),
            Self::GetTally { poll_id } => write!(f, "request tally for poll {poll_id}"),
            Self::StopSession => write!(f, "stop session"),
        }
    }
}

#[derive(Debug, Serialize)]
pub enum OutgoingPresenterMessage {
    Event(RoomEvent),
    Tally { poll_id: u64, counts: Vec<u64> },
    Error(String),
}

impl OutgoingPresenterMessage {
    pub fn json(&self) -> String {
        match serde_json::to_string(&self) {
            Ok(text) => text,
            Err(e) => {
                error!("Could not serialize outgoing presenter message: {e}");
                String::new()
            }
        }
    }
}
