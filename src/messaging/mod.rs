use serde::{Deserialize, Serialize};

use crate::store::ContentKind;

pub mod presenter;
pub mod user;

pub use presenter::*;
pub use user::*;

/// Everything that can be announced on a room channel. A closed union so
/// receivers can match exhaustively instead of string-comparing a type
/// field. Delivery is fire-and-forget with no ordering guarantee; every
/// variant is safe to replay because applying one is idempotent.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub enum RoomEvent {
    /// `id = None` means the slot was cleared and nothing of that kind is
    /// shared any more.
    ContentShared {
        kind: ContentKind,
        id: Option<u64>,
    },
    /// Slide advance within the presentation that is already shared.
    /// Receivers that are showing the same deck only move the index.
    SlideChanged {
        presentation_id: u64,
        index: usize,
    },
    TimerSet {
        minutes: u32,
    },
    LeaderboardToggled {
        visible: bool,
    },
    /// Fresh per-option counts for a poll, recomputed after each answer.
    TallyChanged {
        poll_id: u64,
        counts: Vec<u64>,
    },
    SessionStopped,
}

