//! Viewer-side synchronization. The server sends a [`SessionSnapshot`] when
//! a subscription is acknowledged and fire-and-forget [`RoomEvent`]s after
//! that; [`ViewerSync`] is the state machine a viewer runs over the two.
//!
//! The transport promises nothing about ordering or delivery, so the
//! machine treats the last received event as authoritative and makes every
//! transition idempotent instead of sequencing anything. Content swaps are
//! not atomic: a new share becomes `pending` until its fetch resolves and
//! the old content stays displayed in the meantime.

use serde::{Deserialize, Serialize};

use crate::messaging::RoomEvent;
use crate::room::SlideState;
use crate::store::{ContentKind, Session};

/// Durable session state captured for one viewer at subscribe time. A late
/// joiner lands on the currently shared content from this alone, without
/// ever having seen a broadcast.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SessionSnapshot {
    pub session: u32,
    pub presentation_id: Option<u64>,
    pub poll_id: Option<u64>,
    pub bank_id: Option<u64>,
    pub slide_index: usize,
    pub timeout_minutes: u32,
    pub leaderboard_visible: bool,
}

impl SessionSnapshot {
    pub fn capture(session: &Session, slide: Option<SlideState>) -> Self {
        Self {
            session: session.code,
            presentation_id: session.presentation_id,
            poll_id: session.poll_id,
            bank_id: session.bank_id,
            slide_index: slide.map(|s| s.index).unwrap_or(0),
            timeout_minutes: session.timeout_minutes,
            leaderboard_visible: session.leaderboard_visible,
        }
    }

    /// Which of the shared slots the viewer should surface. The record can
    /// hold all three at once; the flow only ever presents one, decks
    /// before polls before banks.
    pub fn surfaced(&self) -> Option<(ContentKind, u64)> {
        self.presentation_id
            .map(|id| (ContentKind::Presentation, id))
            .or(self.poll_id.map(|id| (ContentKind::Poll, id)))
            .or(self.bank_id.map(|id| (ContentKind::QuestionBank, id)))
    }
}

/// What the viewer must do next after feeding the machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncAction {
    None,
    /// Fetch the full content item, then report back through
    /// `complete_fetch` (or `fetch_failed`).
    Fetch { kind: ContentKind, id: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Connecting,
    Synced,
    Closed,
}

pub struct ViewerSync {
    phase: Phase,
    displayed: Option<(ContentKind, u64)>,
    pending: Option<(ContentKind, u64)>,
    slide_index: usize,
    timeout_minutes: u32,
    leaderboard_visible: bool,
    tally: Option<(u64, Vec<u64>)>,
}

impl Default for ViewerSync {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerSync {
    pub fn new() -> Self {
        Self {
            phase: Phase::Connecting,
            displayed: None,
            pending: None,
            slide_index: 0,
            timeout_minutes: 3,
            leaderboard_visible: false,
            tally: None,
        }
    }

    /// Subscribe acknowledgment plus the initial pull of the session
    /// record.
    pub fn seed(&mut self, snapshot: &SessionSnapshot) -> SyncAction {
        if self.phase == Phase::Closed {
            return SyncAction::None;
        }
        self.phase = Phase::Synced;
        self.slide_index = snapshot.slide_index;
        self.timeout_minutes = snapshot.timeout_minutes;
        self.leaderboard_visible = snapshot.leaderboard_visible;

        match snapshot.surfaced() {
            Some((kind, id)) => {
                self.pending = Some((kind, id));
                SyncAction::Fetch { kind, id }
            }
            None => SyncAction::None,
        }
    }

    pub fn apply(&mut self, event: &RoomEvent) -> SyncAction {
        if self.phase != Phase::Synced {
            return SyncAction::None;
        }

        match event {
            RoomEvent::ContentShared { kind, id: Some(id) } => {
                if self.displayed == Some((*kind, *id)) {
                    // Replay of what is already up
                    self.pending = None;
                    return SyncAction::None;
                }
                if *kind == ContentKind::Presentation {
                    self.slide_index = 0;
                }
                self.pending = Some((*kind, *id));
                SyncAction::Fetch { kind: *kind, id: *id }
            }
            RoomEvent::ContentShared { kind, id: None } => {
                if self.displayed.map(|(k, _)| k) == Some(*kind) {
                    self.displayed = None;
                    self.slide_index = 0;
                }
                if self.pending.map(|(k, _)| k) == Some(*kind) {
                    self.pending = None;
                }
                SyncAction::None
            }
            RoomEvent::SlideChanged {
                presentation_id,
                index,
            } => match self.displayed {
                // Same deck, only the index moves, no re-fetch
                Some((ContentKind::Presentation, id)) if id == *presentation_id => {
                    self.slide_index = *index;
                    SyncAction::None
                }
                // A slide event for a deck we missed the share of; treat
                // the event itself as authoritative and pull the deck
                _ => {
                    self.slide_index = *index;
                    self.pending = Some((ContentKind::Presentation, *presentation_id));
                    SyncAction::Fetch {
                        kind: ContentKind::Presentation,
                        id: *presentation_id,
                    }
                }
            },
            RoomEvent::TimerSet { minutes } => {
                self.timeout_minutes = *minutes;
                SyncAction::None
            }
            RoomEvent::LeaderboardToggled { visible } => {
                self.leaderboard_visible = *visible;
                SyncAction::None
            }
            RoomEvent::TallyChanged { poll_id, counts } => {
                self.tally = Some((*poll_id, counts.clone()));
                SyncAction::None
            }
            RoomEvent::SessionStopped => {
                self.displayed = None;
                self.pending = None;
                self.slide_index = 0;
                SyncAction::None
            }
        }
    }

    /// The content fetch resolved; swap it in. Returns false and changes
    /// nothing when the result is stale: the machine was torn down, or a
    /// newer share superseded the fetch while it was in flight.
    pub fn complete_fetch(&mut self, kind: ContentKind, id: u64) -> bool {
        if self.phase != Phase::Synced || self.pending != Some((kind, id)) {
            return false;
        }
        self.pending = None;
        self.displayed = Some((kind, id));
        true
    }

    /// The content fetch failed. The previously displayed content stays up,
    /// stale but present.
    pub fn fetch_failed(&mut self, kind: ContentKind, id: u64) {
        if self.pending == Some((kind, id)) {
            self.pending = None;
        }
    }

    /// Teardown. No event, fetch result, or seed applied afterwards may
    /// mutate what was visible.
    pub fn close(&mut self) {
        self.phase = Phase::Closed;
        self.pending = None;
    }

    pub fn displayed(&self) -> Option<(ContentKind, u64)> {
        self.displayed
    }

    pub fn slide_index(&self) -> usize {
        self.slide_index
    }

    pub fn tally(&self) -> Option<&(u64, Vec<u64>)> {
        self.tally.as_ref()
    }

    pub fn timeout_minutes(&self) -> u32 {
        self.timeout_minutes
    }

    pub fn leaderboard_visible(&self) -> bool {
        self.leaderboard_visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(poll_id: Option<u64>) -> SessionSnapshot {
        SessionSnapshot {
            session: 123456,
            presentation_id: None,
            poll_id,
            bank_id: None,
            slide_index: 0,
            timeout_minutes: 3,
            leaderboard_visible: false,
        }
    }

    #[test]
    fn late_joiner_lands_on_shared_content_from_the_snapshot_alone() {
        let mut sync = ViewerSync::new();
        let action = sync.seed(&snapshot(Some(7)));
        assert_eq!(
            action,
            SyncAction::Fetch {
                kind: ContentKind::Poll,
                id: 7
            }
        );
        assert!(sync.complete_fetch(ContentKind::Poll, 7));
        assert_eq!(sync.displayed(), Some((ContentKind::Poll, 7)));
    }

    #[test]
    fn previous_content_stays_up_until_the_new_fetch_resolves() {
        let mut sync = ViewerSync::new();
        sync.seed(&snapshot(None));

        sync.apply(&RoomEvent::ContentShared {
            kind: ContentKind::Presentation,
            id: Some(1),
        });
        assert!(sync.complete_fetch(ContentKind::Presentation, 1));

        let action = sync.apply(&RoomEvent::ContentShared {
            kind: ContentKind::Presentation,
            id: Some(2),
        });
        assert_eq!(
            action,
            SyncAction::Fetch {
                kind: ContentKind::Presentation,
                id: 2
            }
        );
        // No flash to empty while deck 2 is still loading
        assert_eq!(sync.displayed(), Some((ContentKind::Presentation, 1)));

        assert!(sync.complete_fetch(ContentKind::Presentation, 2));
        assert_eq!(sync.displayed(), Some((ContentKind::Presentation, 2)));
    }

    #[test]
    fn failed_fetch_leaves_stale_content_displayed() {
        let mut sync = ViewerSync::new();
        sync.seed(&snapshot(None));
        sync.apply(&RoomEvent::ContentShared {
            kind: ContentKind::Poll,
            id: Some(3),
        });
        sync.complete_fetch(ContentKind::Poll, 3);

        sync.apply(&RoomEvent::ContentShared {
            kind: ContentKind::Poll,
            id: Some(4),
        });
        sync.fetch_failed(ContentKind::Poll, 4);
        assert_eq!(sync.displayed(), Some((ContentKind::Poll, 3)));
    }

    #[test]
    fn slide_advance_within_the_same_deck_skips_the_refetch() {
        let mut sync = ViewerSync::new();
        sync.seed(&snapshot(None));
        sync.apply(&RoomEvent::ContentShared {
            kind: ContentKind::Presentation,
            id: Some(5),
        });
        sync.complete_fetch(ContentKind::Presentation, 5);

        let action = sync.apply(&RoomEvent::SlideChanged {
            presentation_id: 5,
            index: 3,
        });
        assert_eq!(action, SyncAction::None);
        assert_eq!(sync.slide_index(), 3);
        assert_eq!(sync.displayed(), Some((ContentKind::Presentation, 5)));
    }

    #[test]
    fn replayed_events_are_idempotent() {
        let mut sync = ViewerSync::new();
        sync.seed(&snapshot(None));

        let share = RoomEvent::ContentShared {
            kind: ContentKind::Poll,
            id: Some(9),
        };
        sync.apply(&share);
        sync.complete_fetch(ContentKind::Poll, 9);

        // Same event again after the content is already up: nothing to do
        assert_eq!(sync.apply(&share), SyncAction::None);
        assert_eq!(sync.displayed(), Some((ContentKind::Poll, 9)));

        let slide = RoomEvent::SlideChanged {
            presentation_id: 11,
            index: 2,
        };
        sync.apply(&slide);
        sync.complete_fetch(ContentKind::Presentation, 11);
        sync.apply(&slide);
        assert_eq!(sync.slide_index(), 2);
        assert_eq!(sync.displayed(), Some((ContentKind::Presentation, 11)));
    }

    #[test]
    fn clearing_a_share_empties_the_screen() {
        let mut sync = ViewerSync::new();
        sync.seed(&snapshot(Some(7)));
        sync.complete_fetch(ContentKind::Poll, 7);

        sync.apply(&RoomEvent::ContentShared {
            kind: ContentKind::Poll,
            id: None,
        });
        assert_eq!(sync.displayed(), None);
    }

    #[test]
    fn nothing_mutates_after_teardown() {
        let mut sync = ViewerSync::new();
        sync.seed(&snapshot(None));
        sync.apply(&RoomEvent::ContentShared {
            kind: ContentKind::Poll,
            id: Some(7),
        });
        sync.close();

        // The in-flight fetch resolves after the viewer is gone
        assert!(!sync.complete_fetch(ContentKind::Poll, 7));
        assert_eq!(sync.displayed(), None);

        assert_eq!(
            sync.apply(&RoomEvent::TallyChanged {
                poll_id: 7,
                counts: vec![1, 2],
            }),
            SyncAction::None
        );
        assert!(sync.tally().is_none());

        assert_eq!(sync.seed(&snapshot(Some(8))), SyncAction::None);
        assert_eq!(sync.displayed(), None);
    }

    #[test]
    fn tally_survives_until_a_newer_one_arrives() {
        let mut sync = ViewerSync::new();
        sync.seed(&snapshot(Some(7)));
        sync.complete_fetch(ContentKind::Poll, 7);

        sync.apply(&RoomEvent::TallyChanged {
            poll_id: 7,
            counts: vec![2, 1],
        });
        assert_eq!(sync.tally(), Some(&(7, vec![2, 1])));

        // A recompute that failed server-side simply never broadcasts;
        // the last good counts remain
        sync.apply(&RoomEvent::TimerSet { minutes: 5 });
        assert_eq!(sync.tally(), Some(&(7, vec![2, 1])));
    }

    #[test]
    fn missed_share_recovers_from_a_slide_event() {
        let mut sync = ViewerSync::new();
        sync.seed(&snapshot(None));

        // The ContentShared broadcast was lost; the next slide advance
        // still names the deck, which is enough to catch up
        let action = sync.apply(&RoomEvent::SlideChanged {
            presentation_id: 4,
            index: 2,
        });
        assert_eq!(
            action,
            SyncAction::Fetch {
                kind: ContentKind::Presentation,
                id: 4
            }
        );
        sync.complete_fetch(ContentKind::Presentation, 4);
        assert_eq!(sync.displayed(), Some((ContentKind::Presentation, 4)));
        assert_eq!(sync.slide_index(), 2);
    }
}
