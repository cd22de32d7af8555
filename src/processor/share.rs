use crate::messaging::{
    OutgoingPresenterMessage, RoomEvent, SetSlideMessage, ShareContentMessage,
};
use crate::room::{Room, SlideState};
use crate::store::{ContentKind, SessionSetting, Store};
use crate::Presenter;

use super::{broadcast_to_room, response};

/// Share a content item into the session: persist the reference, then
/// announce it. The persisted value is what late joiners read; the
/// broadcast is only a low-latency hint for sockets that are already
/// connected. A failed persist is reported to the presenter and never
/// broadcast.
pub async fn handle_share(
    store: &Store,
    room: &Room,
    presenter: &Presenter,
    msg: ShareContentMessage,
) {
    // A bank share ends the previous quiz round for everyone still on it:
    // their running totals go in before the reference (and its clock)
    // moves.
    if msg.kind == ContentKind::QuestionBank {
        let outgoing_bank = store.session(presenter.session).and_then(|s| s.bank_id);
        if presenter_owns_session(store, presenter) && outgoing_bank.is_some() {
            response::flush_unsubmitted(store, room, presenter.session).await;
        }
    }

    match store.set_session_content(presenter.session, &presenter.identity, msg.kind, msg.id) {
        Ok(_) => {
            match msg.kind {
                ContentKind::Presentation => {
                    let mut slide = room.slide.write().await;
                    *slide = msg.id.map(|id| SlideState {
                        presentation_id: id,
                        index: 0,
                    });
                }
                ContentKind::QuestionBank => {
                    // Fresh accumulators for the incoming bank
                    room.quiz.clear();
                }
                ContentKind::Poll => {}
            }
            broadcast_to_room(
                RoomEvent::ContentShared {
                    kind: msg.kind,
                    id: msg.id,
                },
                room,
            )
            .await;
        }
        Err(e) => {
            warn!(
                "{} could not share {} into session {}: {e}",
                presenter.identity, msg.kind, presenter.session
            );
            presenter.send_ignore_fail(OutgoingPresenterMessage::Error(e.to_string()));
        }
    }
}

/// Slide advance within the currently shared deck. Purely ephemeral: the
/// index lives with the room and is re-broadcast, never persisted to the
/// session record.
pub async fn handle_set_slide(
    store: &Store,
    room: &Room,
    presenter: &Presenter,
    msg: SetSlideMessage,
) {
    let presentation_id = match store.session(presenter.session).and_then(|s| s.presentation_id) {
        Some(id) => id,
        None => {
            presenter.send_ignore_fail(OutgoingPresenterMessage::Error(
                "no presentation is currently shared".to_string(),
            ));
            return;
        }
    };

    {
        let mut slide = room.slide.write().await;
        *slide = Some(SlideState {
            presentation_id,
            index: msg.index,
        });
    }

    broadcast_to_room(
        RoomEvent::SlideChanged {
            presentation_id,
            index: msg.index,
        },
        room,
    )
    .await;
}

pub async fn handle_set_timer(store: &Store, room: &Room, presenter: &Presenter, minutes: u32) {
    match store.set_session_setting(
        presenter.session,
        &presenter.identity,
        SessionSetting::TimeoutMinutes(minutes),
    ) {
        Ok(_) => broadcast_to_room(RoomEvent::TimerSet { minutes }, room).await,
        Err(e) => {
            warn!("{} could not set the countdown: {e}", presenter.identity);
            presenter.send_ignore_fail(OutgoingPresenterMessage::Error(e.to_string()));
        }
    }
}

pub async fn handle_set_leaderboard(
    store: &Store,
    room: &Room,
    presenter: &Presenter,
    visible: bool,
) {
    match store.set_session_setting(
        presenter.session,
        &presenter.identity,
        SessionSetting::LeaderboardVisible(visible),
    ) {
        Ok(_) => broadcast_to_room(RoomEvent::LeaderboardToggled { visible }, room).await,
        Err(e) => {
            warn!("{} could not toggle the leaderboard: {e}", presenter.identity);
            presenter.send_ignore_fail(OutgoingPresenterMessage::Error(e.to_string()));
        }
    }
}

pub async fn handle_stop(store: &Store, room: &Room, presenter: &Presenter) {
    match store.stop_session(presenter.session, &presenter.identity) {
        Ok(_) => broadcast_to_room(RoomEvent::SessionStopped, room).await,
        Err(e) => {
            warn!("{} could not stop session {}: {e}", presenter.identity, presenter.session);
            presenter.send_ignore_fail(OutgoingPresenterMessage::Error(e.to_string()));
        }
    }
}

fn presenter_owns_session(store: &Store, presenter: &Presenter) -> bool {
    store
        .session(presenter.session)
        .map(|s| s.teacher == presenter.identity)
        .unwrap_or(false)
}
