pub mod response;
pub mod share;

use warp::ws::Message;

use crate::messaging::{
    IncomingPresenterMessage, IncomingUserMessage, OutgoingPresenterMessage, OutgoingUserMessage,
    RoomEvent,
};
use crate::room::Room;
use crate::store::Store;
use crate::{Presenter, Viewer};

/// Fan an event out to every connection in the room, both sides of the
/// podium. Fire-and-forget: a closed or missed socket is not an error,
/// the durable session record is what late and lossy receivers fall back
/// on.
pub async fn broadcast_to_room(event: RoomEvent, room: &Room) {
    let user_text = OutgoingUserMessage::Event(event.clone()).json();
    room.viewers.iter().for_each(|item| {
        if let Some(ref sender) = item.value().sender {
            let _ = sender.send(Ok(Message::text(&user_text)));
        }
    });

    let presenter_text = OutgoingPresenterMessage::Event(event).json();
    room.presenters.iter().for_each(|item| {
        if let Some(ref sender) = item.value().sender {
            let _ = sender.send(Ok(Message::text(&presenter_text)));
        }
    });
}

pub async fn handle_presenter_message(
    message: IncomingPresenterMessage,
    presenter: Presenter,
    room: Room,
    store: Store,
) {
    info!("Got presenter message: {message}");
    match message {
        IncomingPresenterMessage::ShareContent(msg) => {
            share::handle_share(&store, &room, &presenter, msg).await
        }
        IncomingPresenterMessage::SetSlide(msg) => {
            share::handle_set_slide(&store, &room, &presenter, msg).await
        }
        IncomingPresenterMessage::SetTimer { minutes } => {
            share::handle_set_timer(&store, &room, &presenter, minutes).await
        }
        IncomingPresenterMessage::SetLeaderboard { visible } => {
            share::handle_set_leaderboard(&store, &room, &presenter, visible).await
        }
        IncomingPresenterMessage::GetTally { poll_id } => {
            match store.tally(poll_id, presenter.session) {
                Ok(counts) => {
                    presenter.send_ignore_fail(OutgoingPresenterMessage::Tally { poll_id, counts })
                }
                Err(e) => {
                    warn!("Presenter requested a tally that could not be computed: {e}");
                    presenter.send_ignore_fail(OutgoingPresenterMessage::Error(e.to_string()));
                }
            }
        }
        IncomingPresenterMessage::StopSession => {
            share::handle_stop(&store, &room, &presenter).await
        }
    }
}

pub async fn handle_user_message(
    message: IncomingUserMessage,
    viewer: Viewer,
    room: Room,
    store: Store,
) {
    debug!("{} sent {message}", viewer.identity);
    match message {
        IncomingUserMessage::PollAnswer { poll_id, option } => {
            response::handle_poll_answer(&store, &room, &viewer, poll_id, option).await
        }
        IncomingUserMessage::QuizAnswer { question, option } => {
            response::handle_quiz_answer(&store, &room, &viewer, question, option).await
        }
    }
}
