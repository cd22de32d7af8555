use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use warp::ws::WebSocket;

use crate::messaging::{IncomingPresenterMessage, IncomingUserMessage, OutgoingUserMessage};
use crate::processor;
use crate::room::Room;
use crate::store::Store;
use crate::sync::SessionSnapshot;
use crate::{Presenter, Viewer};

pub async fn viewer_connection(
    ws: WebSocket,
    room: Room,
    guid: String,
    mut viewer: Viewer,
    store: Store,
) {
    let (ws_sender, mut ws_rcv) = ws.split();
    let (sender, rcv) = mpsc::unbounded_channel();

    let rcv = UnboundedReceiverStream::new(rcv);
    tokio::task::spawn(rcv.forward(ws_sender).map(|result| {
        if let Err(e) = result {
            error!("error sending websocket msg: {}", e);
        }
    }));

    viewer.sender = Some(sender);
    let identity = viewer.identity.clone();

    match room.viewers.get_mut(&guid) {
        Some(mut registered) => *registered = viewer.clone(),
        None => {
            error!("{identity} could not upgrade their connection because they have not joined");
            return;
        }
    }

    info!("{identity} connected to room {} with {guid}", room.code);

    // Seed from the durable session record before any broadcast flows.
    // This is the only thing a late joiner needs to land on whatever is
    // currently shared.
    if let Some(session) = store.session(viewer.session) {
        let slide = *room.slide.read().await;
        viewer.send_ignore_fail(OutgoingUserMessage::Snapshot(SessionSnapshot::capture(
            &session, slide,
        )));
    } else {
        error!("{identity} connected for session {} which does not exist", viewer.session);
    }

    while let Some(result) = ws_rcv.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                error!("error receiving ws message for id {guid}: {e}");
                break;
            }
        };

        let message = match msg.to_str().map(serde_json::from_str::<IncomingUserMessage>) {
            Ok(Ok(m)) => m,
            _ => {
                error!("{identity} sent an invalid message");
                continue;
            }
        };

        processor::handle_user_message(message, viewer.clone(), room.clone(), store.clone()).await;
    }

    // Unsubscribe: drop the registration so nothing is delivered to this
    // connection after teardown
    if room.viewers.remove(&guid).is_some() {
        info!("{identity} - {guid} disconnected");
    } else {
        error!("{identity} - {guid} was already disconnected");
    }
}

pub async fn presenter_connection(
    ws: WebSocket,
    room: Room,
    guid: String,
    mut presenter: Presenter,
    store: Store,
) {
    let (ws_sender, mut ws_rcv) = ws.split();
    let (sender, rcv) = mpsc::unbounded_channel();

    let rcv = UnboundedReceiverStream::new(rcv);
    tokio::task::spawn(rcv.forward(ws_sender).map(|result| {
        if let Err(e) = result {
            error!("error sending websocket msg: {}", e);
        }
    }));

    presenter.sender = Some(sender);
    let identity = presenter.identity.clone();

    match room.presenters.get_mut(&guid) {
        Some(mut registered) => *registered = presenter.clone(),
        None => {
            error!("{identity} could not upgrade a presenter connection they never registered");
            return;
        }
    }

    info!("Presenter {identity} connected to room {} with {guid}", room.code);

    while let Some(result) = ws_rcv.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                error!("error receiving ws message for presenter {guid}: {e}");
                break;
            }
        };

        let message = match msg.to_str().map(serde_json::from_str::<IncomingPresenterMessage>) {
            Ok(Ok(m)) => m,
            _ => {
                error!("Presenter {identity} sent an invalid message");
                continue;
            }
        };

        processor::handle_presenter_message(message, presenter.clone(), room.clone(), store.clone())
            .await;
    }

    if room.presenters.remove(&guid).is_some() {
        info!("Presenter {identity} - {guid} disconnected");
    } else {
        error!("Presenter {identity} - {guid} was already disconnected");
    }
}
