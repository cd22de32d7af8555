use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warp::{http::StatusCode, reply::json, Reply};

use crate::authentication::{self, AuthError};
use crate::config::Configuration;
use crate::leaderboard;
use crate::messaging::RoomEvent;
use crate::processor;
use crate::room::{Room, Rooms};
use crate::store::{ContentKind, Question, Store, StoreError, StudentInfo};
use crate::{Presenter, Result, Viewer};

#[derive(Debug)]
pub struct ApiError(pub StoreError);

impl warp::reject::Reject for ApiError {}

fn reject_store(e: StoreError) -> warp::Rejection {
    warp::reject::custom(ApiError(e))
}

#[derive(Serialize, Debug)]
struct SessionResponse {
    session: u32,
    room: u32,
    url: String,
}

#[derive(Deserialize, Debug)]
pub struct StopSessionRequest {
    pub session: u32,
}

#[derive(Deserialize, Debug)]
pub struct JoinRequest {
    pub session_code: u32,
    pub name: String,
    pub rollno: String,
    pub regno: String,
}

#[derive(Serialize, Debug)]
struct JoinResponse {
    url: String,
    session: u32,
    room: u32,
    timeout_minutes: u32,
}

#[derive(Deserialize, Debug)]
pub struct NewPresentationRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub image_urls: Vec<String>,
}

#[derive(Deserialize, Debug)]
pub struct NewPollRequest {
    pub title: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct NewBankRequest {
    pub title: String,
    pub questions: Vec<Question>,
}

/// Start a new session and register the caller as its presenter. The
/// websocket at the returned URL is where share and slide messages go.
pub async fn create_session_handler(
    authorization: String,
    config: Configuration,
    store: Store,
    rooms: Rooms,
) -> Result<impl Reply> {
    let claims =
        authentication::verify_teacher(&authorization, config.session_signing_key.as_bytes())?;

    let session = store.create_session(&claims.sub);
    let room = rooms
        .entry(session.room)
        .or_insert_with(|| Room::new(session.room, claims.sub.clone()))
        .clone();

    let guid = Uuid::new_v4().as_simple().to_string();
    room.presenters.insert(
        guid.clone(),
        Presenter {
            sender: None,
            identity: claims.sub,
            guid: guid.clone(),
            session: session.code,
        },
    );

    Ok(json(&SessionResponse {
        session: session.code,
        room: session.room,
        url: format!("/ws/{}/{guid}", session.room),
    }))
}

pub async fn stop_session_handler(
    request: StopSessionRequest,
    authorization: String,
    config: Configuration,
    store: Store,
    rooms: Rooms,
) -> Result<impl Reply> {
    let claims =
        authentication::verify_teacher(&authorization, config.session_signing_key.as_bytes())?;

    let session = store
        .stop_session(request.session, &claims.sub)
        .map_err(reject_store)?;

    if let Some(room) = rooms.get(&session.room) {
        processor::broadcast_to_room(RoomEvent::SessionStopped, room.value()).await;
    }

    Ok(json(&serde_json::json!({
        "session": session.code,
        "active": session.active,
    })))
}

/// Validate a session code and register the student. Their attendance row
/// is written here; the websocket at the returned URL is their room
/// subscription.
pub async fn join_handler(request: JoinRequest, store: Store, rooms: Rooms) -> Result<impl Reply> {
    debug!("Got join call for session {}", request.session_code);

    let (session, record) = store
        .join_session(
            request.session_code,
            StudentInfo {
                name: request.name,
                rollno: request.rollno,
                regno: request.regno,
            },
        )
        .map_err(reject_store)?;

    let room = rooms
        .entry(session.room)
        .or_insert_with(|| Room::new(session.room, session.teacher.clone()))
        .clone();

    let guid = Uuid::new_v4().as_simple().to_string();
    room.viewers.insert(
        guid.clone(),
        Viewer {
            sender: None,
            identity: record.regno,
            guid: guid.clone(),
            session: session.code,
        },
    );

    Ok(json(&JoinResponse {
        url: format!("/ws/{}/{guid}", session.room),
        session: session.code,
        room: session.room,
        timeout_minutes: session.timeout_minutes,
    }))
}

pub async fn ws_handler(
    room_code: u32,
    guid: String,
    ws: warp::ws::Ws,
    rooms: Rooms,
    store: Store,
) -> Result<impl Reply> {
    trace!("Got websocket call for room {room_code}");
    let room = rooms.get(&room_code).ok_or(warp::reject::not_found())?;
    let room = room.value().to_owned();

    enum Registered {
        Viewer(Viewer),
        Presenter(Presenter),
    }

    // There is no registered viewer or presenter for this websocket
    let registered = match (
        room.viewers.get(&guid).map(|x| x.value().clone()),
        room.presenters.get(&guid).map(|x| x.value().clone()),
    ) {
        (None, None) => return Err(warp::reject::not_found()),
        (Some(viewer), _) => Registered::Viewer(viewer),
        (_, Some(presenter)) => Registered::Presenter(presenter),
    };

    Ok(ws
        .max_message_size(1024 * 4) // Set max message size to 4KiB
        .on_upgrade(move |socket| async move {
            match registered {
                Registered::Viewer(viewer) => {
                    crate::ws::viewer_connection(socket, room, guid, viewer, store).await
                }
                Registered::Presenter(presenter) => {
                    crate::ws::presenter_connection(socket, room, guid, presenter, store).await
                }
            }
        }))
}

pub async fn create_presentation_handler(
    authorization: String,
    config: Configuration,
    request: NewPresentationRequest,
    store: Store,
) -> Result<impl Reply> {
    let claims =
        authentication::verify_teacher(&authorization, config.session_signing_key.as_bytes())?;
    let presentation = store.create_presentation(
        &claims.sub,
        request.title,
        request.description,
        request.image_urls,
    );
    Ok(warp::reply::with_status(
        json(&presentation),
        StatusCode::CREATED,
    ))
}

pub async fn create_poll_handler(
    authorization: String,
    config: Configuration,
    request: NewPollRequest,
    store: Store,
) -> Result<impl Reply> {
    let claims =
        authentication::verify_teacher(&authorization, config.session_signing_key.as_bytes())?;
    let poll = store.create_poll(&claims.sub, request.title, request.options, request.image_url);
    Ok(warp::reply::with_status(json(&poll), StatusCode::CREATED))
}

pub async fn create_bank_handler(
    authorization: String,
    config: Configuration,
    request: NewBankRequest,
    store: Store,
) -> Result<impl Reply> {
    let claims =
        authentication::verify_teacher(&authorization, config.session_signing_key.as_bytes())?;
    let bank = store.create_bank(&claims.sub, request.title, request.questions);
    Ok(warp::reply::with_status(json(&bank), StatusCode::CREATED))
}

pub async fn list_content_handler(
    authorization: String,
    config: Configuration,
    store: Store,
) -> Result<impl Reply> {
    let claims =
        authentication::verify_teacher(&authorization, config.session_signing_key.as_bytes())?;
    Ok(json(&store.content_for(&claims.sub)))
}

pub async fn delete_content_handler(
    kind: String,
    id: u64,
    authorization: String,
    config: Configuration,
    store: Store,
) -> Result<impl Reply> {
    let claims =
        authentication::verify_teacher(&authorization, config.session_signing_key.as_bytes())?;
    let kind = parse_kind(&kind).ok_or(warp::reject::not_found())?;
    store
        .delete_content(&claims.sub, kind, id)
        .map_err(reject_store)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Full deck for a viewer's content fetch after a share event.
pub async fn get_presentation_handler(id: u64, store: Store) -> Result<impl Reply> {
    store
        .presentation(id)
        .map(|p| json(&p))
        .ok_or_else(|| reject_store(StoreError::UnknownContent(ContentKind::Presentation, id)))
}

pub async fn get_poll_handler(id: u64, store: Store) -> Result<impl Reply> {
    store
        .poll(id)
        .map(|p| json(&p))
        .ok_or_else(|| reject_store(StoreError::UnknownContent(ContentKind::Poll, id)))
}

/// Bank fetch for participants. Redacted: the correct indexes stay on the
/// server where the answers are evaluated.
pub async fn get_bank_handler(id: u64, store: Store) -> Result<impl Reply> {
    store
        .bank(id)
        .map(|b| json(&b.participant_view()))
        .ok_or_else(|| reject_store(StoreError::UnknownContent(ContentKind::QuestionBank, id)))
}

/// Export the attendance roll for one session. Owner only.
pub async fn attendance_csv_handler(
    code: u32,
    authorization: String,
    config: Configuration,
    store: Store,
) -> Result<impl Reply> {
    let claims =
        authentication::verify_teacher(&authorization, config.session_signing_key.as_bytes())?;

    let session = store
        .session(code)
        .ok_or_else(|| reject_store(StoreError::UnknownSession(code)))?;
    if session.teacher != claims.sub {
        return Err(reject_store(StoreError::NotSessionOwner {
            identity: claims.sub,
            session: code,
        }));
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["name", "regno", "rollno", "joined_at"])
        .map_err(|e| {
            error!("Could not write attendance header: {e}");
            warp::reject::reject()
        })?;
    for record in store.attendance(code) {
        let joined_at = record.joined_at.to_rfc3339();
        writer
            .write_record([
                record.name.as_str(),
                record.regno.as_str(),
                record.rollno.as_str(),
                joined_at.as_str(),
            ])
            .map_err(|e| {
                error!("Could not write attendance row: {e}");
                warp::reject::reject()
            })?;
    }
    let body = writer.into_inner().map_err(|e| {
        error!("Could not finish attendance export: {e}");
        warp::reject::reject()
    })?;

    Ok(warp::http::Response::builder()
        .header("content-type", "text/csv")
        .body(body)
        .unwrap_or_default())
}

/// Ranked standings for a session. Participants can read it while the
/// teacher has it toggled visible; the owner can always read it.
pub async fn leaderboard_handler(
    code: u32,
    authorization: Option<String>,
    config: Configuration,
    store: Store,
) -> Result<impl Reply> {
    let session = store
        .session(code)
        .ok_or_else(|| reject_store(StoreError::UnknownSession(code)))?;

    let is_owner = match authorization {
        Some(header) => {
            authentication::verify_teacher(&header, config.session_signing_key.as_bytes())
                .map(|claims| claims.sub == session.teacher)
                .unwrap_or(false)
        }
        None => false,
    };

    if !session.leaderboard_visible && !is_owner {
        return Err(warp::reject::custom(AuthError(
            "the leaderboard is not visible for this session".to_string(),
        )));
    }

    Ok(json(&leaderboard::rank(store.score_rows(code))))
}

pub async fn health_handler() -> Result<impl Reply> {
    Ok(StatusCode::OK)
}

fn parse_kind(kind: &str) -> Option<ContentKind> {
    match kind {
        "presentation" => Some(ContentKind::Presentation),
        "poll" => Some(ContentKind::Poll),
        "bank" => Some(ContentKind::QuestionBank),
        _ => None,
    }
}

#[derive(Serialize)]
struct ErrorReply {
    error: String,
}

/// One consistent error surface: every rejection leaves as JSON with a
/// status that matches the failure class.
pub async fn handle_rejection(
    err: warp::Rejection,
) -> std::result::Result<impl Reply, std::convert::Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(ApiError(e)) = err.find() {
        let status = match e {
            StoreError::UnknownSession(_) | StoreError::UnknownContent(..) => {
                StatusCode::NOT_FOUND
            }
            StoreError::SessionEnded(_) => StatusCode::GONE,
            StoreError::NotSessionOwner { .. } | StoreError::NotContentOwner { .. } => {
                StatusCode::FORBIDDEN
            }
            StoreError::OptionOutOfRange { .. } => StatusCode::BAD_REQUEST,
        };
        (status, e.to_string())
    } else if let Some(AuthError(message)) = err.find() {
        (StatusCode::UNAUTHORIZED, message.clone())
    } else if err.find::<warp::reject::MissingHeader>().is_some() {
        (
            StatusCode::UNAUTHORIZED,
            "authorization required".to_string(),
        )
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        (StatusCode::BAD_REQUEST, "malformed request body".to_string())
    } else {
        error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        json(&ErrorReply { error: message }),
        status,
    ))
}
