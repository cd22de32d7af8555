#[macro_use]
extern crate log;

pub mod authentication;
pub mod config;
pub mod handler;
pub mod leaderboard;
pub mod messaging;
pub mod processor;
pub mod room;
pub mod store;
pub mod sync;
pub mod ws;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use warp::{ws::Message, Rejection};

use messaging::{OutgoingPresenterMessage, OutgoingUserMessage};

pub type Result<T> = std::result::Result<T, Rejection>;

/// Sender half of a connected websocket. `None` until the registered
/// party has upgraded their connection.
pub type WsSender = mpsc::UnboundedSender<std::result::Result<Message, warp::Error>>;

#[derive(Debug, Clone)]
pub struct Viewer {
    pub sender: Option<WsSender>,
    /// Registration number of the participant. Every response row this
    /// viewer produces is written under this key and no other.
    pub identity: String,
    pub guid: String,
    pub session: u32,
}

impl Viewer {
    pub fn send_ignore_fail(&self, message: OutgoingUserMessage) {
        if let Some(ref sender) = self.sender {
            let _ = sender.send(Ok(Message::text(message.json())));
        }
    }
}

// A teacher can drive the same session from more than one device (laptop
// plus the big screen) so presenters get their own connection records.
#[derive(Debug, Clone)]
pub struct Presenter {
    pub sender: Option<WsSender>,
    pub identity: String,
    pub guid: String,
    pub session: u32,
}

impl Presenter {
    pub fn send_ignore_fail(&self, message: OutgoingPresenterMessage) {
        if let Some(ref sender) = self.sender {
            let _ = sender.send(Ok(Message::text(message.json())));
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JwtClaims {
    pub sub: String, // Contains the teacher's identifying information
    pub exp: usize,
    pub aud: String,
}
