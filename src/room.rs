use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::{Presenter, Viewer};

/// Every live room the server currently knows about, keyed by room code.
pub type Rooms = Arc<DashMap<u32, Room>>;
pub type Viewers = Arc<DashMap<String, Viewer>>;
pub type Presenters = Arc<DashMap<String, Presenter>>;

/// Which slide of the shared deck is up right now. Ephemeral state: it
/// lives with the room rather than the session record, and late joiners
/// pick it up from their snapshot.
#[derive(Clone, Copy, Debug)]
pub struct SlideState {
    pub presentation_id: u64,
    pub index: usize,
}

/// Running quiz accumulator for one participant and one bank. `submitted`
/// is the client-side half of the duplicate guard; the store's
/// insert-if-absent check is the half that actually matters.
#[derive(Clone, Debug)]
pub struct QuizProgress {
    pub bank_id: u64,
    pub answered: HashSet<usize>,
    pub correct: u32,
    pub submitted: bool,
}

impl QuizProgress {
    pub fn for_bank(bank_id: u64) -> Self {
        Self {
            bank_id,
            answered: HashSet::new(),
            correct: 0,
            submitted: false,
        }
    }
}

/// The realtime scope one teacher's sessions share: connected sockets on
/// both sides of the podium plus the ephemeral in-flight state that never
/// touches the store.
#[derive(Clone)]
pub struct Room {
    pub code: u32,
    pub teacher: String,
    pub viewers: Viewers,
    pub presenters: Presenters,
    pub slide: Arc<RwLock<Option<SlideState>>>,
    /// Quiz accumulators keyed by participant regno.
    pub quiz: Arc<DashMap<String, QuizProgress>>,
}

impl Room {
    pub fn new(code: u32, teacher: String) -> Self {
        Self {
            code,
            teacher,
            viewers: Arc::new(DashMap::new()),
            presenters: Arc::new(DashMap::new()),
            slide: Arc::new(None.into()),
            quiz: Arc::new(DashMap::new()),
        }
    }
}
