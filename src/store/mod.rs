mod content;
mod response;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::content::*;
pub use self::response::*;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no session with code {0}")]
    UnknownSession(u32),
    #[error("session {0} has ended")]
    SessionEnded(u32),
    #[error("{identity} is not the owner of session {session}")]
    NotSessionOwner { identity: String, session: u32 },
    #[error("no {0} with id {1}")]
    UnknownContent(ContentKind, u64),
    #[error("{identity} is not the owner of {kind} {id}")]
    NotContentOwner {
        identity: String,
        kind: ContentKind,
        id: u64,
    },
    #[error("option {option} is out of range for a poll with {options} options")]
    OptionOutOfRange { option: usize, options: usize },
}

/// One live class meeting. Never deleted, only soft-stopped by flipping
/// `active`. The three shared-content slots are independent: the flow only
/// ever surfaces one at a time but the record does not enforce that.
#[derive(Clone, Debug, Serialize)]
pub struct Session {
    pub code: u32,
    pub teacher: String,
    pub room: u32,
    pub active: bool,
    pub presentation_id: Option<u64>,
    pub poll_id: Option<u64>,
    pub bank_id: Option<u64>,
    /// Countdown duration in minutes for polls and quiz questions.
    pub timeout_minutes: u32,
    pub leaderboard_visible: bool,
    /// When the current question bank was shared. Basis of the
    /// leaderboard completion-time tie break.
    pub bank_shared_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct TeacherProfile {
    pub identity: String,
    pub room: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StudentInfo {
    pub name: String,
    pub rollno: String,
    pub regno: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct AttendanceRecord {
    pub session: u32,
    pub name: String,
    pub rollno: String,
    pub regno: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub enum SessionSetting {
    TimeoutMinutes(u32),
    LeaderboardVisible(bool),
}

/// In-process stand-in for the managed tables the original system kept in
/// its hosted database. Everything is keyed the same way the rows were.
#[derive(Clone, Default)]
pub struct Store {
    sessions: Arc<DashMap<u32, Session>>,
    teachers: Arc<DashMap<String, TeacherProfile>>,
    rooms_in_use: Arc<DashMap<u32, String>>,
    attendance: Arc<DashMap<u32, Vec<AttendanceRecord>>>,
    presentations: Arc<DashMap<u64, Presentation>>,
    polls: Arc<DashMap<u64, Poll>>,
    banks: Arc<DashMap<u64, QuestionBank>>,
    poll_responses: Arc<DashMap<(String, u64, u32), usize>>,
    scores: Arc<DashMap<(String, u64, u32), ScoreRow>>,
    next_id: Arc<AtomicU64>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_content_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Find or create the teacher's room. Rooms outlive sessions: the same
    /// four digit code is reused for every session the teacher runs.
    pub fn ensure_teacher(&self, identity: &str) -> TeacherProfile {
        self.teachers
            .entry(identity.to_string())
            .or_insert_with(|| {
                let mut rng = rand::thread_rng();
                let room = loop {
                    let candidate = rng.gen_range(1000..10000);
                    if !self.rooms_in_use.contains_key(&candidate) {
                        break candidate;
                    }
                };
                self.rooms_in_use.insert(room, identity.to_string());
                TeacherProfile {
                    identity: identity.to_string(),
                    room,
                }
            })
            .clone()
    }

    pub fn create_session(&self, teacher: &str) -> Session {
        let profile = self.ensure_teacher(teacher);
        let mut rng = rand::thread_rng();
        let code = loop {
            let candidate = rng.gen_range(100_000..1_000_000);
            if !self.sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let session = Session {
            code,
            teacher: teacher.to_string(),
            room: profile.room,
            active: true,
            presentation_id: None,
            poll_id: None,
            bank_id: None,
            timeout_minutes: 3,
            leaderboard_visible: false,
            bank_shared_at: None,
        };
        self.sessions.insert(code, session.clone());
        info!("{teacher} started session {code} in room {}", profile.room);
        session
    }

    pub fn session(&self, code: u32) -> Option<Session> {
        self.sessions.get(&code).map(|s| s.clone())
    }

    /// Every session mutation runs through here so the single-writer
    /// invariant is checked next to the write instead of assumed from
    /// infrastructure.
    fn owned_session_mut(
        &self,
        code: u32,
        identity: &str,
    ) -> std::result::Result<dashmap::mapref::one::RefMut<'_, u32, Session>, StoreError> {
        let session = self
            .sessions
            .get_mut(&code)
            .ok_or(StoreError::UnknownSession(code))?;
        if session.teacher != identity {
            return Err(StoreError::NotSessionOwner {
                identity: identity.to_string(),
                session: code,
            });
        }
        Ok(session)
    }

    pub fn stop_session(
        &self,
        code: u32,
        identity: &str,
    ) -> std::result::Result<Session, StoreError> {
        let mut session = self.owned_session_mut(code, identity)?;
        session.active = false;
        info!("{identity} stopped session {code}");
        Ok(session.clone())
    }

    /// Persist a share. `id = None` clears the slot. The persisted value is
    /// the durable truth late joiners read; broadcasting it is the caller's
    /// problem and must only happen after this returns Ok.
    pub fn set_session_content(
        &self,
        code: u32,
        identity: &str,
        kind: ContentKind,
        id: Option<u64>,
    ) -> std::result::Result<Session, StoreError> {
        if let Some(id) = id {
            let exists = match kind {
                ContentKind::Presentation => self.presentations.contains_key(&id),
                ContentKind::Poll => self.polls.contains_key(&id),
                ContentKind::QuestionBank => self.banks.contains_key(&id),
            };
            if !exists {
                return Err(StoreError::UnknownContent(kind, id));
            }
        }

        let mut session = self.owned_session_mut(code, identity)?;
        match kind {
            ContentKind::Presentation => session.presentation_id = id,
            ContentKind::Poll => session.poll_id = id,
            ContentKind::QuestionBank => {
                session.bank_id = id;
                session.bank_shared_at = id.map(|_| Utc::now());
            }
        }
        Ok(session.clone())
    }

    pub fn set_session_setting(
        &self,
        code: u32,
        identity: &str,
        setting: SessionSetting,
    ) -> std::result::Result<Session, StoreError> {
        let mut session = self.owned_session_mut(code, identity)?;
        match setting {
            SessionSetting::TimeoutMinutes(minutes) => session.timeout_minutes = minutes,
            SessionSetting::LeaderboardVisible(visible) => session.leaderboard_visible = visible,
        }
        Ok(session.clone())
    }

    /// Validate a session code and record the join. The attendance row is
    /// immutable once written; it is what drives the who's-online row and
    /// the student counts.
    pub fn join_session(
        &self,
        code: u32,
        student: StudentInfo,
    ) -> std::result::Result<(Session, AttendanceRecord), StoreError> {
        let session = self
            .sessions
            .get(&code)
            .ok_or(StoreError::UnknownSession(code))?;
        if !session.active {
            return Err(StoreError::SessionEnded(code));
        }

        let record = AttendanceRecord {
            session: code,
            name: student.name,
            rollno: student.rollno,
            regno: student.regno,
            joined_at: Utc::now(),
        };
        self.attendance
            .entry(code)
            .or_default()
            .push(record.clone());
        info!("{} joined session {code}", record.regno);
        Ok((session.clone(), record))
    }

    pub fn attendance(&self, code: u32) -> Vec<AttendanceRecord> {
        self.attendance
            .get(&code)
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }

    pub fn create_presentation(
        &self,
        teacher: &str,
        title: String,
        description: String,
        image_urls: Vec<String>,
    ) -> Presentation {
        let presentation = Presentation {
            id: self.next_content_id(),
            teacher: teacher.to_string(),
            title,
            description,
            image_urls,
        };
        self.presentations
            .insert(presentation.id, presentation.clone());
        presentation
    }

    pub fn create_poll(
        &self,
        teacher: &str,
        title: String,
        options: Vec<String>,
        image_url: Option<String>,
    ) -> Poll {
        let poll = Poll {
            id: self.next_content_id(),
            teacher: teacher.to_string(),
            title,
            options,
            image_url,
        };
        self.polls.insert(poll.id, poll.clone());
        poll
    }

    pub fn create_bank(
        &self,
        teacher: &str,
        title: String,
        questions: Vec<Question>,
    ) -> QuestionBank {
        let bank = QuestionBank {
            id: self.next_content_id(),
            teacher: teacher.to_string(),
            title,
            questions,
        };
        self.banks.insert(bank.id, bank.clone());
        bank
    }

    pub fn presentation(&self, id: u64) -> Option<Presentation> {
        self.presentations.get(&id).map(|p| p.clone())
    }

    pub fn poll(&self, id: u64) -> Option<Poll> {
        self.polls.get(&id).map(|p| p.clone())
    }

    pub fn bank(&self, id: u64) -> Option<QuestionBank> {
        self.banks.get(&id).map(|b| b.clone())
    }

    pub fn content_for(&self, teacher: &str) -> Vec<ContentSummary> {
        let mut items: Vec<ContentSummary> = self
            .presentations
            .iter()
            .filter(|p| p.teacher == teacher)
            .map(|p| ContentSummary {
                kind: ContentKind::Presentation,
                id: p.id,
                title: p.title.clone(),
            })
            .chain(self.polls.iter().filter(|p| p.teacher == teacher).map(|p| {
                ContentSummary {
                    kind: ContentKind::Poll,
                    id: p.id,
                    title: p.title.clone(),
                }
            }))
            .chain(self.banks.iter().filter(|b| b.teacher == teacher).map(|b| {
                ContentSummary {
                    kind: ContentKind::QuestionBank,
                    id: b.id,
                    title: b.title.clone(),
                }
            }))
            .collect();
        items.sort_by_key(|item| item.id);
        items
    }

    pub fn delete_content(
        &self,
        teacher: &str,
        kind: ContentKind,
        id: u64,
    ) -> std::result::Result<(), StoreError> {
        let owner = match kind {
            ContentKind::Presentation => self.presentations.get(&id).map(|p| p.teacher.clone()),
            ContentKind::Poll => self.polls.get(&id).map(|p| p.teacher.clone()),
            ContentKind::QuestionBank => self.banks.get(&id).map(|b| b.teacher.clone()),
        }
        .ok_or(StoreError::UnknownContent(kind, id))?;

        if owner != teacher {
            return Err(StoreError::NotContentOwner {
                identity: teacher.to_string(),
                kind,
                id,
            });
        }

        match kind {
            ContentKind::Presentation => {
                self.presentations.remove(&id);
            }
            ContentKind::Poll => {
                self.polls.remove(&id);
            }
            ContentKind::QuestionBank => {
                self.banks.remove(&id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_soft_stop_and_reject_foreign_writers() {
        let store = Store::new();
        let session = store.create_session("alice");
        assert!(session.active);

        // Only the owning teacher may mutate the session
        let denied = store.set_session_setting(
            session.code,
            "mallory",
            SessionSetting::LeaderboardVisible(true),
        );
        assert!(matches!(denied, Err(StoreError::NotSessionOwner { .. })));
        assert!(matches!(
            store.stop_session(session.code, "mallory"),
            Err(StoreError::NotSessionOwner { .. })
        ));

        let stopped = store.stop_session(session.code, "alice").unwrap();
        assert!(!stopped.active);
        // Soft stop only, the record is still readable
        assert!(store.session(session.code).is_some());
    }

    #[test]
    fn joining_requires_an_active_session() {
        let store = Store::new();
        let session = store.create_session("alice");

        let student = StudentInfo {
            name: "Priya".into(),
            rollno: "42".into(),
            regno: "21CS001".into(),
        };

        let (joined, record) = store.join_session(session.code, student.clone()).unwrap();
        assert_eq!(joined.room, session.room);
        assert_eq!(record.regno, "21CS001");
        assert_eq!(store.attendance(session.code).len(), 1);

        store.stop_session(session.code, "alice").unwrap();
        assert!(matches!(
            store.join_session(session.code, student),
            Err(StoreError::SessionEnded(_))
        ));

        assert!(matches!(
            store.join_session(0, StudentInfo {
                name: "Sam".into(),
                rollno: "7".into(),
                regno: "21CS002".into(),
            }),
            Err(StoreError::UnknownSession(0))
        ));
    }

    #[test]
    fn sharing_validates_content_and_clears_with_none() {
        let store = Store::new();
        let session = store.create_session("alice");
        let poll = store.create_poll("alice", "Favourite crate".into(), vec!["serde".into()], None);

        assert!(matches!(
            store.set_session_content(session.code, "alice", ContentKind::Poll, Some(9999)),
            Err(StoreError::UnknownContent(ContentKind::Poll, 9999))
        ));

        let updated = store
            .set_session_content(session.code, "alice", ContentKind::Poll, Some(poll.id))
            .unwrap();
        assert_eq!(updated.poll_id, Some(poll.id));

        let cleared = store
            .set_session_content(session.code, "alice", ContentKind::Poll, None)
            .unwrap();
        assert_eq!(cleared.poll_id, None);
    }

    #[test]
    fn bank_share_stamps_the_clock() {
        let store = Store::new();
        let session = store.create_session("alice");
        let bank = store.create_bank(
            "alice",
            "Unit 1".into(),
            vec![Question {
                title: "2 + 2?".into(),
                options: vec!["3".into(), "4".into()],
                correct: 1,
            }],
        );

        assert!(store.session(session.code).unwrap().bank_shared_at.is_none());
        store
            .set_session_content(session.code, "alice", ContentKind::QuestionBank, Some(bank.id))
            .unwrap();
        assert!(store.session(session.code).unwrap().bank_shared_at.is_some());
    }

    #[test]
    fn content_listing_and_deletes_are_per_teacher() {
        let store = Store::new();
        let poll = store.create_poll("alice", "Poll".into(), vec!["a".into(), "b".into()], None);
        store.create_bank("bob", "Bob's bank".into(), vec![]);

        let mine = store.content_for("alice");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, poll.id);

        assert!(matches!(
            store.delete_content("bob", ContentKind::Poll, poll.id),
            Err(StoreError::NotContentOwner { .. })
        ));
        store.delete_content("alice", ContentKind::Poll, poll.id).unwrap();
        assert!(store.poll(poll.id).is_none());
    }
}
