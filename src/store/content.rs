use serde::{Deserialize, Serialize};

/// The three kinds of content a teacher can share into a session.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ContentKind {
    Presentation,
    Poll,
    QuestionBank,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Presentation => write!(f, "presentation"),
            Self::Poll => write!(f, "poll"),
            Self::QuestionBank => write!(f, "question bank"),
        }
    }
}

/// An ordered deck of slide images. The URLs are opaque to the server,
/// they point at wherever the upload pipeline put the rendered pages.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Presentation {
    pub id: u64,
    pub teacher: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub image_urls: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Poll {
    pub id: u64,
    pub teacher: String,
    pub title: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct QuestionBank {
    pub id: u64,
    pub teacher: String,
    pub title: String,
    pub questions: Vec<Question>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Question {
    pub title: String,
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct: usize,
}

impl Question {
    pub fn is_correct(&self, option: usize) -> bool {
        self.correct == option
    }
}

/// What a participant gets when they fetch a bank: questions and options
/// only. Evaluation happens on the server, so the correct index never
/// travels to the people being quizzed.
#[derive(Clone, Debug, Serialize)]
pub struct QuestionBankView {
    pub id: u64,
    pub title: String,
    pub questions: Vec<QuestionView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct QuestionView {
    pub title: String,
    pub options: Vec<String>,
}

impl QuestionBank {
    pub fn participant_view(&self) -> QuestionBankView {
        QuestionBankView {
            id: self.id,
            title: self.title.clone(),
            questions: self
                .questions
                .iter()
                .map(|q| QuestionView {
                    title: q.title.clone(),
                    options: q.options.clone(),
                })
                .collect(),
        }
    }
}

/// Summary row returned by the content listing endpoint. The dashboard
/// only needs titles to render its saved-items panel.
#[derive(Clone, Debug, Serialize)]
pub struct ContentSummary {
    pub kind: ContentKind,
    pub id: u64,
    pub title: String,
}
