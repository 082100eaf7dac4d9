use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic identity of a turn within one client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Excerpt of a document that supports an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub excerpt: String,
    pub page: u32,
    pub relevance_score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub id: TurnId,
    pub role: Role,
    pub content: String,
    /// Present only on answers that came with supporting excerpts.
    pub sources: Option<Vec<SourceRef>>,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub(crate) fn user(id: TurnId, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            sources: None,
            created_at: Utc::now(),
        }
    }

    pub(crate) fn assistant(id: TurnId, content: impl Into<String>, sources: Vec<SourceRef>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: content.into(),
            sources: if sources.is_empty() { None } else { Some(sources) },
            created_at: Utc::now(),
        }
    }
}

/// A question for the answering service, optionally scoped to one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    pub document_id: Option<String>,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            document_id: None,
        }
    }

    pub fn scoped_to(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceRef>,
}
