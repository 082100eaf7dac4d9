//! Scripted collaborators for unit tests. Delays use `tokio::time`, so tests
//! running with paused time control exactly when each response lands.

use async_trait::async_trait;
use client_core::http::ServiceError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{AnswerService, DocumentStore};
use crate::models::{Answer, DocumentSummary, FileRef, InsightBundle, Question, UploadAck};

type Scripted<T> = (Duration, Result<T, ServiceError>);

pub(crate) struct FakeDocumentStore {
    listing: Mutex<Result<Vec<DocumentSummary>, ServiceError>>,
    /// Consumed in order before falling back to `listing`.
    listings: Mutex<Vec<Scripted<Vec<DocumentSummary>>>>,
    insights: Mutex<HashMap<String, Scripted<InsightBundle>>>,
    uploads: Mutex<HashMap<String, Scripted<UploadAck>>>,
    upload_calls: AtomicUsize,
    insight_calls: Mutex<Vec<String>>,
}

impl FakeDocumentStore {
    pub(crate) fn new() -> Self {
        Self {
            listing: Mutex::new(Ok(Vec::new())),
            listings: Mutex::new(Vec::new()),
            insights: Mutex::new(HashMap::new()),
            uploads: Mutex::new(HashMap::new()),
            upload_calls: AtomicUsize::new(0),
            insight_calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_documents(self, docs: &[(&str, &str)]) -> Self {
        *self.listing.lock().unwrap() = Ok(docs
            .iter()
            .map(|(id, name)| DocumentSummary {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect());
        self
    }

    /// Script the next listing call to answer `docs` after `delay`.
    pub(crate) fn then_listing(self, delay: Duration, docs: &[(&str, &str)]) -> Self {
        let docs = docs
            .iter()
            .map(|(id, name)| DocumentSummary {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect();
        self.listings.lock().unwrap().push((delay, Ok(docs)));
        self
    }

    pub(crate) fn failing_listing(self) -> Self {
        *self.listing.lock().unwrap() = Err(ServiceError::Transport("connection refused".into()));
        self
    }

    pub(crate) fn with_insights(self, id: &str, delay: Duration, summary: &str) -> Self {
        let bundle = InsightBundle {
            summary: summary.to_string(),
            key_points: vec![format!("{} key point", summary)],
            entities: vec!["ACME".to_string()],
        };
        self.insights
            .lock()
            .unwrap()
            .insert(id.to_string(), (delay, Ok(bundle)));
        self
    }

    pub(crate) fn failing_insights(self, id: &str, delay: Duration) -> Self {
        self.insights.lock().unwrap().insert(
            id.to_string(),
            (delay, Err(ServiceError::Status { status: 500, detail: None })),
        );
        self
    }

    /// Upload of `name` succeeds after `delay`. Unscripted names succeed at once.
    pub(crate) fn upload_ok(self, name: &str, delay: Duration) -> Self {
        self.uploads.lock().unwrap().insert(
            name.to_string(),
            (delay, Ok(UploadAck(serde_json::json!({"filename": name})))),
        );
        self
    }

    pub(crate) fn upload_err(self, name: &str, delay: Duration, error: ServiceError) -> Self {
        self.uploads
            .lock()
            .unwrap()
            .insert(name.to_string(), (delay, Err(error)));
        self
    }

    pub(crate) fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn insight_calls(&self) -> Vec<String> {
        self.insight_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for FakeDocumentStore {
    async fn upload(&self, file: &FileRef) -> Result<UploadAck, ServiceError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.uploads.lock().unwrap().get(file.name()).cloned();
        match scripted {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Ok(UploadAck(serde_json::Value::Null)),
        }
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, ServiceError> {
        let next = {
            let mut listings = self.listings.lock().unwrap();
            if listings.is_empty() {
                None
            } else {
                Some(listings.remove(0))
            }
        };
        match next {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => self.listing.lock().unwrap().clone(),
        }
    }

    async fn fetch_insights(&self, document_id: &str) -> Result<InsightBundle, ServiceError> {
        self.insight_calls.lock().unwrap().push(document_id.to_string());
        let scripted = self.insights.lock().unwrap().get(document_id).cloned();
        match scripted {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Err(ServiceError::NotFound {
                path: format!("/api/insights/{}", document_id),
                detail: None,
            }),
        }
    }
}

/// Replies are consumed in order; each question records what was asked.
pub(crate) struct FakeAnswerService {
    replies: Mutex<Vec<Scripted<Answer>>>,
    questions: Mutex<Vec<Question>>,
}

impl FakeAnswerService {
    pub(crate) fn new() -> Self {
        Self {
            replies: Mutex::new(Vec::new()),
            questions: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn reply(self, delay: Duration, text: &str) -> Self {
        self.replies.lock().unwrap().push((
            delay,
            Ok(Answer {
                text: text.to_string(),
                sources: Vec::new(),
            }),
        ));
        self
    }

    pub(crate) fn reply_with(self, delay: Duration, answer: Answer) -> Self {
        self.replies.lock().unwrap().push((delay, Ok(answer)));
        self
    }

    pub(crate) fn fail(self, delay: Duration) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push((delay, Err(ServiceError::Transport("connection reset".into()))));
        self
    }

    pub(crate) fn questions(&self) -> Vec<Question> {
        self.questions.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerService for FakeAnswerService {
    async fn ask(&self, question: &Question) -> Result<Answer, ServiceError> {
        self.questions.lock().unwrap().push(question.clone());
        let next = {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                None
            } else {
                Some(replies.remove(0))
            }
        };
        match next {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Err(ServiceError::Transport("no scripted reply".into())),
        }
    }
}
