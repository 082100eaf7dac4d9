//! Collaborators of the client: the document store, the answering service
//! and the user-facing notification sink.

pub mod answer_client;
pub mod document_client;
pub mod metrics;
pub mod notifier;

#[cfg(test)]
pub(crate) mod fakes;

use async_trait::async_trait;
use client_core::http::ServiceError;

use crate::models::{Answer, DocumentSummary, FileRef, InsightBundle, Question, UploadAck};

pub use answer_client::HttpAnswerService;
pub use document_client::HttpDocumentStore;
pub use notifier::{Notification, NotificationLevel, Notifier};

/// Stores uploaded files and serves listings and per-document insights.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn upload(&self, file: &FileRef) -> Result<UploadAck, ServiceError>;

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>, ServiceError>;

    async fn fetch_insights(&self, document_id: &str) -> Result<InsightBundle, ServiceError>;
}

/// Answers natural-language questions over the indexed documents.
#[async_trait]
pub trait AnswerService: Send + Sync {
    async fn ask(&self, question: &Question) -> Result<Answer, ServiceError>;
}
