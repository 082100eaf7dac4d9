//! Client-side orchestration for document question answering: tracked
//! uploads, a single-selection document list with insights, and a chat
//! session over the indexed documents.

pub mod chat;
pub mod config;
pub mod console;
pub mod models;
pub mod preferences;
pub mod selector;
pub mod services;
pub mod tracker;

use client_core::error::AppError;
use client_core::http::build_client;
use std::sync::Arc;

use chat::{ChatSession, SubmitOutcome};
use config::Settings;
use models::Question;
use preferences::{Preferences, ThemeMode};
use selector::{DocumentSelector, DocumentsLoad};
use services::{AnswerService, DocumentStore, HttpAnswerService, HttpDocumentStore, Notifier};
use tracker::UploadTracker;

/// One user's session: the three subsystems plus display preferences.
pub struct ClientSession {
    pub uploads: UploadTracker,
    pub documents: DocumentSelector,
    pub chat: ChatSession,
    preferences: Preferences,
    scope_to_selection: bool,
}

impl ClientSession {
    pub fn new(
        settings: &Settings,
        store: Arc<dyn DocumentStore>,
        answers: Arc<dyn AnswerService>,
        notifier: Notifier,
    ) -> Self {
        Self {
            uploads: UploadTracker::new(store.clone(), notifier, settings.uploads.clone()),
            documents: DocumentSelector::new(store, settings.documents.clone()),
            chat: ChatSession::new(answers, settings.chat.clone()),
            preferences: Preferences::default(),
            scope_to_selection: settings.chat.scope_to_selection,
        }
    }

    /// Build a session backed by the HTTP collaborators, sharing one
    /// connection pool.
    pub fn connect(settings: &Settings, notifier: Notifier) -> Result<Self, AppError> {
        let services = &settings.services;
        let client = build_client(services.connect_timeout(), services.request_timeout())?;

        let store = HttpDocumentStore::with_client(client.clone(), &services.base_url)?;
        let answers =
            HttpAnswerService::with_client(client, &services.base_url, services.answer_timeout())?;

        tracing::info!(base_url = %services.base_url, "Client session configured");
        Ok(Self::new(settings, Arc::new(store), Arc::new(answers), notifier))
    }

    /// Load the document list.
    pub async fn start(&self) -> DocumentsLoad {
        self.documents.load_documents().await
    }

    /// Ask a question, scoped to the active document when configured to.
    pub fn ask(&self, text: &str) -> SubmitOutcome {
        let mut question = Question::new(text);
        if self.scope_to_selection {
            if let Some(id) = self.documents.active_id() {
                question = question.scoped_to(id);
            }
        }
        self.chat.submit(question)
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn toggle_theme(&mut self) -> ThemeMode {
        self.preferences.toggle_theme()
    }

    /// Stop every running upload task.
    pub fn shutdown(&self) {
        self.uploads.shutdown();
    }
}
