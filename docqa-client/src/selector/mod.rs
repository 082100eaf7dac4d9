//! Document selector and insight loader.
//!
//! At most one document is active. Every selection, clear, and listing reload
//! bumps a generation counter; an insight response is applied only if the
//! generation it was issued under is still current.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

use crate::config::{DocumentSettings, InitialSelection};
use crate::models::{DocumentRef, InsightBundle};
use crate::services::metrics::{record_documents_load, record_insight_fetch};
use crate::services::DocumentStore;

/// What the insight panel shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InsightState {
    #[default]
    Empty,
    Loading {
        document_id: String,
    },
    Ready {
        document_id: String,
        bundle: InsightBundle,
    },
    /// The fetch failed; the panel shows nothing for this document.
    Failed {
        document_id: String,
    },
}

impl InsightState {
    pub fn is_loading(&self) -> bool {
        matches!(self, InsightState::Loading { .. })
    }

    pub fn bundle(&self) -> Option<&InsightBundle> {
        match self {
            InsightState::Ready { bundle, .. } => Some(bundle),
            _ => None,
        }
    }

    pub fn document_id(&self) -> Option<&str> {
        match self {
            InsightState::Empty => None,
            InsightState::Loading { document_id }
            | InsightState::Ready { document_id, .. }
            | InsightState::Failed { document_id } => Some(document_id),
        }
    }
}

pub enum DocumentsLoad {
    Loaded {
        count: usize,
        /// Selection made by the `first` initial-selection policy.
        initial: Option<Selection>,
    },
    /// The listing call failed; the selector now holds an empty list.
    Unavailable,
    /// A newer reload was issued before this one resolved; nothing changed.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Selected,
    /// No listed document has this id. Flags and active id are unchanged.
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightFetch {
    Applied,
    Failed,
    /// A newer selection or reload superseded this fetch.
    Discarded,
}

/// A selection whose insight fetch may still be in flight.
pub struct Selection {
    pub outcome: SelectOutcome,
    fetch: JoinHandle<InsightFetch>,
}

impl Selection {
    pub async fn settled(self) -> InsightFetch {
        self.fetch.await.unwrap_or(InsightFetch::Discarded)
    }
}

#[derive(Default)]
struct SelectorState {
    documents: Vec<DocumentRef>,
    active_id: Option<String>,
    generation: u64,
    load_generation: u64,
    insights: InsightState,
}

struct SelectorInner {
    state: Mutex<SelectorState>,
    store: Arc<dyn DocumentStore>,
    settings: DocumentSettings,
}

#[derive(Clone)]
pub struct DocumentSelector {
    inner: Arc<SelectorInner>,
}

impl DocumentSelector {
    pub fn new(store: Arc<dyn DocumentStore>, settings: DocumentSettings) -> Self {
        Self {
            inner: Arc::new(SelectorInner {
                state: Mutex::new(SelectorState::default()),
                store,
                settings,
            }),
        }
    }

    /// Replace the listing wholesale. Any active selection and in-flight
    /// insight fetch is dropped. A listing that resolves after a newer
    /// reload was issued is discarded.
    pub async fn load_documents(&self) -> DocumentsLoad {
        let token = {
            let mut state = self.lock();
            state.load_generation += 1;
            state.load_generation
        };

        let result = self.inner.store.list_documents().await;

        let count = {
            let mut state = self.lock();
            if state.load_generation != token {
                tracing::debug!(token, current = state.load_generation, "Discarding stale document list");
                record_documents_load("discarded");
                return DocumentsLoad::Discarded;
            }

            state.generation += 1;
            state.active_id = None;
            state.insights = InsightState::Empty;

            match result {
                Ok(listing) => {
                    state.documents = listing.into_iter().map(DocumentRef::from).collect();
                    record_documents_load("loaded");
                    tracing::info!(count = state.documents.len(), "Loaded document list");
                    Some(state.documents.len())
                }
                Err(e) => {
                    state.documents.clear();
                    record_documents_load("unavailable");
                    tracing::error!(error = %e, "Failed to load documents");
                    None
                }
            }
        };

        let Some(count) = count else {
            return DocumentsLoad::Unavailable;
        };

        let initial = match self.inner.settings.initial_selection {
            InitialSelection::None => None,
            InitialSelection::First => self
                .documents()
                .first()
                .map(|doc| doc.id.clone())
                .map(|id| self.select(&id)),
        };

        DocumentsLoad::Loaded { count, initial }
    }

    /// Make `document_id` the single active document and fetch its insights.
    pub fn select(&self, document_id: &str) -> Selection {
        let (outcome, generation) = {
            let mut state = self.lock();
            state.generation += 1;

            let found = state.documents.iter().any(|doc| doc.id == document_id);
            if found {
                for doc in state.documents.iter_mut() {
                    doc.selected = doc.id == document_id;
                }
                state.active_id = Some(document_id.to_string());
            } else {
                tracing::warn!(document_id, "Selected document is not in the listing");
            }
            state.insights = InsightState::Loading {
                document_id: document_id.to_string(),
            };

            let outcome = if found {
                SelectOutcome::Selected
            } else {
                SelectOutcome::NotFound
            };
            (outcome, state.generation)
        };

        let this = self.clone();
        let document_id = document_id.to_string();
        let fetch = tokio::spawn(async move { this.fetch_insights(generation, document_id).await });

        Selection { outcome, fetch }
    }

    /// Deselect everything and drop any in-flight insight fetch.
    pub fn clear_selection(&self) {
        let mut state = self.lock();
        state.generation += 1;
        for doc in state.documents.iter_mut() {
            doc.selected = false;
        }
        state.active_id = None;
        state.insights = InsightState::Empty;
    }

    pub fn documents(&self) -> Vec<DocumentRef> {
        self.lock().documents.clone()
    }

    pub fn active_id(&self) -> Option<String> {
        self.lock().active_id.clone()
    }

    pub fn insights(&self) -> InsightState {
        self.lock().insights.clone()
    }

    pub fn is_loading_insights(&self) -> bool {
        self.lock().insights.is_loading()
    }

    pub fn selected_count(&self) -> usize {
        self.lock().documents.iter().filter(|doc| doc.selected).count()
    }

    fn lock(&self) -> MutexGuard<'_, SelectorState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch_insights(&self, generation: u64, document_id: String) -> InsightFetch {
        let result = self.inner.store.fetch_insights(&document_id).await;

        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!(document_id = %document_id, "Discarding stale insights");
            record_insight_fetch("discarded");
            return InsightFetch::Discarded;
        }

        match result {
            Ok(bundle) => {
                state.insights = InsightState::Ready { document_id, bundle };
                record_insight_fetch("applied");
                InsightFetch::Applied
            }
            Err(e) => {
                tracing::error!(document_id = %document_id, error = %e, "Failed to load insights");
                state.insights = InsightState::Failed { document_id };
                record_insight_fetch("failed");
                InsightFetch::Failed
            }
        }
    }
}
