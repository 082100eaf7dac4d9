//! Upload tracker.
//!
//! Every accepted file gets an [`UploadItem`] and one spawned task that
//! animates progress on a fixed cadence, then performs the real upload. The
//! tracker keeps each task's cancel handle in an id-keyed map; an entry leaves
//! the map exactly once, on completion or on removal, and its handle is
//! cancelled at that moment. A task whose id is no longer in the map is stale
//! and writes nothing.

use client_core::http::ServiceError;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::UploadSettings;
use crate::models::{FileRef, UploadAck, UploadId, UploadItem, UploadStatus};
use crate::services::metrics::{
    record_upload_outcome, record_upload_task_cancelled, record_uploads_rejected,
};
use crate::services::{DocumentStore, Notifier};

const GENERIC_UPLOAD_ERROR: &str = "Upload failed";

/// Result of a batch submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReport {
    pub accepted: Vec<UploadId>,
    /// Names of the files refused for their media type.
    pub rejected: Vec<String>,
}

/// Cancel handle of one in-flight upload.
struct UploadTask {
    cancel: CancellationToken,
}

impl UploadTask {
    /// Consumes the handle, so each task is cancelled at most once.
    fn cancel(self, reason: &'static str) {
        self.cancel.cancel();
        record_upload_task_cancelled(reason);
    }
}

#[derive(Default)]
struct TrackerState {
    items: Vec<UploadItem>,
    tasks: HashMap<UploadId, UploadTask>,
    revision: u64,
}

struct TrackerInner {
    state: Mutex<TrackerState>,
    store: Arc<dyn DocumentStore>,
    notifier: Notifier,
    settings: UploadSettings,
    changes: watch::Sender<u64>,
}

enum Tick {
    Continue,
    Ceiling,
    Stale,
}

#[derive(Clone)]
pub struct UploadTracker {
    inner: Arc<TrackerInner>,
}

impl UploadTracker {
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Notifier, settings: UploadSettings) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(TrackerInner {
                state: Mutex::new(TrackerState::default()),
                store,
                notifier,
                settings,
                changes,
            }),
        }
    }

    /// Accept every PDF in `files` and start its upload; refuse the rest with
    /// a single aggregate warning.
    pub fn submit_files(&self, files: Vec<FileRef>) -> SubmitReport {
        let (accepted, rejected): (Vec<FileRef>, Vec<FileRef>) =
            files.into_iter().partition(FileRef::is_accepted);

        if !rejected.is_empty() {
            tracing::warn!(count = rejected.len(), "Refusing files with unsupported media type");
            record_uploads_rejected(rejected.len());
            self.inner
                .notifier
                .warning("Unsupported files", "Only PDF files are supported.");
        }

        SubmitReport {
            accepted: accepted.into_iter().map(|file| self.start(file)).collect(),
            rejected: rejected.into_iter().map(|f| f.name().to_string()).collect(),
        }
    }

    /// Single-file form of [`submit_files`](Self::submit_files).
    pub fn submit(&self, file: FileRef) -> Option<UploadId> {
        self.submit_files(vec![file]).accepted.pop()
    }

    /// Remove an item in any state. Its task, if still running, is cancelled
    /// and can no longer touch the tracker.
    pub fn remove(&self, id: UploadId) -> bool {
        let mut state = self.lock();
        if let Some(task) = state.tasks.remove(&id) {
            task.cancel("removed");
        }

        let before = state.items.len();
        state.items.retain(|item| item.id != id);
        let removed = state.items.len() != before;
        if removed {
            tracing::debug!(upload_id = %id, "Upload removed");
            self.bump(&mut state);
        }
        removed
    }

    /// Cancel every running task. Items keep their last state.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        let tasks: Vec<UploadTask> = state.tasks.drain().map(|(_, task)| task).collect();
        for task in tasks {
            task.cancel("shutdown");
        }
    }

    pub fn items(&self) -> Vec<UploadItem> {
        self.lock().items.clone()
    }

    pub fn get(&self, id: UploadId) -> Option<UploadItem> {
        self.lock().items.iter().find(|item| item.id == id).cloned()
    }

    pub fn ready_items(&self) -> Vec<UploadItem> {
        self.lock()
            .items
            .iter()
            .filter(|item| item.status == UploadStatus::Ready)
            .cloned()
            .collect()
    }

    pub fn can_proceed_to_chat(&self) -> bool {
        self.lock()
            .items
            .iter()
            .any(|item| item.status == UploadStatus::Ready)
    }

    /// Number of uploads still holding a live task.
    pub fn active_tasks(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Revision counter, bumped on every change to the item list.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self, state: &mut TrackerState) {
        state.revision += 1;
        self.inner.changes.send_replace(state.revision);
    }

    fn start(&self, file: FileRef) -> UploadId {
        let item = UploadItem::new(file.clone());
        let id = item.id;
        let cancel = CancellationToken::new();

        {
            let mut state = self.lock();
            state.items.push(item);
            state.tasks.insert(
                id,
                UploadTask {
                    cancel: cancel.clone(),
                },
            );
            self.bump(&mut state);
        }

        tracing::info!(upload_id = %id, file_name = %file.name(), size = file.size(), "Upload started");
        tokio::spawn(self.clone().drive(id, file, cancel));
        id
    }

    async fn drive(self, id: UploadId, file: FileRef, cancel: CancellationToken) {
        let period = self.inner.settings.tick_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => match self.advance(id) {
                    Tick::Continue => {}
                    Tick::Ceiling => break,
                    Tick::Stale => return,
                },
            }
        }
        drop(ticker);

        if !self.begin_processing(id) {
            return;
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = self.inner.store.upload(&file) => result,
        };

        self.complete(id, file.name(), result);
    }

    fn advance(&self, id: UploadId) -> Tick {
        let settings = &self.inner.settings;
        let mut state = self.lock();
        if !state.tasks.contains_key(&id) {
            return Tick::Stale;
        }

        let Some(item) = state
            .items
            .iter_mut()
            .find(|item| item.id == id && item.status == UploadStatus::Uploading)
        else {
            return Tick::Stale;
        };

        let jitter = if settings.progress_jitter > 0 {
            rand::thread_rng().gen_range(0..=settings.progress_jitter)
        } else {
            0
        };
        let next = item.progress as u16 + settings.progress_step as u16 + jitter as u16;
        item.progress = next.min(settings.progress_ceiling as u16) as u8;
        let at_ceiling = item.progress >= settings.progress_ceiling;

        self.bump(&mut state);
        if at_ceiling {
            Tick::Ceiling
        } else {
            Tick::Continue
        }
    }

    fn begin_processing(&self, id: UploadId) -> bool {
        let processing_progress = self.inner.settings.processing_progress;
        let mut state = self.lock();
        if !state.tasks.contains_key(&id) {
            return false;
        }

        let Some(item) = state.items.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        item.status = UploadStatus::Processing;
        item.progress = item.progress.max(processing_progress);

        self.bump(&mut state);
        true
    }

    fn complete(&self, id: UploadId, name: &str, result: Result<UploadAck, ServiceError>) {
        let mut state = self.lock();
        let Some(task) = state.tasks.remove(&id) else {
            tracing::debug!(upload_id = %id, "Discarding upload result for removed item");
            return;
        };
        task.cancel("completed");

        let Some(item) = state.items.iter_mut().find(|item| item.id == id) else {
            return;
        };

        let failure = match result {
            Ok(ack) => {
                item.status = UploadStatus::Ready;
                item.progress = 100;
                item.error_message = None;
                tracing::info!(upload_id = %id, file_name = %name, ack = %ack.0, "Upload ready");
                record_upload_outcome("ready");
                None
            }
            Err(e) => {
                let message = e.detail().unwrap_or(GENERIC_UPLOAD_ERROR).to_string();
                item.status = UploadStatus::Error;
                item.error_message = Some(message.clone());
                tracing::error!(upload_id = %id, file_name = %name, error = %e, "Upload failed");
                record_upload_outcome("error");
                Some(message)
            }
        };

        self.bump(&mut state);
        drop(state);

        match failure {
            None => self.inner.notifier.success(
                "Document Ready",
                format!("{} has been indexed and is ready for Q&A.", name),
            ),
            Some(message) => self
                .inner
                .notifier
                .error("Upload failed", format!("{}: {}", name, message)),
        }
    }
}
