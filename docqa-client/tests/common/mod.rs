//! Shared setup for tests that drive a session against a wiremock server.

#![allow(dead_code)]

use client_core::config::LoggingSettings;
use docqa_client::config::{
    ChatSettings, DocumentSettings, InitialSelection, ServiceSettings, Settings, UploadSettings,
};
use docqa_client::models::FileRef;
use docqa_client::services::{Notification, Notifier};
use docqa_client::ClientSession;
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::MockServer;

/// Upper bound for anything a test waits on.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings pointing at `server`, with a fast progress cadence (ceiling after
/// three 10ms ticks).
pub fn settings(server: &MockServer) -> Settings {
    Settings {
        services: ServiceSettings {
            base_url: server.uri(),
            connect_timeout_secs: 2,
            request_timeout_secs: 5,
            answer_timeout_secs: 5,
        },
        uploads: UploadSettings {
            tick_interval_ms: 10,
            progress_step: 30,
            progress_jitter: 0,
            progress_ceiling: 90,
            processing_progress: 95,
        },
        documents: DocumentSettings {
            initial_selection: InitialSelection::None,
        },
        chat: ChatSettings::default(),
        logging: LoggingSettings::default(),
    }
}

pub struct TestSession {
    pub session: ClientSession,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
}

impl TestSession {
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            out.push(n);
        }
        out
    }
}

pub fn connect(settings: &Settings) -> TestSession {
    let (notifier, notifications) = Notifier::channel();
    let session = ClientSession::connect(settings, notifier).expect("session should build");
    TestSession {
        session,
        notifications,
    }
}

pub async fn setup(server: &MockServer) -> TestSession {
    connect(&settings(server))
}

pub fn pdf(name: &str) -> FileRef {
    FileRef::new(name, "application/pdf", b"%PDF-1.4 test".to_vec())
}

/// Poll `condition` every 5ms until it holds or [`WAIT_TIMEOUT`] elapses.
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
