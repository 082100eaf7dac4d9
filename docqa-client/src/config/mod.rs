use client_core::config::{configuration_directory, load_settings, LoggingSettings};
use client_core::error::AppError;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub services: ServiceSettings,
    #[serde(default)]
    pub uploads: UploadSettings,
    #[serde(default)]
    pub documents: DocumentSettings,
    #[serde(default)]
    pub chat: ChatSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceSettings {
    /// Origin serving both the document store and the answering service.
    pub base_url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Answers can take much longer than document calls.
    #[serde(default = "default_answer_timeout_secs")]
    pub answer_timeout_secs: u64,
}

impl ServiceSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn answer_timeout(&self) -> Duration {
        Duration::from_secs(self.answer_timeout_secs)
    }
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_answer_timeout_secs() -> u64 {
    120
}

/// Shape of the simulated progress shown while a file is in flight.
#[derive(Debug, Deserialize, Clone)]
pub struct UploadSettings {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_progress_step")]
    pub progress_step: u8,
    /// Upper bound of a random extra added to each step.
    #[serde(default)]
    pub progress_jitter: u8,
    /// Simulated progress never passes this value.
    #[serde(default = "default_progress_ceiling")]
    pub progress_ceiling: u8,
    /// Progress shown while the store processes the file.
    #[serde(default = "default_processing_progress")]
    pub processing_progress: u8,
}

impl UploadSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            progress_step: default_progress_step(),
            progress_jitter: 0,
            progress_ceiling: default_progress_ceiling(),
            processing_progress: default_processing_progress(),
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    200
}

fn default_progress_step() -> u8 {
    15
}

fn default_progress_ceiling() -> u8 {
    90
}

fn default_processing_progress() -> u8 {
    95
}

/// What the selector does after a successful listing.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InitialSelection {
    #[default]
    None,
    First,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DocumentSettings {
    #[serde(default)]
    pub initial_selection: InitialSelection,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatSettings {
    /// Send the active document's id along with each question.
    #[serde(default)]
    pub scope_to_selection: bool,
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_failure_reply")]
    pub failure_reply: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            scope_to_selection: false,
            greeting: default_greeting(),
            failure_reply: default_failure_reply(),
        }
    }
}

fn default_greeting() -> String {
    "Hello! I'm ready to help you analyze your documents. You can ask me questions about the \
     uploaded PDFs, and I'll provide answers with source references. What would you like to know?"
        .to_string()
}

fn default_failure_reply() -> String {
    "Failed to get response from backend.".to_string()
}

impl Settings {
    /// Reject values that would break the upload or chat state machines.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.services.base_url.trim().is_empty() {
            return Err(AppError::InvalidConfig("services.base_url is empty".into()));
        }
        if reqwest::Url::parse(&self.services.base_url).is_err() {
            return Err(AppError::InvalidConfig(format!(
                "services.base_url is not a valid URL: {}",
                self.services.base_url
            )));
        }

        let uploads = &self.uploads;
        if uploads.tick_interval_ms == 0 {
            return Err(AppError::InvalidConfig("uploads.tick_interval_ms must be positive".into()));
        }
        if uploads.progress_step == 0 {
            return Err(AppError::InvalidConfig("uploads.progress_step must be positive".into()));
        }
        if uploads.progress_ceiling >= uploads.processing_progress {
            return Err(AppError::InvalidConfig(
                "uploads.progress_ceiling must be below uploads.processing_progress".into(),
            ));
        }
        if uploads.processing_progress >= 100 {
            return Err(AppError::InvalidConfig(
                "uploads.processing_progress must be below 100".into(),
            ));
        }

        if self.chat.greeting.trim().is_empty() {
            return Err(AppError::InvalidConfig("chat.greeting is empty".into()));
        }

        Ok(())
    }
}

pub fn get_configuration() -> Result<Settings, AppError> {
    let directory = configuration_directory("docqa-client")?;
    let settings: Settings = load_settings(&directory)?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
pub(crate) fn test_settings(base_url: &str) -> Settings {
    Settings {
        services: ServiceSettings {
            base_url: base_url.to_string(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            answer_timeout_secs: default_answer_timeout_secs(),
        },
        uploads: UploadSettings::default(),
        documents: DocumentSettings::default(),
        chat: ChatSettings::default(),
        logging: LoggingSettings::default(),
    }
}
