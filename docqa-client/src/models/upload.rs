use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// The only media type the tracker accepts.
pub const ACCEPTED_MEDIA_TYPE: &str = "application/pdf";

/// Client-generated identity of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for UploadId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Handle to a file payload plus the metadata the upload needs.
///
/// The payload is shared, so cloning a `FileRef` never copies the bytes.
#[derive(Clone)]
pub struct FileRef {
    name: String,
    media_type: String,
    data: Arc<[u8]>,
}

impl FileRef {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk, declaring its media type from the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(name, media_type_for(path), data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_accepted(&self) -> bool {
        self.media_type.eq_ignore_ascii_case(ACCEPTED_MEDIA_TYPE)
    }
}

impl fmt::Debug for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRef")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size", &self.data.len())
            .finish()
    }
}

fn media_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => ACCEPTED_MEDIA_TYPE,
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Uploading,
    Processing,
    Ready,
    Error,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Uploading => "uploading",
            UploadStatus::Processing => "processing",
            UploadStatus::Ready => "ready",
            UploadStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Ready | UploadStatus::Error)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One file's journey from submission to indexed-or-failed.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub id: UploadId,
    pub file: FileRef,
    pub status: UploadStatus,
    /// Percentage, 0-100. Reaches 100 only together with `Ready`.
    pub progress: u8,
    /// Set only when `status == Error`.
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UploadItem {
    pub(crate) fn new(file: FileRef) -> Self {
        Self {
            id: UploadId::new(),
            file,
            status: UploadStatus::Uploading,
            progress: 0,
            error_message: None,
            created_at: Utc::now(),
        }
    }
}

/// Acknowledgement record returned by the document store for an upload.
/// Its shape is owned by the store; the client only keeps it for logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadAck(pub serde_json::Value);
