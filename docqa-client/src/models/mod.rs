pub mod chat;
pub mod document;
pub mod upload;

pub use chat::{Answer, ChatTurn, Question, Role, SourceRef, TurnId};
pub use document::{DocumentRef, DocumentSummary, InsightBundle};
pub use upload::{FileRef, UploadAck, UploadId, UploadItem, UploadStatus, ACCEPTED_MEDIA_TYPE};
