//! Line-oriented command language of the `docqa-console` binary, plus the
//! plain-text renderings it prints.

use std::fmt::Write;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::models::{ChatTurn, DocumentRef, Role, UploadId, UploadItem, UploadStatus};
use crate::selector::InsightState;

pub const HELP: &str = "\
Commands:
  upload <path>...   upload one or more files (PDF only)
  uploads            show upload progress
  remove <id>        remove an upload, cancelling it if still running
  docs               list documents
  reload             reload the document list
  select <id>        select a document and load its insights
  insights           show insights for the selected document
  ask <question>     ask a question about the documents
  transcript         show the chat transcript
  new                start a new chat
  theme              toggle light/dark theme
  help               show this help
  quit               exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Upload(Vec<PathBuf>),
    Uploads,
    Remove(UploadId),
    Docs,
    Reload,
    Select(String),
    Insights,
    Ask(String),
    Transcript,
    NewChat,
    Theme,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty input")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid upload id: {0}")]
    InvalidId(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match verb.to_ascii_lowercase().as_str() {
            "upload" => {
                let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
                if paths.is_empty() {
                    return Err(CommandError::Usage("upload <path>..."));
                }
                Ok(Command::Upload(paths))
            }
            "uploads" => Ok(Command::Uploads),
            "remove" | "rm" => {
                if rest.is_empty() {
                    return Err(CommandError::Usage("remove <id>"));
                }
                rest.parse()
                    .map(Command::Remove)
                    .map_err(|_| CommandError::InvalidId(rest.to_string()))
            }
            "docs" => Ok(Command::Docs),
            "reload" => Ok(Command::Reload),
            "select" => {
                if rest.is_empty() {
                    return Err(CommandError::Usage("select <id>"));
                }
                Ok(Command::Select(rest.to_string()))
            }
            "insights" => Ok(Command::Insights),
            "ask" => {
                if rest.is_empty() {
                    return Err(CommandError::Usage("ask <question>"));
                }
                Ok(Command::Ask(rest.to_string()))
            }
            "transcript" => Ok(Command::Transcript),
            "new" => Ok(Command::NewChat),
            "theme" => Ok(Command::Theme),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

pub fn render_uploads(items: &[UploadItem]) -> String {
    if items.is_empty() {
        return "No uploads.".to_string();
    }

    let mut out = String::new();
    for item in items {
        let _ = write!(
            out,
            "{}  {:<10} {:>3}%  {}",
            item.id, item.status, item.progress, item.file.name()
        );
        if item.status == UploadStatus::Error {
            if let Some(message) = &item.error_message {
                let _ = write!(out, "  ({})", message);
            }
        }
        out.push('\n');
    }
    out
}

pub fn render_documents(documents: &[DocumentRef]) -> String {
    if documents.is_empty() {
        return "No documents.".to_string();
    }

    let mut out = String::new();
    for doc in documents {
        let marker = if doc.selected { '*' } else { ' ' };
        let _ = writeln!(out, "{} {}  {}", marker, doc.id, doc.name);
    }
    out
}

pub fn render_insights(insights: &InsightState) -> String {
    match insights {
        InsightState::Empty => "No document selected.".to_string(),
        InsightState::Loading { document_id } => format!("Loading insights for {}...", document_id),
        InsightState::Failed { document_id } => format!("No insights available for {}.", document_id),
        InsightState::Ready { document_id, bundle } => {
            let mut out = format!("Insights for {}\n\nSummary:\n  {}\n", document_id, bundle.summary);
            if !bundle.key_points.is_empty() {
                out.push_str("\nKey points:\n");
                for point in &bundle.key_points {
                    let _ = writeln!(out, "  - {}", point);
                }
            }
            if !bundle.entities.is_empty() {
                let _ = writeln!(out, "\nEntities: {}", bundle.entities.join(", "));
            }
            out
        }
    }
}

pub fn render_turn(turn: &ChatTurn) -> String {
    let speaker = match turn.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let mut out = format!("[{}] {}: {}\n", turn.created_at.format("%H:%M:%S"), speaker, turn.content);
    if let Some(sources) = &turn.sources {
        for source in sources {
            let _ = writeln!(
                out,
                "    p.{} ({:.0}%): {}",
                source.page,
                source.relevance_score * 100.0,
                source.excerpt
            );
        }
    }
    out
}

pub fn render_transcript(turns: &[ChatTurn]) -> String {
    turns.iter().map(render_turn).collect()
}
