use client_core::observability::init_tracing;
use docqa_client::chat::{ChatSession, IgnoreReason, SubmitOutcome};
use docqa_client::config::get_configuration;
use docqa_client::console::{self, Command, CommandError};
use docqa_client::models::{FileRef, TurnId};
use docqa_client::selector::{DocumentsLoad, SelectOutcome};
use docqa_client::services::{Notification, NotificationLevel, Notifier};
use docqa_client::ClientSession;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing("docqa-console", &configuration.logging)?;

    let (notifier, notifications) = Notifier::channel();
    let mut session = ClientSession::connect(&configuration, notifier)?;

    tokio::spawn(print_notifications(notifications));
    tokio::spawn(follow_transcript(session.chat.clone()));

    info!(base_url = %configuration.services.base_url, "Starting docqa-console");
    report_load(session.start().await);
    println!("{}", console::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(CommandError::Empty) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            Command::Upload(paths) => {
                let mut files = Vec::with_capacity(paths.len());
                for path in &paths {
                    match FileRef::from_path(path).await {
                        Ok(file) => files.push(file),
                        Err(e) => println!("Cannot read {}: {}", path.display(), e),
                    }
                }
                let report = session.uploads.submit_files(files);
                for id in &report.accepted {
                    println!("Uploading as {}", id);
                }
            }
            Command::Uploads => print!("{}", console::render_uploads(&session.uploads.items())),
            Command::Remove(id) => {
                if !session.uploads.remove(id) {
                    println!("No upload with id {}", id);
                }
            }
            Command::Docs => print!("{}", console::render_documents(&session.documents.documents())),
            Command::Reload => report_load(session.documents.load_documents().await),
            Command::Select(id) => {
                let selection = session.documents.select(&id);
                if selection.outcome == SelectOutcome::NotFound {
                    println!("{} is not in the document list", id);
                }
                selection.settled().await;
                print!("{}", console::render_insights(&session.documents.insights()));
            }
            Command::Insights => {
                print!("{}", console::render_insights(&session.documents.insights()))
            }
            Command::Ask(text) => match session.ask(&text) {
                SubmitOutcome::Accepted(_) => {}
                SubmitOutcome::Ignored(IgnoreReason::AwaitingAnswer) => {
                    println!("Still waiting for the previous answer.")
                }
                SubmitOutcome::Ignored(IgnoreReason::EmptyQuestion) => {}
            },
            Command::Transcript => print!("{}", console::render_transcript(&session.chat.transcript())),
            Command::NewChat => session.chat.new_chat(),
            Command::Theme => println!("Theme: {}", session.toggle_theme()),
            Command::Help => println!("{}", console::HELP),
            Command::Quit => break,
        }
    }

    session.shutdown();
    info!("docqa-console stopped");
    Ok(())
}

fn report_load(load: DocumentsLoad) {
    match load {
        DocumentsLoad::Loaded { count, .. } => println!("{} document(s) available.", count),
        DocumentsLoad::Unavailable => println!("Document list unavailable."),
        DocumentsLoad::Discarded => {}
    }
}

async fn print_notifications(mut notifications: mpsc::UnboundedReceiver<Notification>) {
    while let Some(notification) = notifications.recv().await {
        let label = match notification.level {
            NotificationLevel::Success => "ok",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        };
        println!("[{}] {}: {}", label, notification.title, notification.description);
    }
}

/// Print turns as they are appended. Turn ids only grow, so a reset shows
/// up as a fresh greeting with a higher id.
async fn follow_transcript(chat: ChatSession) {
    let mut lengths = chat.subscribe();
    let mut last_printed: Option<TurnId> = None;

    loop {
        for turn in chat.transcript() {
            if last_printed.map_or(true, |last| turn.id > last) {
                print!("{}", console::render_turn(&turn));
                last_printed = Some(turn.id);
            }
        }
        if lengths.changed().await.is_err() {
            break;
        }
    }
}
