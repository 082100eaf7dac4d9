use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Warning,
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
}

/// Fire-and-forget sink for [`Notification`]s.
///
/// Delivery is best effort: a closed or missing receiver never affects the
/// caller.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Notification>>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A notifier that drops everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn notify(&self, level: NotificationLevel, title: &str, description: impl Into<String>) {
        let Some(tx) = &self.tx else {
            return;
        };

        let notification = Notification {
            level,
            title: title.to_string(),
            description: description.into(),
        };

        if tx.send(notification).is_err() {
            tracing::debug!(title, "Notification receiver closed, dropping notification");
        }
    }

    pub fn success(&self, title: &str, description: impl Into<String>) {
        self.notify(NotificationLevel::Success, title, description);
    }

    pub fn warning(&self, title: &str, description: impl Into<String>) {
        self.notify(NotificationLevel::Warning, title, description);
    }

    pub fn error(&self, title: &str, description: impl Into<String>) {
        self.notify(NotificationLevel::Error, title, description);
    }
}
