//! Fire-and-forget lifecycle notifications.
//!
//! Messages are values pushed over an unbounded channel to a single worker
//! task that hands them to a [`MailTransport`]. Sending never blocks and
//! delivery failures are only logged.

use std::fmt;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use buildconf_shared::{BuildConfigurationModel, Result};

/// One outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    pub subject: String,
    /// Primary recipient; ignored unless it looks like a single address.
    pub destination: String,
    /// Comma-separated carbon-copy list.
    pub cc: String,
    pub body: String,
}

impl MessageInfo {
    /// `destination`, if it is usable: contains `@` and no spaces.
    pub fn valid_destination(&self) -> Option<&str> {
        let destination = self.destination.trim();
        (destination.contains('@') && !destination.contains(' ')).then_some(destination)
    }

    pub fn cc_addresses(&self) -> Vec<&str> {
        self.cc
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect()
    }

    pub fn has_recipients(&self) -> bool {
        self.valid_destination().is_some() || !self.cc_addresses().is_empty()
    }
}

/// Lifecycle change a message reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    MarkedForDeletion,
    Restored,
    DeletedPermanently,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarkedForDeletion => write!(f, "marked for deletion"),
            Self::Restored => write!(f, "restored"),
            Self::DeletedPermanently => write!(f, "deleted permanently"),
        }
    }
}

/// Status message about `model`: to the administrator, copied to the
/// configuration's notification list.
pub fn status_message(
    model: &BuildConfigurationModel,
    event: LifecycleEvent,
    admin_email: &str,
) -> MessageInfo {
    MessageInfo {
        subject: model.project_name.clone(),
        destination: admin_email.to_string(),
        cc: model.config_email_recipients(),
        body: format!(
            "Build configuration \"{}\" has been {event}.",
            model.project_name
        ),
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Delivers messages. Runs on the notification worker, never on the caller.
pub trait MailTransport: Send + Sync + 'static {
    fn deliver(&self, message: &MessageInfo) -> Result<()>;

    /// Transport name for tracing.
    fn name(&self) -> &str;
}

/// Writes each message to the log instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogTransport {
    from: String,
}

impl LogTransport {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl MailTransport for LogTransport {
    fn deliver(&self, message: &MessageInfo) -> Result<()> {
        info!(
            from = %self.from,
            to = message.valid_destination().unwrap_or(""),
            cc = %message.cc,
            subject = %message.subject,
            body = %message.body,
            "notification"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Handle for queueing notifications. Cheap to clone; the worker stops
/// once every handle is dropped.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    sender: Option<mpsc::UnboundedSender<MessageInfo>>,
}

impl Notifier {
    /// Start a worker on the current tokio runtime.
    pub fn spawn<T: MailTransport>(transport: T) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(transport, rx));
        (Self { sender: Some(tx) }, handle)
    }

    /// Notifier that drops every message.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Queue `message` for delivery.
    pub fn send(&self, message: MessageInfo) {
        let Some(sender) = &self.sender else {
            debug!(subject = %message.subject, "notifications disabled");
            return;
        };
        if let Err(e) = sender.send(message) {
            warn!(subject = %e.0.subject, "notification worker has stopped");
        }
    }
}

async fn run_worker<T: MailTransport>(transport: T, mut rx: mpsc::UnboundedReceiver<MessageInfo>) {
    while let Some(message) = rx.recv().await {
        if !message.has_recipients() {
            debug!(subject = %message.subject, "no recipients, skipped");
            continue;
        }
        match transport.deliver(&message) {
            Ok(()) => debug!(transport = transport.name(), subject = %message.subject, "delivered"),
            Err(e) => error!(
                transport = transport.name(),
                subject = %message.subject,
                error = %e,
                "notification delivery failed"
            ),
        }
    }
    debug!("notification worker stopped");
}
