//! The envelope carried on a team's internal bus (§3 `Message`).

use chrono::{DateTime, Utc};

/// What kind of coordination a bus [`Envelope`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// A request originating from the external client.
    ClientRequest,
    /// A message bound for the external client.
    ClientResponse,
    /// A unit of delegated work assigned to a member.
    TaskAssignment,
    /// Notification that a delegated task finished.
    TaskComplete,
    /// A colleague-to-colleague question.
    Question,
    /// A reply to a [`MessageType::Question`].
    Answer,
    /// A status or progress report, logged but not awaited.
    Report,
}

/// One message on a team's internal bus, or bound for the client channel.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Unique id for this envelope.
    pub id: String,
    /// What kind of message this is.
    pub kind: MessageType,
    /// Sender member id (or `"client"`).
    pub from: String,
    /// Recipient member id, or the literal `"client"`.
    pub to: String,
    /// Message body.
    pub content: String,
    /// The task this message relates to, if any.
    pub task_id: Option<String>,
    /// When the envelope was created.
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// The recipient sentinel used for client-bound messages.
    pub const CLIENT: &'static str = "client";

    /// Build an envelope with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(kind: MessageType, from: impl Into<String>, to: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            from: from.into(),
            to: to.into(),
            content: content.into(),
            task_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach a task id to this envelope.
    #[must_use]
    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }
}
