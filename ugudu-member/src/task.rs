//! Delegated work units (§3 `Task`).

use chrono::{DateTime, Utc};

/// FSM label for a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Created, not yet sent.
    Pending,
    /// Sent to the delegatee's inbox.
    Assigned,
    /// The delegatee is actively working on it.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Reserved for future blocking semantics.
    Blocked,
}

/// The eventual result of a [`Task`], delivered through its single-slot
/// result channel.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// The delegatee completed the task; carries its `COMPLETE:` content
    /// (or, absent an explicit completion, its last assistant turn).
    Success(String),
    /// The delegatee failed to produce a result (e.g. a provider error
    /// inside the handler).
    Failure(String),
}

impl TaskOutcome {
    /// The human-readable content carried by this outcome, regardless of
    /// success or failure.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Success(content) | Self::Failure(content) => content,
        }
    }

    /// Whether this outcome represents a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

/// A unit of delegated work, created by a delegating member and carried
/// over the internal bus to a delegatee.
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique task id.
    pub id: String,
    /// The content the delegatee should act on.
    pub content: String,
    /// Delegating member id.
    pub from: String,
    /// Delegatee member id.
    pub to: String,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Priority, inherited from the parent task or defaulting to 1.
    pub priority: u32,
    /// Free-form metadata; carries `parent_task_id` for sub-delegations.
    pub metadata: serde_json::Value,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task reached a terminal status, if it has.
    pub completed_at: Option<DateTime<Utc>>,
    /// The task's outcome, once terminal.
    pub result: Option<TaskOutcome>,
}

impl Task {
    /// Construct a new, pending task with a fresh id and the current
    /// timestamp.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>, content: impl Into<String>, priority: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            from: from.into(),
            to: to.into(),
            status: TaskStatus::Pending,
            priority,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
        }
    }

    /// Attach `parent_task_id` metadata, used when a sub-delegation is
    /// created while completing another task (§4.1 "Delegation during a
    /// subtask").
    #[must_use]
    pub fn with_parent(mut self, parent_task_id: impl Into<String>) -> Self {
        self.metadata = serde_json::json!({ "parent_task_id": parent_task_id.into() });
        self
    }
}
