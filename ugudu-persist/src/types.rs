//! Records that cross the persistence port.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of one turn in a member's conversation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextRole {
    /// The assembled system prompt (persona, tools, delegation vocabulary).
    System,
    /// A turn supplied to the member (client request, task assignment, or
    /// a fed-back delegation result).
    User,
    /// A model-generated turn, possibly carrying tool calls.
    Assistant,
    /// The result of executing one tool call.
    Tool,
}

/// A tool call an assistant turn asked to execute, as persisted alongside
/// the turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToolCall {
    /// Id correlating this call with its eventual `Tool` result turn.
    pub id: String,
    /// The tool's name.
    pub name: String,
    /// The raw JSON arguments passed to the tool.
    pub input: serde_json::Value,
}

/// One turn in a member's conversation history, as it crosses the
/// persistence port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRecord {
    /// The turn's role.
    pub role: ContextRole,
    /// The turn's text content.
    pub content: String,
    /// For `Tool` turns: the id of the `ToolUse` this result answers.
    pub tool_call_id: Option<String>,
    /// For `Assistant` turns: the tool calls the model requested.
    pub tool_calls: Vec<StoredToolCall>,
    /// Position of this turn within its `(team, member, conversation)`,
    /// strictly increasing from 1 with no gaps.
    pub sequence: u64,
}

impl ContextRecord {
    /// A plain-text turn with no tool calls and no tool-result linkage.
    #[must_use]
    pub fn plain(role: ContextRole, content: impl Into<String>, sequence: u64) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
            sequence,
        }
    }
}

/// Lifecycle state of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationStatus {
    /// The conversation is the team's current active conversation.
    Active,
    /// The conversation has been superseded; kept for history only.
    Closed,
}

/// A conversation record (§3 `Conversation`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Conversation id.
    pub id: String,
    /// Owning team name.
    pub team: String,
    /// When the conversation was created.
    pub started_at: DateTime<Utc>,
    /// When the conversation last received a turn.
    pub last_activity: DateTime<Utc>,
    /// Lifecycle state.
    pub status: ConversationStatus,
}

/// Whether a persisted team was running at last observation, used by the
/// manager to decide whether to auto-start it on restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamStatus {
    /// The team was started and had not been stopped.
    Running,
    /// The team was stopped, or never started.
    Stopped,
}

/// A persisted team registration (§4.3 restore-on-startup).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRecord {
    /// The team's instance name.
    pub name: String,
    /// Filesystem path of the YAML spec this team was constructed from.
    pub spec_path: String,
    /// Last observed lifecycle status.
    pub status: TeamStatus,
}

/// The kind of activity an [`ActivityEvent`] reports (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityEventKind {
    /// A tool call was issued.
    ToolCall,
    /// A tool call failed.
    ToolError,
    /// A member began processing a task assignment.
    TaskStarted,
    /// A member received a task assignment.
    TaskReceived,
    /// A task reached a terminal state.
    TaskCompleted,
    /// A member delegated work to a peer.
    Delegation,
    /// A member's status FSM transitioned.
    StatusChange,
    /// A non-fatal anomaly (dropped message, unknown delegation target).
    Warning,
}

/// A single observable activity event, fed to the persistence port's
/// `OnActivity` sink (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Owning team name.
    pub team: String,
    /// Member id the event concerns (empty for team-wide events).
    pub member: String,
    /// The event kind.
    pub kind: ActivityEventKind,
    /// Human-readable detail, truncated by the emitter as needed.
    pub message: String,
}
