//! The seam between a [`crate::Member`] and its enclosing team (§9
//! "Cyclic ownership").
//!
//! Members reference their team non-owningly: rather than depending on
//! `ugudu-team` (which owns members by id, the opposite direction),
//! a member holds `Arc<dyn TeamLink>` and the team implements it. This
//! keeps members the dependency leaves (§2 "components, leaves first").

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::message::Envelope;
use crate::task::{Task, TaskOutcome};

/// Operations a member needs from its enclosing team: routing, role
/// resolution, the shared task table, and the activity sink.
#[async_trait]
pub trait TeamLink: Send + Sync {
    /// The team's cancellation token; cancelling it unblocks every
    /// member receive, provider call, and child-task wait.
    fn cancellation(&self) -> CancellationToken;

    /// Resolve a role name to a live member id, preferring an idle
    /// member if any exist for that role (§4.2 "Role resolution").
    /// `None` if the role doesn't exist or has no members.
    async fn resolve_role(&self, role: &str) -> Option<String>;

    /// Offer an envelope onto the internal bus (or the client channel,
    /// if `envelope.to == Envelope::CLIENT`). Non-blocking: a full
    /// channel drops the message and logs a warning.
    async fn send(&self, envelope: Envelope);

    /// Register a task in the team's task table and return the
    /// receiving half of its single-slot result channel.
    async fn register_task(&self, task: Task) -> oneshot::Receiver<TaskOutcome>;

    /// Complete a previously registered task: update its stored status
    /// and result, then deliver the outcome through its result channel.
    /// Exactly one send occurs over a task's lifetime.
    async fn complete_task(&self, task_id: &str, outcome: TaskOutcome);
}
