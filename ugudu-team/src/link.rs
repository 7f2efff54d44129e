//! [`TeamHandle`]: the non-owning [`TeamLink`] every member holds.
//!
//! Wraps a `Weak<Team>` rather than implementing `TeamLink` on `Team`
//! itself, so the member→team edge never keeps the team alive (§9
//! "Cyclic ownership"). A member whose team has already been dropped
//! degrades gracefully: `cancellation()` returns an already-fresh token
//! (never cancelled, so callers just block until their own timeout) and
//! `send`/`register_task`/`complete_task` become no-ops.

use std::sync::Weak;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use ugudu_member::{Envelope, Task, TaskOutcome, TeamLink};

use crate::team::Team;

pub(crate) struct TeamHandle {
    pub(crate) inner: Weak<Team>,
}

#[async_trait]
impl TeamLink for TeamHandle {
    fn cancellation(&self) -> CancellationToken {
        match self.inner.upgrade() {
            Some(team) => team.cancellation_token(),
            None => CancellationToken::new(),
        }
    }

    async fn resolve_role(&self, role: &str) -> Option<String> {
        let team = self.inner.upgrade()?;
        team.resolve_role_impl(role).await
    }

    async fn send(&self, envelope: Envelope) {
        if let Some(team) = self.inner.upgrade() {
            team.bus_send(envelope).await;
        }
    }

    async fn register_task(&self, task: Task) -> oneshot::Receiver<TaskOutcome> {
        match self.inner.upgrade() {
            Some(team) => team.register_task_impl(task).await,
            None => {
                let (_tx, rx) = oneshot::channel();
                rx
            }
        }
    }

    async fn complete_task(&self, task_id: &str, outcome: TaskOutcome) {
        if let Some(team) = self.inner.upgrade() {
            team.complete_task_impl(task_id, outcome).await;
        }
    }
}
