//! [`Store`] — the broad, process-wide persistence backend (§6 informative
//! storage layout: `teams`, `conversations`, `agent_context`).
//!
//! A [`Store`] is what `ugudu-persist-memory`/`ugudu-persist-sqlite`
//! implement. The manager scopes one down to a team-bound
//! [`crate::PersistencePort`] via [`crate::ScopedPersistence`].

use async_trait::async_trait;

use crate::error::PersistError;
use crate::types::{ContextRecord, TeamRecord, TeamStatus};

/// Process-wide persistence backend: team registry plus per-team
/// conversation/context storage.
#[async_trait]
pub trait Store: Send + Sync {
    /// Register a team, or update its spec path if already registered.
    async fn register_team(&self, name: &str, spec_path: &str) -> Result<(), PersistError>;

    /// Update a registered team's lifecycle status.
    async fn set_team_status(&self, name: &str, status: TeamStatus) -> Result<(), PersistError>;

    /// All registered teams, in registration order.
    async fn list_teams(&self) -> Result<Vec<TeamRecord>, PersistError>;

    /// Remove a team's registration. Does not delete its conversations or
    /// context — those remain addressable by team name for audit.
    async fn delete_team(&self, name: &str) -> Result<(), PersistError>;

    /// Start a new conversation for `team` and mark it active, closing
    /// whatever conversation was previously active.
    async fn create_conversation(&self, team: &str) -> Result<String, PersistError>;

    /// The id of `team`'s current active conversation, if any.
    async fn get_active_conversation(&self, team: &str) -> Result<Option<String>, PersistError>;

    /// Append one context turn. `record.sequence` must be exactly one
    /// greater than the last sequence saved for this
    /// `(team, member, conversation)` (or `1` for the first turn).
    async fn save_context(
        &self,
        team: &str,
        member: &str,
        conversation: &str,
        record: &ContextRecord,
    ) -> Result<(), PersistError>;

    /// The most recent `limit` turns for `(team, member, conversation)`,
    /// in ascending sequence order.
    async fn load_context(
        &self,
        team: &str,
        member: &str,
        conversation: &str,
        limit: usize,
    ) -> Result<Vec<ContextRecord>, PersistError>;
}
