//! [`PersistencePort`] — the narrow, team-bound contract the member
//! runtime and team router consume (§6).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PersistError;
use crate::types::{ActivityEvent, ContextRecord};

/// The four operations (plus the activity sink) a [`crate::Member`] and
/// [`crate::Team`]-equivalent consume — scoped to a single team, so
/// callers never pass a team name on every call.
#[async_trait]
pub trait PersistencePort: Send + Sync {
    /// Start a new conversation and mark it active.
    async fn create_conversation(&self) -> Result<String, PersistError>;

    /// The id of the team's current active conversation, if any.
    async fn get_active_conversation(&self) -> Result<Option<String>, PersistError>;

    /// Append one context turn for `member` within `conversation`.
    async fn save_context(
        &self,
        member: &str,
        conversation: &str,
        record: ContextRecord,
    ) -> Result<(), PersistError>;

    /// The most recent `limit` turns for `member` within `conversation`,
    /// in ascending sequence order.
    async fn load_context(
        &self,
        member: &str,
        conversation: &str,
        limit: usize,
    ) -> Result<Vec<ContextRecord>, PersistError>;

    /// Fire-and-forget activity sink. The default implementation logs via
    /// `tracing` only; the manager overrides this (via
    /// [`crate::ForwardingPersistence`]) to also notify a caller-supplied
    /// subscriber.
    async fn on_activity(&self, event: ActivityEvent) {
        tracing::debug!(
            team = %event.team,
            member = %event.member,
            kind = ?event.kind,
            "{}",
            event.message
        );
    }
}

/// Scopes a process-wide [`crate::Store`] down to one team, giving members
/// and the team router the narrower [`PersistencePort`] they expect.
pub struct ScopedPersistence<S> {
    store: Arc<S>,
    team: String,
}

impl<S: crate::Store> ScopedPersistence<S> {
    /// Bind `store` to `team`.
    #[must_use]
    pub fn new(store: Arc<S>, team: impl Into<String>) -> Self {
        Self { store, team: team.into() }
    }
}

#[async_trait]
impl<S: crate::Store> PersistencePort for ScopedPersistence<S> {
    async fn create_conversation(&self) -> Result<String, PersistError> {
        self.store.create_conversation(&self.team).await
    }

    async fn get_active_conversation(&self) -> Result<Option<String>, PersistError> {
        self.store.get_active_conversation(&self.team).await
    }

    async fn save_context(
        &self,
        member: &str,
        conversation: &str,
        record: ContextRecord,
    ) -> Result<(), PersistError> {
        self.store.save_context(&self.team, member, conversation, &record).await
    }

    async fn load_context(
        &self,
        member: &str,
        conversation: &str,
        limit: usize,
    ) -> Result<Vec<ContextRecord>, PersistError> {
        self.store.load_context(&self.team, member, conversation, limit).await
    }
}

/// Wraps any [`PersistencePort`] to also forward `on_activity` events to a
/// caller-supplied subscriber, matching the manager's
/// `createPersistenceCallbacks()` (§4.3): the subscriber pointer is read
/// fresh on every event, so swapping it (e.g. `Manager::set_activity_sink`)
/// affects every team immediately.
pub struct ForwardingPersistence<P> {
    inner: P,
    subscriber: Arc<std::sync::RwLock<Option<Arc<dyn Fn(ActivityEvent) + Send + Sync>>>>,
}

impl<P: PersistencePort> ForwardingPersistence<P> {
    /// Wrap `inner`, forwarding activity events through `subscriber`.
    #[must_use]
    pub fn new(
        inner: P,
        subscriber: Arc<std::sync::RwLock<Option<Arc<dyn Fn(ActivityEvent) + Send + Sync>>>>,
    ) -> Self {
        Self { inner, subscriber }
    }
}

#[async_trait]
impl<P: PersistencePort> PersistencePort for ForwardingPersistence<P> {
    async fn create_conversation(&self) -> Result<String, PersistError> {
        self.inner.create_conversation().await
    }

    async fn get_active_conversation(&self) -> Result<Option<String>, PersistError> {
        self.inner.get_active_conversation().await
    }

    async fn save_context(
        &self,
        member: &str,
        conversation: &str,
        record: ContextRecord,
    ) -> Result<(), PersistError> {
        self.inner.save_context(member, conversation, record).await
    }

    async fn load_context(
        &self,
        member: &str,
        conversation: &str,
        limit: usize,
    ) -> Result<Vec<ContextRecord>, PersistError> {
        self.inner.load_context(member, conversation, limit).await
    }

    async fn on_activity(&self, event: ActivityEvent) {
        self.inner.on_activity(event.clone()).await;
        let callback = self.subscriber.read().expect("subscriber lock poisoned").clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }
}
