#![deny(missing_docs)]
//! In-memory [`Store`] implementation for `ugudu-persist`.
//!
//! `HashMap`-backed, process-lifetime only. Used as the default for
//! ephemeral teams and throughout the kernel's test suites. Mirrors
//! `ugudu-state-memory`'s single `RwLock<HashMap<_>>` shape.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use ugudu_persist::{
    ContextRecord, ConversationRecord, ConversationStatus, PersistError, Store, TeamRecord,
    TeamStatus,
};

#[derive(Default)]
struct Inner {
    teams: HashMap<String, TeamRecord>,
    /// Team name -> id of its currently active conversation.
    active_conversation: HashMap<String, String>,
    conversations: HashMap<String, ConversationRecord>,
    /// `(team, member, conversation)` -> turns in ascending sequence order.
    contexts: HashMap<(String, String, String), Vec<ContextRecord>>,
}

/// In-memory persistence backend. Cheap to construct, safe to share via
/// `Arc`, and gone the moment the process exits.
#[derive(Default)]
pub struct MemoryPersistence {
    inner: RwLock<Inner>,
}

impl MemoryPersistence {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryPersistence {
    async fn register_team(&self, name: &str, spec_path: &str) -> Result<(), PersistError> {
        let mut inner = self.inner.write().await;
        inner
            .teams
            .entry(name.to_string())
            .and_modify(|r| r.spec_path = spec_path.to_string())
            .or_insert_with(|| TeamRecord {
                name: name.to_string(),
                spec_path: spec_path.to_string(),
                status: TeamStatus::Stopped,
            });
        Ok(())
    }

    async fn set_team_status(&self, name: &str, status: TeamStatus) -> Result<(), PersistError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .teams
            .get_mut(name)
            .ok_or_else(|| PersistError::TeamNotFound(name.to_string()))?;
        record.status = status;
        Ok(())
    }

    async fn list_teams(&self) -> Result<Vec<TeamRecord>, PersistError> {
        let inner = self.inner.read().await;
        let mut teams: Vec<TeamRecord> = inner.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }

    async fn delete_team(&self, name: &str) -> Result<(), PersistError> {
        let mut inner = self.inner.write().await;
        inner.teams.remove(name);
        Ok(())
    }

    async fn create_conversation(&self, team: &str) -> Result<String, PersistError> {
        let mut inner = self.inner.write().await;
        if let Some(previous) = inner.active_conversation.get(team).cloned() {
            if let Some(record) = inner.conversations.get_mut(&previous) {
                record.status = ConversationStatus::Closed;
            }
        }
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        inner.conversations.insert(
            id.clone(),
            ConversationRecord {
                id: id.clone(),
                team: team.to_string(),
                started_at: now,
                last_activity: now,
                status: ConversationStatus::Active,
            },
        );
        inner.active_conversation.insert(team.to_string(), id.clone());
        Ok(id)
    }

    async fn get_active_conversation(&self, team: &str) -> Result<Option<String>, PersistError> {
        let inner = self.inner.read().await;
        Ok(inner.active_conversation.get(team).cloned())
    }

    async fn save_context(
        &self,
        team: &str,
        member: &str,
        conversation: &str,
        record: &ContextRecord,
    ) -> Result<(), PersistError> {
        let mut inner = self.inner.write().await;
        if let Some(conv) = inner.conversations.get_mut(conversation) {
            conv.last_activity = Utc::now();
        }
        let key = (team.to_string(), member.to_string(), conversation.to_string());
        inner.contexts.entry(key).or_default().push(record.clone());
        Ok(())
    }

    async fn load_context(
        &self,
        team: &str,
        member: &str,
        conversation: &str,
        limit: usize,
    ) -> Result<Vec<ContextRecord>, PersistError> {
        let inner = self.inner.read().await;
        let key = (team.to_string(), member.to_string(), conversation.to_string());
        let turns = inner.contexts.get(&key).cloned().unwrap_or_default();
        let start = turns.len().saturating_sub(limit);
        Ok(turns[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ugudu_persist::ContextRole;

    #[tokio::test]
    async fn create_conversation_closes_previous() {
        let store = MemoryPersistence::new();
        let first = store.create_conversation("acme").await.unwrap();
        let second = store.create_conversation("acme").await.unwrap();
        assert_ne!(first, second);
        assert_eq!(store.get_active_conversation("acme").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn save_and_load_round_trips_in_order() {
        let store = MemoryPersistence::new();
        let conv = store.create_conversation("acme").await.unwrap();
        for i in 1..=3u64 {
            store
                .save_context("acme", "pm", &conv, &ContextRecord::plain(ContextRole::User, format!("turn {i}"), i))
                .await
                .unwrap();
        }
        let loaded = store.load_context("acme", "pm", &conv, 10).await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].sequence, 1);
        assert_eq!(loaded[2].content, "turn 3");
    }

    #[tokio::test]
    async fn load_context_respects_limit() {
        let store = MemoryPersistence::new();
        let conv = store.create_conversation("acme").await.unwrap();
        for i in 1..=5u64 {
            store
                .save_context("acme", "pm", &conv, &ContextRecord::plain(ContextRole::User, "x", i))
                .await
                .unwrap();
        }
        let loaded = store.load_context("acme", "pm", &conv, 2).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].sequence, 4);
        assert_eq!(loaded[1].sequence, 5);
    }

    #[tokio::test]
    async fn team_registry_round_trips() {
        let store = MemoryPersistence::new();
        store.register_team("acme", "/specs/acme.yaml").await.unwrap();
        store.set_team_status("acme", TeamStatus::Running).await.unwrap();
        let teams = store.list_teams().await.unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].status, TeamStatus::Running);
        store.delete_team("acme").await.unwrap();
        assert!(store.list_teams().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_team_status_update_errors() {
        let store = MemoryPersistence::new();
        let err = store.set_team_status("ghost", TeamStatus::Running).await.unwrap_err();
        assert!(matches!(err, PersistError::TeamNotFound(_)));
    }
}
