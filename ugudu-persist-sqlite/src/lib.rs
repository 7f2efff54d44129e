#![deny(missing_docs)]
//! SQLite-backed [`Store`] implementation for `ugudu-persist` (§6 informative
//! storage layout): `teams`, `conversations`, and `agent_context` tables,
//! giving the kernel real cross-restart durability.
//!
//! Uses bundled SQLite via `rusqlite`. The connection is guarded by a
//! plain `std::sync::Mutex` rather than an async lock: every query here
//! is a short, synchronous operation with no `.await` inside the critical
//! section, so there's no suspension point to hold the lock across.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use ugudu_persist::{
    ContextRecord, ContextRole, PersistError, Store, StoredToolCall, TeamRecord, TeamStatus,
};

/// SQLite-backed persistence store.
pub struct SqlitePersistence {
    conn: Mutex<Connection>,
}

impl SqlitePersistence {
    /// Open (creating if absent) a SQLite database at `path` and ensure
    /// the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Backend`] if the file can't be opened or
    /// the schema can't be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let conn = Connection::open(path).map_err(|e| PersistError::Backend(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// Open a private, in-memory database — convenient for tests.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Backend`] if the schema can't be created.
    pub fn open_in_memory() -> Result<Self, PersistError> {
        let conn = Connection::open_in_memory().map_err(|e| PersistError::Backend(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, PersistError> {
        conn.execute_batch(SCHEMA).map_err(|e| PersistError::Backend(e.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS teams (
    name TEXT PRIMARY KEY,
    spec_path TEXT NOT NULL,
    status TEXT NOT NULL,
    ts TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    team TEXT NOT NULL,
    started_at TEXT NOT NULL,
    last_activity TEXT NOT NULL,
    status TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_conversations_team ON conversations(team);
CREATE TABLE IF NOT EXISTS agent_context (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    team TEXT NOT NULL,
    member TEXT NOT NULL,
    conversation TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    tool_call_id TEXT,
    tool_calls TEXT NOT NULL,
    sequence INTEGER NOT NULL,
    ts TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_agent_context_team_member ON agent_context(team, member);
CREATE INDEX IF NOT EXISTS idx_agent_context_conversation ON agent_context(conversation);
";

fn role_to_str(role: ContextRole) -> &'static str {
    match role {
        ContextRole::System => "system",
        ContextRole::User => "user",
        ContextRole::Assistant => "assistant",
        ContextRole::Tool => "tool",
    }
}

fn role_from_str(s: &str) -> Result<ContextRole, PersistError> {
    match s {
        "system" => Ok(ContextRole::System),
        "user" => Ok(ContextRole::User),
        "assistant" => Ok(ContextRole::Assistant),
        "tool" => Ok(ContextRole::Tool),
        other => Err(PersistError::Backend(format!("unknown stored role {other:?}"))),
    }
}

fn status_to_str(status: TeamStatus) -> &'static str {
    match status {
        TeamStatus::Running => "running",
        TeamStatus::Stopped => "stopped",
    }
}

fn status_from_str(s: &str) -> TeamStatus {
    match s {
        "running" => TeamStatus::Running,
        _ => TeamStatus::Stopped,
    }
}

#[async_trait]
impl Store for SqlitePersistence {
    async fn register_team(&self, name: &str, spec_path: &str) -> Result<(), PersistError> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        conn.execute(
            "INSERT INTO teams (name, spec_path, status, ts) VALUES (?1, ?2, 'stopped', ?3)
             ON CONFLICT(name) DO UPDATE SET spec_path = excluded.spec_path",
            params![name, spec_path, Utc::now().to_rfc3339()],
        )
        .map_err(|e| PersistError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn set_team_status(&self, name: &str, status: TeamStatus) -> Result<(), PersistError> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let changed = conn
            .execute(
                "UPDATE teams SET status = ?1 WHERE name = ?2",
                params![status_to_str(status), name],
            )
            .map_err(|e| PersistError::Backend(e.to_string()))?;
        if changed == 0 {
            return Err(PersistError::TeamNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn list_teams(&self) -> Result<Vec<TeamRecord>, PersistError> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let mut stmt = conn
            .prepare("SELECT name, spec_path, status FROM teams ORDER BY name")
            .map_err(|e| PersistError::Backend(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let spec_path: String = row.get(1)?;
                let status: String = row.get(2)?;
                Ok(TeamRecord { name, spec_path, status: status_from_str(&status) })
            })
            .map_err(|e| PersistError::Backend(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| PersistError::Backend(e.to_string()))
    }

    async fn delete_team(&self, name: &str) -> Result<(), PersistError> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        conn.execute("DELETE FROM teams WHERE name = ?1", params![name])
            .map_err(|e| PersistError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn create_conversation(&self, team: &str) -> Result<String, PersistError> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE conversations SET status = 'closed' WHERE team = ?1 AND status = 'active'",
            params![team],
        )
        .map_err(|e| PersistError::Backend(e.to_string()))?;
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO conversations (id, team, started_at, last_activity, status)
             VALUES (?1, ?2, ?3, ?3, 'active')",
            params![id, team, now],
        )
        .map_err(|e| PersistError::Backend(e.to_string()))?;
        Ok(id)
    }

    async fn get_active_conversation(&self, team: &str) -> Result<Option<String>, PersistError> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        conn.query_row(
            "SELECT id FROM conversations WHERE team = ?1 AND status = 'active'
             ORDER BY last_activity DESC LIMIT 1",
            params![team],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| PersistError::Backend(e.to_string()))
    }

    async fn save_context(
        &self,
        team: &str,
        member: &str,
        conversation: &str,
        record: &ContextRecord,
    ) -> Result<(), PersistError> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let now = Utc::now().to_rfc3339();
        let tool_calls_json = serde_json::to_string(&record.tool_calls)
            .map_err(|e| PersistError::Serialization(e.to_string()))?;
        conn.execute(
            "INSERT INTO agent_context
                (team, member, conversation, role, content, tool_call_id, tool_calls, sequence, ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                team,
                member,
                conversation,
                role_to_str(record.role),
                record.content,
                record.tool_call_id,
                tool_calls_json,
                record.sequence as i64,
                now,
            ],
        )
        .map_err(|e| PersistError::Backend(e.to_string()))?;
        conn.execute(
            "UPDATE conversations SET last_activity = ?1 WHERE id = ?2",
            params![now, conversation],
        )
        .map_err(|e| PersistError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn load_context(
        &self,
        team: &str,
        member: &str,
        conversation: &str,
        limit: usize,
    ) -> Result<Vec<ContextRecord>, PersistError> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT role, content, tool_call_id, tool_calls, sequence FROM agent_context
                 WHERE team = ?1 AND member = ?2 AND conversation = ?3
                 ORDER BY sequence DESC LIMIT ?4",
            )
            .map_err(|e| PersistError::Backend(e.to_string()))?;
        let rows = stmt
            .query_map(params![team, member, conversation, limit as i64], |row| {
                let role: String = row.get(0)?;
                let content: String = row.get(1)?;
                let tool_call_id: Option<String> = row.get(2)?;
                let tool_calls_json: String = row.get(3)?;
                let sequence: i64 = row.get(4)?;
                Ok((role, content, tool_call_id, tool_calls_json, sequence))
            })
            .map_err(|e| PersistError::Backend(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let (role, content, tool_call_id, tool_calls_json, sequence) =
                row.map_err(|e| PersistError::Backend(e.to_string()))?;
            let tool_calls: Vec<StoredToolCall> = serde_json::from_str(&tool_calls_json)
                .map_err(|e| PersistError::Serialization(e.to_string()))?;
            records.push(ContextRecord {
                role: role_from_str(&role)?,
                content,
                tool_call_id,
                tool_calls,
                sequence: sequence as u64,
            });
        }
        records.reverse(); // DESC query, ascending for callers
        Ok(records)
    }
}

#[allow(dead_code)]
fn assert_send_sync<T: Send + Sync>() {}

#[cfg(test)]
mod tests {
    use super::*;
    use ugudu_persist::ContextRole;

    #[test]
    fn is_send_sync() {
        assert_send_sync::<SqlitePersistence>();
    }

    #[tokio::test]
    async fn round_trips_context_in_sequence_order() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        let conv = store.create_conversation("acme").await.unwrap();
        for i in 1..=3u64 {
            store
                .save_context(
                    "acme",
                    "pm",
                    &conv,
                    &ContextRecord::plain(ContextRole::User, format!("turn {i}"), i),
                )
                .await
                .unwrap();
        }
        let loaded = store.load_context("acme", "pm", &conv, 10).await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].sequence, 1);
        assert_eq!(loaded[2].content, "turn 3");
    }

    #[tokio::test]
    async fn load_context_limit_keeps_most_recent() {
        let store = SqlitePersistence::open_in_memory().unwrap();
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
    async fn creating_a_new_conversation_closes_the_old_one() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        let first = store.create_conversation("acme").await.unwrap();
        let second = store.create_conversation("acme").await.unwrap();
        assert_ne!(first, second);
        assert_eq!(store.get_active_conversation("acme").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn survives_reopen_at_the_same_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("team.db");
        let conv = {
            let store = SqlitePersistence::open(&path).unwrap();
            let conv = store.create_conversation("acme").await.unwrap();
            store
                .save_context("acme", "pm", &conv, &ContextRecord::plain(ContextRole::User, "hi", 1))
                .await
                .unwrap();
            conv
        };
        let store = SqlitePersistence::open(&path).unwrap();
        let loaded = store.load_context("acme", "pm", &conv, 10).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].content, "hi");
    }

    #[tokio::test]
    async fn team_registry_round_trips() {
        let store = SqlitePersistence::open_in_memory().unwrap();
        store.register_team("acme", "/specs/acme.yaml").await.unwrap();
        store.set_team_status("acme", TeamStatus::Running).await.unwrap();
        let teams = store.list_teams().await.unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].status, TeamStatus::Running);
    }
}
