//! [`Manager`]: process-wide team registry, restore-on-startup, and the
//! `Ask`/`AskMember` entry points external callers use (§4.3).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use ugudu_persist::{ActivityEvent, ForwardingPersistence, ScopedPersistence, Store, TeamStatus};
use ugudu_team::{ClientMessage, Team};

use crate::config::ManagerConfig;
use crate::error::ManagerError;

type ActivitySubscriber = Arc<std::sync::RwLock<Option<Arc<dyn Fn(ActivityEvent) + Send + Sync>>>>;

/// A read-only summary of one team, as returned by [`Manager::status`]
/// (§4.3 "ambient `Manager::status()`").
#[derive(Debug, Clone)]
pub struct TeamSnapshot {
    /// The team's instance name.
    pub name: String,
    /// Whether the team has been started.
    pub status: TeamStatus,
    /// Number of live members.
    pub member_count: usize,
    /// The team's active conversation id, if started.
    pub active_conversation_id: Option<String>,
}

/// Process-wide owner of every running team: constructs teams from spec
/// files, restores previously-running teams at startup, and wires every
/// team's persistence port back onto a shared [`Store`] plus a single
/// swappable activity subscriber (§4.3 "persistence callbacks").
///
/// Generic over the concrete [`Store`] backend (`ugudu-persist-memory`'s
/// `MemoryPersistence`, `ugudu-persist-sqlite`'s `SqlitePersistence`, or
/// any other implementor) — [`ScopedPersistence`] requires a sized store,
/// so the manager holds one directly rather than behind `dyn Store`.
pub struct Manager<S> {
    store: Arc<S>,
    teams: RwLock<HashMap<String, Arc<Team>>>,
    config: ManagerConfig,
    subscriber: ActivitySubscriber,
    cancellation: CancellationToken,
}

impl<S: Store + 'static> Manager<S> {
    /// Build a manager over `store`, with no teams yet registered.
    #[must_use]
    pub fn new(store: Arc<S>, config: ManagerConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            teams: RwLock::new(HashMap::new()),
            config,
            subscriber: Arc::new(std::sync::RwLock::new(None)),
            cancellation: CancellationToken::new(),
        })
    }

    /// This manager's cancellation token; every team it constructs is a
    /// child of it (§5).
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Replace the manager-wide activity subscriber. Every team's
    /// persistence port forwards `OnActivity` events to whatever
    /// subscriber is currently installed, read fresh on each event.
    pub fn set_activity_sink(&self, callback: Arc<dyn Fn(ActivityEvent) + Send + Sync>) {
        *self.subscriber.write().expect("subscriber lock poisoned") = Some(callback);
    }

    /// Load a spec from `spec_path`, optionally overriding its declared
    /// name with `instance_name`, construct its team, register it with
    /// the store, and hold it (not started) under its instance name.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::AlreadyExists`] if the resolved name is
    /// already registered, [`ManagerError::Spec`] if the spec fails to
    /// load, or [`ManagerError::Team`] if team construction fails (e.g.
    /// an unregistered provider).
    pub async fn create_team(
        &self,
        spec_path: impl AsRef<str>,
        instance_name: Option<&str>,
    ) -> Result<Arc<Team>, ManagerError> {
        let spec_path = spec_path.as_ref();
        let text = std::fs::read_to_string(spec_path)
            .map_err(|source| ManagerError::SpecIo { path: spec_path.to_string(), source })?;
        let spec = ugudu_spec::load_str_named(&text, instance_name)?;

        {
            let teams = self.teams.read().await;
            if teams.contains_key(&spec.name) {
                return Err(ManagerError::AlreadyExists(spec.name));
            }
        }

        let team = self.build_team(spec)?;
        self.store.register_team(team.name(), spec_path).await?;
        self.store.set_team_status(team.name(), TeamStatus::Stopped).await?;
        self.teams.write().await.insert(team.name().to_string(), Arc::clone(&team));
        Ok(team)
    }

    fn build_team(&self, spec: ugudu_spec::TeamSpec) -> Result<Arc<Team>, ManagerError> {
        let persistence = ForwardingPersistence::new(
            ScopedPersistence::new(Arc::clone(&self.store), spec.name.clone()),
            Arc::clone(&self.subscriber),
        );
        let team = Team::new(
            spec,
            self.config.providers.clone(),
            self.config.tools.clone(),
            Arc::new(persistence),
            self.config.team.clone(),
            self.cancellation.clone(),
        )?;
        Ok(team)
    }

    /// Start a previously-created (or restored) team.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::UnknownTeam`] if no team is registered
    /// under `name`, or propagates [`ugudu_team::TeamError`] from
    /// [`Team::start`].
    pub async fn start_team(&self, name: &str) -> Result<(), ManagerError> {
        let team = self.get_team(name).await.ok_or_else(|| ManagerError::UnknownTeam(name.to_string()))?;
        team.start().await?;
        self.store.set_team_status(name, TeamStatus::Running).await?;
        Ok(())
    }

    /// Cancel a team's context, stopping every member and in-flight
    /// delegation, and record it as stopped.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::UnknownTeam`] if no team is registered
    /// under `name`.
    pub async fn stop_team(&self, name: &str) -> Result<(), ManagerError> {
        let team = self.get_team(name).await.ok_or_else(|| ManagerError::UnknownTeam(name.to_string()))?;
        team.stop();
        self.store.set_team_status(name, TeamStatus::Stopped).await?;
        Ok(())
    }

    /// Stop (if live) and forget a team, and remove its registration from
    /// the store. Does not delete its conversations or context.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::UnknownTeam`] if no team is registered
    /// under `name`.
    pub async fn delete_team(&self, name: &str) -> Result<(), ManagerError> {
        let team = self.teams.write().await.remove(name).ok_or_else(|| ManagerError::UnknownTeam(name.to_string()))?;
        team.stop();
        self.store.delete_team(name).await?;
        Ok(())
    }

    /// The live team registered under `name`, if any.
    pub async fn get_team(&self, name: &str) -> Option<Arc<Team>> {
        self.teams.read().await.get(name).cloned()
    }

    /// Every live team, in no particular order.
    pub async fn list_teams(&self) -> Vec<Arc<Team>> {
        self.teams.read().await.values().cloned().collect()
    }

    /// A read-only snapshot of one team (§4.3 "ambient `Manager::status()`").
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::UnknownTeam`] if no team is registered
    /// under `name`.
    pub async fn status(&self, name: &str) -> Result<TeamSnapshot, ManagerError> {
        let team = self.get_team(name).await.ok_or_else(|| ManagerError::UnknownTeam(name.to_string()))?;
        let status = if team.is_started() { TeamStatus::Running } else { TeamStatus::Stopped };
        Ok(TeamSnapshot {
            name: team.name().to_string(),
            status,
            member_count: team.member_count(),
            active_conversation_id: team.active_conversation().await,
        })
    }

    /// Forward a client request to `name`'s team and return its
    /// aggregated response channel.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::UnknownTeam`] if no team is registered
    /// under `name`.
    pub async fn ask(&self, name: &str, content: impl Into<String>) -> Result<mpsc::Receiver<ClientMessage>, ManagerError> {
        let team = self.get_team(name).await.ok_or_else(|| ManagerError::UnknownTeam(name.to_string()))?;
        Ok(team.ask(content).await)
    }

    /// Forward a client request to a specific role within `name`'s team
    /// and return its single response, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::UnknownTeam`] if no team is registered
    /// under `name`.
    pub async fn ask_member(
        &self,
        name: &str,
        role: &str,
        content: impl Into<String>,
    ) -> Result<Option<ClientMessage>, ManagerError> {
        let team = self.get_team(name).await.ok_or_else(|| ManagerError::UnknownTeam(name.to_string()))?;
        Ok(team.ask_member(role, content).await)
    }

    /// Enumerate persisted team records and reconstruct each one: load
    /// its spec from the recorded path (overriding the declared name with
    /// the stored instance name), rebuild its team with persistence
    /// callbacks wired, and — if its recorded status was `running` —
    /// start it asynchronously after [`ManagerConfig::restore_delay`]
    /// (§4.3 "Restore on startup"). A failure on any one team is logged
    /// and skipped; it never aborts the rest of the restore.
    pub async fn restore_teams(self: &Arc<Self>) {
        let records = match self.store.list_teams().await {
            Ok(records) => records,
            Err(err) => {
                warn!(%err, "restore_teams: failed to list persisted teams");
                return;
            }
        };

        for record in records {
            if let Err(err) = self.restore_one(&record).await {
                warn!(team = %record.name, %err, "restore_teams: failed to restore team, skipping");
            }
        }
    }

    async fn restore_one(self: &Arc<Self>, record: &ugudu_persist::TeamRecord) -> Result<(), ManagerError> {
        let text = std::fs::read_to_string(&record.spec_path)
            .map_err(|source| ManagerError::SpecIo { path: record.spec_path.clone(), source })?;
        let spec = ugudu_spec::load_str_named(&text, Some(&record.name))?;
        let team = self.build_team(spec)?;
        self.teams.write().await.insert(record.name.clone(), Arc::clone(&team));
        info!(team = %record.name, "restored team registration");

        if record.status == TeamStatus::Running {
            let manager = Arc::clone(self);
            let name = record.name.clone();
            let delay = self.config.restore_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(err) = manager.start_team(&name).await {
                    warn!(team = %name, %err, "restore_teams: failed to auto-start restored team");
                }
            });
        }
        Ok(())
    }
}
