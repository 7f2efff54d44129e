//! [`Team`]: member construction, the internal bus, client-response
//! aggregation, and conversation lifecycle (§4.2).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use ugudu_member::{DynProvider, Envelope, Member, MessageType, Task, TaskOutcome, TaskStatus, TeamLink};
use ugudu_persist::PersistencePort;
use ugudu_spec::{TeamSpec, TokenMode, Visibility};
use ugudu_tool::{SandboxedView, ToolRegistry};

use crate::client::ClientMessage;
use crate::config::TeamConfig;
use crate::error::TeamError;
use crate::link::TeamHandle;

struct TaskEntry {
    task: Task,
    responder: Option<oneshot::Sender<TaskOutcome>>,
}

/// The set of members for one [`ugudu_spec::TeamSpec`], the internal bus
/// that routes between them and the client, and the conversation
/// lifecycle that ties them to persistence.
///
/// Constructed via [`Team::new`], which returns an `Arc<Team>` — every
/// member holds a non-owning [`TeamHandle`] back to it (§9 "Cyclic
/// ownership"), so the team must already live behind an `Arc` before any
/// member can be built.
pub struct Team {
    spec: TeamSpec,
    members: HashMap<String, Arc<Member>>,
    role_members: HashMap<String, Vec<String>>,
    member_order: Vec<String>,
    client_facing: Vec<String>,
    persistence: Arc<dyn PersistencePort>,
    config: TeamConfig,
    cancellation: CancellationToken,
    conversation_id: Mutex<Option<String>>,
    tasks: Mutex<HashMap<String, TaskEntry>>,
    internal_tx: mpsc::Sender<Envelope>,
    internal_rx: Mutex<Option<mpsc::Receiver<Envelope>>>,
    client_tx: mpsc::Sender<Envelope>,
    client_rx: Mutex<mpsc::Receiver<Envelope>>,
    started: AtomicBool,
}

impl Team {
    /// Construct a team from a validated spec: build one member per
    /// `(role, instance)` (§4.2 "Construction"), wiring each one's
    /// provider, sandboxed tool view, and non-owning team handle. Spawns
    /// no tasks until [`Team::start`].
    ///
    /// `parent_cancel` is the enclosing context (the manager's, or the
    /// process's) this team's own cancellation token is derived from
    /// (§5): cancelling it cancels every team built from it.
    ///
    /// # Errors
    ///
    /// Returns [`TeamError::NoRoles`] if the spec declares no roles, or
    /// [`TeamError::UnregisteredProvider`] if a role names a provider not
    /// present in `providers`.
    pub fn new(
        spec: TeamSpec,
        providers: HashMap<String, Arc<dyn DynProvider>>,
        tools: Option<Arc<ToolRegistry>>,
        persistence: Arc<dyn PersistencePort>,
        config: TeamConfig,
        parent_cancel: CancellationToken,
    ) -> Result<Arc<Self>, TeamError> {
        if spec.roles.is_empty() {
            return Err(TeamError::NoRoles);
        }
        for role in spec.roles.values() {
            if !providers.contains_key(&role.model.provider) {
                return Err(TeamError::UnregisteredProvider(role.model.provider.clone()));
            }
        }

        let mut role_members: HashMap<String, Vec<String>> = HashMap::new();
        let mut member_order = Vec::new();
        let mut planned = Vec::new();
        for role in spec.roles_sorted() {
            let count = role.count.max(1);
            let mut ids = Vec::with_capacity(count);
            for i in 0..count {
                let id = if count == 1 { role.name.clone() } else { format!("{}-{}", role.name, short_hex()) };
                let display_name = if count == 1 {
                    role.display_name.clone().unwrap_or_else(|| role.title.clone())
                } else {
                    role.display_names.get(i).cloned().unwrap_or_else(|| role.title.clone())
                };
                member_order.push(id.clone());
                ids.push(id.clone());
                planned.push((id, display_name, role.clone()));
            }
            role_members.insert(role.name.clone(), ids);
        }

        let client_facing = if spec.client_facing.is_empty() {
            spec.roles.values().filter(|r| r.visibility == Visibility::Client).map(|r| r.name.clone()).collect()
        } else {
            spec.client_facing.clone()
        };

        let (internal_tx, internal_rx) = mpsc::channel(config.internal_capacity);
        let (client_tx, client_rx) = mpsc::channel(config.client_capacity);
        let cancellation = parent_cancel.child_token();
        let team_name = spec.name.clone();
        let member_config = config.member.clone();
        let token_settings = spec.token_settings.clone();

        let team = Arc::new_cyclic(move |weak| {
            let mut members = HashMap::with_capacity(planned.len());
            for (id, display_name, role) in planned {
                let provider = Arc::clone(&providers[&role.model.provider]);
                let tool_view = tools
                    .as_ref()
                    .map(|registry| SandboxedView::for_role_with_tools(Arc::clone(registry), &role.title, &role.tools));
                let link: Arc<dyn TeamLink> = Arc::new(TeamHandle { inner: weak.clone() });
                let member = Member::new(
                    id.clone(),
                    display_name,
                    team_name.clone(),
                    role,
                    provider,
                    tool_view,
                    Arc::clone(&persistence),
                    link,
                    token_settings.clone(),
                    member_config.clone(),
                );
                members.insert(id, member);
            }

            Team {
                spec,
                members,
                role_members,
                member_order,
                client_facing,
                persistence,
                config,
                cancellation,
                conversation_id: Mutex::new(None),
                tasks: Mutex::new(HashMap::new()),
                internal_tx,
                internal_rx: Mutex::new(Some(internal_rx)),
                client_tx,
                client_rx: Mutex::new(client_rx),
                started: AtomicBool::new(false),
            }
        });

        Ok(team)
    }

    /// The team's declarative name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// The spec this team was constructed from.
    #[must_use]
    pub fn spec(&self) -> &TeamSpec {
        &self.spec
    }

    /// Role names whose members may respond directly to the client.
    #[must_use]
    pub fn client_facing(&self) -> &[String] {
        &self.client_facing
    }

    /// Number of live members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// A member by id.
    #[must_use]
    pub fn member(&self, id: &str) -> Option<&Arc<Member>> {
        self.members.get(id)
    }

    /// Every member, in construction order.
    pub fn members(&self) -> impl Iterator<Item = &Arc<Member>> {
        self.member_order.iter().filter_map(|id| self.members.get(id))
    }

    /// The id of the conversation this team is currently using, if
    /// started.
    pub async fn active_conversation(&self) -> Option<String> {
        self.conversation_id.lock().await.clone()
    }

    /// A snapshot of one task by id.
    pub async fn task(&self, id: &str) -> Option<Task> {
        self.tasks.lock().await.get(id).map(|entry| entry.task.clone())
    }

    /// A snapshot of every task registered with this team.
    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().await.values().map(|entry| entry.task.clone()).collect()
    }

    /// This team's cancellation token (a child of whatever token it was
    /// constructed under).
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Whether [`Team::start`] has been called on this team.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Restore each member's conversation context and spawn the internal
    /// router and every member's event loop (§4.2 "Start").
    ///
    /// Order is fixed: persisted context is restored before the router
    /// (and thus any inbound message) starts, so no member ever processes
    /// a message against a stale or empty context.
    ///
    /// # Errors
    ///
    /// Returns [`TeamError::AlreadyStarted`] if called twice, or
    /// propagates a persistence failure while obtaining the active
    /// conversation.
    pub async fn start(self: &Arc<Self>) -> Result<(), TeamError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(TeamError::AlreadyStarted);
        }

        let conversation_id = match self.persistence.get_active_conversation().await? {
            Some(id) => id,
            None => self.persistence.create_conversation().await?,
        };
        *self.conversation_id.lock().await = Some(conversation_id.clone());

        let window = self.history_window();
        for member in self.members.values() {
            match self.persistence.load_context(member.id(), &conversation_id, window).await {
                Ok(history) => member.restore_context(history).await,
                Err(err) => warn!(team = %self.spec.name, member = %member.id(), %err, "failed to load context on start"),
            }
        }

        self.spawn_router();

        for member in self.members.values() {
            member.start(conversation_id.clone()).await?;
        }
        Ok(())
    }

    /// Cancel this team's context (propagates to every member, provider
    /// call, and parked delegation) and request every member to stop.
    /// Idempotent.
    pub fn stop(&self) {
        self.cancellation.cancel();
        for member in self.members.values() {
            member.stop();
        }
    }

    /// Dispatch `content` as a client request to the first member of the
    /// first client-facing role (falling back to an arbitrary member),
    /// and return a channel that receives every client-bound message the
    /// team produces in response, until idle timeout, hard deadline, or
    /// cancellation (§4.2 "Ask aggregation").
    pub async fn ask(self: &Arc<Self>, content: impl Into<String>) -> mpsc::Receiver<ClientMessage> {
        let (out_tx, out_rx) = mpsc::channel(self.config.client_capacity);
        let target = self.default_client_target();
        self.bus_send(Envelope::new(MessageType::ClientRequest, "client", target, content)).await;

        let team = Arc::clone(self);
        tokio::spawn(async move { team.run_aggregator(out_tx).await });
        out_rx
    }

    /// Dispatch `content` to the resolved member of `role` and return
    /// exactly one client-bound message (or `None` on timeout/no
    /// response), without spawning a persistent aggregator
    /// (§4.2 "AskMember").
    pub async fn ask_member(self: &Arc<Self>, role: &str, content: impl Into<String>) -> Option<ClientMessage> {
        let target = self.resolve_role_impl(role).await?;
        self.bus_send(Envelope::new(MessageType::ClientRequest, "client", target, content)).await;

        let mut rx = self.client_rx.lock().await;
        match tokio::time::timeout(self.config.hard_deadline, rx.recv()).await {
            Ok(Some(envelope)) => Some(ClientMessage { from: envelope.from, content: envelope.content }),
            _ => None,
        }
    }

    fn default_client_target(&self) -> String {
        for role in &self.client_facing {
            if let Some(ids) = self.role_members.get(role) {
                if let Some(id) = ids.first() {
                    return id.clone();
                }
            }
        }
        self.member_order.first().cloned().unwrap_or_default()
    }

    fn history_window(&self) -> usize {
        self.spec.token_settings.context_history.unwrap_or(match self.spec.token_settings.mode {
            TokenMode::Normal => 40,
            TokenMode::Low => 10,
            TokenMode::Minimal => 5,
        })
    }

    /// Drains the internal bus (§4.2 "Internal router"): a single task
    /// reads every envelope and either offers it to the client channel
    /// or to the recipient member's inbox, dropping (with a warning) on
    /// either an unreachable recipient or a full channel.
    fn spawn_router(self: &Arc<Self>) {
        let team = Arc::clone(self);
        tokio::spawn(async move {
            let mut rx = team.internal_rx.lock().await.take().expect("router started twice");
            loop {
                tokio::select! {
                    () = team.cancellation.cancelled() => break,
                    maybe = rx.recv() => match maybe {
                        Some(envelope) => team.route(envelope).await,
                        None => break,
                    },
                }
            }
        });
    }

    async fn route(&self, envelope: Envelope) {
        if envelope.to == Envelope::CLIENT {
            if self.client_tx.try_send(envelope).is_err() {
                warn!(team = %self.spec.name, "client channel full, dropping message");
            }
        } else if let Some(member) = self.members.get(&envelope.to) {
            member.send(envelope).await;
        } else {
            warn!(team = %self.spec.name, to = %envelope.to, "no member for envelope recipient");
        }
    }

    async fn run_aggregator(&self, out: mpsc::Sender<ClientMessage>) {
        let mut rx = self.client_rx.lock().await;
        let deadline = tokio::time::Instant::now() + self.config.hard_deadline;
        loop {
            tokio::select! {
                () = self.cancellation.cancelled() => return,
                () = tokio::time::sleep_until(deadline) => {
                    warn!(team = %self.spec.name, "ask aggregator hit hard deadline");
                    return;
                }
                received = tokio::time::timeout(self.config.idle_timeout, rx.recv()) => {
                    match received {
                        Ok(Some(envelope)) => {
                            let message = ClientMessage { from: envelope.from, content: envelope.content };
                            if out.send(message).await.is_err() {
                                return;
                            }
                        }
                        Ok(None) => return,
                        Err(_elapsed) => return,
                    }
                }
            }
        }
    }

    pub(crate) async fn resolve_role_impl(&self, role: &str) -> Option<String> {
        let ids = self.role_members.get(role)?;
        if ids.is_empty() {
            return None;
        }
        for id in ids {
            if let Some(member) = self.members.get(id) {
                if member.status().await == ugudu_member::MemberStatus::Idle {
                    return Some(id.clone());
                }
            }
        }
        ids.first().cloned()
    }

    pub(crate) async fn bus_send(&self, envelope: Envelope) {
        if self.internal_tx.try_send(envelope).is_err() {
            warn!(team = %self.spec.name, "internal bus full, dropping message");
        }
    }

    pub(crate) async fn register_task_impl(&self, mut task: Task) -> oneshot::Receiver<TaskOutcome> {
        task.status = TaskStatus::Assigned;
        let (tx, rx) = oneshot::channel();
        self.tasks.lock().await.insert(task.id.clone(), TaskEntry { task, responder: Some(tx) });
        rx
    }

    pub(crate) async fn complete_task_impl(&self, task_id: &str, outcome: TaskOutcome) {
        let mut tasks = self.tasks.lock().await;
        let Some(entry) = tasks.get_mut(task_id) else {
            warn!(team = %self.spec.name, task_id, "complete_task: unknown task id");
            return;
        };
        entry.task.status = if outcome.is_failure() { TaskStatus::Failed } else { TaskStatus::Completed };
        entry.task.completed_at = Some(Utc::now());
        entry.task.result = Some(outcome.clone());
        if let Some(responder) = entry.responder.take() {
            let _ = responder.send(outcome);
        }
    }
}

fn short_hex() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
