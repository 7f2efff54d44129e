//! [`Member`]: the serial per-agent event loop (§4.1).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use ugudu_persist::{ActivityEvent, ActivityEventKind, ContextRecord, ContextRole, PersistencePort, StoredToolCall};
use ugudu_spec::{Role, TokenMode, TokenSettings};
use ugudu_tool::SandboxedView;
use ugudu_types::{
    CompletionRequest, ContentBlock, ContentItem, Message, Role as MessageRole, SystemPrompt, ToolContext, ToolOutput,
};

use crate::action::{TerminalAction, parse_terminal_action};
use crate::config::MemberConfig;
use crate::error::MemberError;
use crate::link::TeamLink;
use crate::message::{Envelope, MessageType};
use crate::prompt;
use crate::provider::DynProvider;
use crate::status::MemberStatus;
use crate::task::{Task, TaskOutcome};

const NORMAL_DEFAULT_MAX_TOKENS: usize = 4096;
const LOW_DEFAULT_MAX_TOKENS: usize = 1024;
const MINIMAL_DEFAULT_MAX_TOKENS: usize = 512;

struct StatusState {
    status: MemberStatus,
    current_task: Option<String>,
}

/// What a tool-call loop's terminal action should be applied to: a
/// direct client request, or a task assignment identified by task id.
#[derive(Debug, Clone)]
enum Origin {
    ClientRequest,
    Task(String),
}

/// What [`Member::delegate_one`] tells [`Member::drive_to_completion`] to
/// do next.
enum DelegateOutcome {
    /// A 1-to-1 delegation under a client request succeeded; append
    /// `feedback` as a user turn and re-enter the tool-call loop.
    Recurse(String),
    /// The delegation already produced a client response or task
    /// completion; nothing more to do.
    Terminal,
    /// The team was cancelled while waiting on the delegate's result;
    /// return without responding.
    Cancelled,
}

/// One role-playing agent: owns its inbox, conversation context, and
/// tool-call loop. Runs a single serial event loop — no two handlers on
/// the same member execute concurrently (§4.1).
pub struct Member {
    id: String,
    display_name: String,
    team_name: String,
    role: Role,
    provider: Arc<dyn DynProvider>,
    tools: Option<SandboxedView>,
    persistence: Arc<dyn PersistencePort>,
    team_link: Arc<dyn TeamLink>,
    token_settings: TokenSettings,
    config: MemberConfig,
    conversation_id: RwLock<Option<String>>,
    status: RwLock<StatusState>,
    context: RwLock<Vec<ContextRecord>>,
    sequence: AtomicU64,
    inbox_tx: mpsc::Sender<Envelope>,
    inbox_rx: Mutex<Option<mpsc::Receiver<Envelope>>>,
    stop_token: CancellationToken,
    started: AtomicBool,
}

impl Member {
    /// Construct a member. Spawns no tasks until [`Member::start`] is
    /// called.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        team_name: impl Into<String>,
        role: Role,
        provider: Arc<dyn DynProvider>,
        tools: Option<SandboxedView>,
        persistence: Arc<dyn PersistencePort>,
        team_link: Arc<dyn TeamLink>,
        token_settings: TokenSettings,
        config: MemberConfig,
    ) -> Arc<Self> {
        let (inbox_tx, inbox_rx) = mpsc::channel(config.inbox_capacity);
        Arc::new(Self {
            id: id.into(),
            display_name: display_name.into(),
            team_name: team_name.into(),
            role,
            provider,
            tools,
            persistence,
            team_link,
            token_settings,
            config,
            conversation_id: RwLock::new(None),
            status: RwLock::new(StatusState { status: MemberStatus::Idle, current_task: None }),
            context: RwLock::new(Vec::new()),
            sequence: AtomicU64::new(0),
            inbox_tx,
            inbox_rx: Mutex::new(Some(inbox_rx)),
            stop_token: CancellationToken::new(),
            started: AtomicBool::new(false),
        })
    }

    /// This member's id, unique within its team.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// This member's display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The role template this member was instantiated from.
    #[must_use]
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Current FSM status.
    pub async fn status(&self) -> MemberStatus {
        self.status.read().await.status
    }

    /// The task id currently being worked, if any.
    pub async fn current_task(&self) -> Option<String> {
        self.status.read().await.current_task.clone()
    }

    /// A snapshot of the in-memory conversation context.
    pub async fn context_snapshot(&self) -> Vec<ContextRecord> {
        self.context.read().await.clone()
    }

    /// The number of turns appended since the last clear/restore.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Spawn the event loop under `conversation_id`. Calling this twice
    /// on the same member is a programmer error.
    ///
    /// # Errors
    ///
    /// Returns [`MemberError::AlreadyStarted`] if already started.
    pub async fn start(self: &Arc<Self>, conversation_id: impl Into<String>) -> Result<(), MemberError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(MemberError::AlreadyStarted);
        }
        *self.conversation_id.write().await = Some(conversation_id.into());
        let member = Arc::clone(self);
        tokio::spawn(async move { member.run().await });
        Ok(())
    }

    /// Request loop exit. In-flight provider/tool calls run to their
    /// natural cancellation point via the team's cancellation token;
    /// this token only stops the inbox loop from accepting new work.
    /// Idempotent.
    pub fn stop(&self) {
        self.stop_token.cancel();
    }

    /// Offer a message to this member's inbox. Non-blocking: on
    /// overflow the message is dropped with a warning.
    pub async fn send(&self, envelope: Envelope) {
        if self.inbox_tx.try_send(envelope).is_err() {
            warn!(member = %self.id, "inbox full, dropping message");
            self.emit_activity(ActivityEventKind::Warning, "inbox overflow: message dropped".to_string()).await;
        }
    }

    /// Replace the in-memory context and set `sequence` to its length.
    pub async fn restore_context(&self, history: Vec<ContextRecord>) {
        let len = history.len() as u64;
        *self.context.write().await = history;
        self.sequence.store(len, Ordering::SeqCst);
    }

    /// Truncate the context and zero `sequence`.
    pub async fn clear_context(&self) {
        self.context.write().await.clear();
        self.sequence.store(0, Ordering::SeqCst);
    }

    async fn run(self: Arc<Self>) {
        let mut rx = self.inbox_rx.lock().await.take().expect("member started twice");
        let team_cancel = self.team_link.cancellation();
        loop {
            tokio::select! {
                () = team_cancel.cancelled() => break,
                () = self.stop_token.cancelled() => break,
                maybe = rx.recv() => {
                    match maybe {
                        Some(envelope) => self.handle(envelope).await,
                        None => break,
                    }
                }
            }
        }
    }

    async fn handle(self: &Arc<Self>, envelope: Envelope) {
        match envelope.kind {
            MessageType::ClientRequest => {
                self.set_status(MemberStatus::Working, None).await;
                self.handle_client_request(envelope.content).await;
                self.set_status(MemberStatus::Idle, None).await;
            }
            MessageType::TaskAssignment => {
                let task_id = envelope.task_id.clone().unwrap_or_default();
                self.set_status(MemberStatus::Working, Some(task_id.clone())).await;
                self.emit_activity(ActivityEventKind::TaskReceived, format!("received task {task_id}")).await;
                self.handle_task_assignment(task_id, envelope.content).await;
                self.set_status(MemberStatus::Idle, None).await;
            }
            MessageType::Question => {
                self.set_status(MemberStatus::Working, None).await;
                self.handle_question(envelope.from, envelope.content).await;
                self.set_status(MemberStatus::Idle, None).await;
            }
            MessageType::Answer | MessageType::Report => {
                tracing::debug!(member = %self.id, from = %envelope.from, kind = ?envelope.kind, "logged out-of-band message");
            }
            MessageType::ClientResponse | MessageType::TaskComplete => {
                tracing::debug!(member = %self.id, "envelope kind not meant for a member inbox");
            }
        }
    }

    async fn set_status(&self, status: MemberStatus, current_task: Option<String>) {
        {
            let mut guard = self.status.write().await;
            guard.status = status;
            guard.current_task = if status == MemberStatus::Working { current_task } else { None };
        }
        self.emit_activity(ActivityEventKind::StatusChange, format!("{status:?}")).await;
    }

    async fn emit_activity(&self, kind: ActivityEventKind, message: String) {
        self.persistence
            .on_activity(ActivityEvent { team: self.team_name.clone(), member: self.id.clone(), kind, message })
            .await;
    }

    async fn handle_client_request(self: &Arc<Self>, content: String) {
        self.append_turn(ContextRole::User, content, None, Vec::new()).await;
        self.drive_to_completion(Origin::ClientRequest).await;
    }

    async fn handle_task_assignment(self: &Arc<Self>, task_id: String, content: String) {
        self.emit_activity(ActivityEventKind::TaskStarted, format!("started task {task_id}")).await;
        self.append_turn(ContextRole::User, content, None, Vec::new()).await;
        self.drive_to_completion(Origin::Task(task_id)).await;
    }

    async fn handle_question(self: &Arc<Self>, from: String, content: String) {
        let framing = format!("Your colleague {from} asks: {content}");
        let request = CompletionRequest {
            model: self.effective_model(),
            messages: vec![Message::user(framing)],
            system: Some(SystemPrompt::Text(self.build_system_prompt())),
            tools: Vec::new(),
            max_tokens: Some(self.effective_max_tokens()),
            temperature: self.role.model.temperature,
            ..Default::default()
        };
        let reply = match self.provider.complete(request).await {
            Ok(response) => text_of(&response.message),
            Err(err) => format!("(failed to answer: {err})"),
        };
        self.team_link.send(Envelope::new(MessageType::Answer, self.id.clone(), from, reply)).await;
    }

    /// Runs the tool-call loop, parses the terminal action, and for a
    /// single delegation under a client request feeds the result back
    /// and re-enters the loop — the recursion in role chains described
    /// by §4.1, expressed as an explicit loop instead of async
    /// recursion (which would require boxing every frame).
    async fn drive_to_completion(self: &Arc<Self>, origin: Origin) {
        loop {
            let text = match self.run_tool_loop().await {
                Ok(text) => text,
                Err(err) => {
                    self.fail_origin(&origin, err).await;
                    return;
                }
            };

            match parse_terminal_action(&text) {
                TerminalAction::Delegate { role, content } => match self.delegate_one(&role, content, &text, &origin).await {
                    DelegateOutcome::Recurse(feedback) => {
                        self.append_turn(ContextRole::User, feedback, None, Vec::new()).await;
                        continue;
                    }
                    DelegateOutcome::Terminal | DelegateOutcome::Cancelled => return,
                },
                TerminalAction::ParallelDelegate(pairs) => {
                    self.parallel_delegate(pairs, &origin).await;
                    return;
                }
                TerminalAction::AskClient(content) => {
                    self.team_link.send(Envelope::new(MessageType::ClientResponse, self.id.clone(), Envelope::CLIENT, content)).await;
                    return;
                }
                TerminalAction::Respond(content) | TerminalAction::Complete(content) => {
                    self.finish_origin(&origin, TaskOutcome::Success(content.clone()), content).await;
                    return;
                }
            }
        }
    }

    async fn finish_origin(&self, origin: &Origin, outcome: TaskOutcome, client_content: String) {
        match origin {
            Origin::ClientRequest => {
                self.team_link.send(Envelope::new(MessageType::ClientResponse, self.id.clone(), Envelope::CLIENT, client_content)).await;
            }
            Origin::Task(task_id) => {
                self.emit_activity(ActivityEventKind::TaskCompleted, format!("task {task_id} completed")).await;
                self.team_link.complete_task(task_id, outcome).await;
            }
        }
    }

    async fn fail_origin(&self, origin: &Origin, err: MemberError) {
        match origin {
            Origin::ClientRequest => {
                self.team_link
                    .send(Envelope::new(MessageType::ClientResponse, self.id.clone(), Envelope::CLIENT, format!("Error: {err}")))
                    .await;
            }
            Origin::Task(task_id) => {
                self.team_link.complete_task(task_id, TaskOutcome::Failure(err.to_string())).await;
            }
        }
    }

    /// Resolve `role`, register and send a task, then wait for its
    /// result (§4.1 "Delegation (1-to-1)" and "Delegation during a
    /// subtask").
    async fn delegate_one(self: &Arc<Self>, role: &str, content: String, raw_text: &str, origin: &Origin) -> DelegateOutcome {
        let Some(target) = self.team_link.resolve_role(role).await else {
            self.emit_activity(ActivityEventKind::Warning, format!("unknown delegation target: {role}")).await;
            let fallback = match origin {
                Origin::ClientRequest => content,
                Origin::Task(_) => raw_text.to_string(),
            };
            self.finish_origin(origin, TaskOutcome::Success(fallback.clone()), fallback).await;
            return DelegateOutcome::Terminal;
        };

        let mut task = Task::new(self.id.clone(), target.clone(), content.clone(), 1);
        if let Origin::Task(parent_id) = origin {
            task = task.with_parent(parent_id.clone());
        }
        let task_id = task.id.clone();
        self.emit_activity(ActivityEventKind::Delegation, format!("delegating to {role} ({task_id})")).await;
        let receiver = self.team_link.register_task(task).await;
        self.team_link
            .send(Envelope::new(MessageType::TaskAssignment, self.id.clone(), target, content).with_task_id(task_id))
            .await;

        tokio::select! {
            () = self.team_link.cancellation().cancelled() => DelegateOutcome::Cancelled,
            result = receiver => {
                let outcome = result.unwrap_or_else(|_| TaskOutcome::Failure("delegate result channel closed".to_string()));
                match outcome {
                    TaskOutcome::Success(result_content) => match origin {
                        Origin::ClientRequest => DelegateOutcome::Recurse(format!(
                            "The {role} completed their task and returned: {result_content}\n\nYou may delegate again, ask the client a clarifying question, or briefly respond to the client."
                        )),
                        Origin::Task(parent_id) => {
                            self.finish_origin(&Origin::Task(parent_id.clone()), TaskOutcome::Success(result_content.clone()), result_content).await;
                            DelegateOutcome::Terminal
                        }
                    },
                    TaskOutcome::Failure(err) => {
                        let summary = format!("Delegation to {role} failed: {err}");
                        self.finish_origin(origin, TaskOutcome::Failure(summary.clone()), summary).await;
                        DelegateOutcome::Terminal
                    }
                }
            }
        }
    }

    /// Resolve every `(role, content)` pair, send every task assignment,
    /// then join on all results via one fiber per task (§4.1 "Parallel
    /// delegation (1-to-N)", grounded on `ugudu-orch-local`'s
    /// `dispatch_many`).
    async fn parallel_delegate(self: &Arc<Self>, pairs: Vec<(String, String)>, origin: &Origin) {
        let mut handles = Vec::with_capacity(pairs.len());
        let mut any_target = false;

        for (role, content) in pairs {
            match self.team_link.resolve_role(&role).await {
                Some(target) => {
                    any_target = true;
                    let mut task = Task::new(self.id.clone(), target.clone(), content.clone(), 1);
                    if let Origin::Task(parent_id) = origin {
                        task = task.with_parent(parent_id.clone());
                    }
                    let task_id = task.id.clone();
                    self.emit_activity(ActivityEventKind::Delegation, format!("parallel delegating to {role} ({task_id})")).await;
                    let receiver = self.team_link.register_task(task).await;
                    self.team_link
                        .send(Envelope::new(MessageType::TaskAssignment, self.id.clone(), target, content).with_task_id(task_id))
                        .await;
                    let cancel = self.team_link.cancellation();
                    handles.push(tokio::spawn(async move {
                        tokio::select! {
                            () = cancel.cancelled() => (role, None),
                            result = receiver => (role, Some(result.unwrap_or_else(|_| TaskOutcome::Failure("delegate result channel closed".to_string())))),
                        }
                    }));
                }
                None => {
                    self.emit_activity(ActivityEventKind::Warning, format!("unknown delegation target: {role}")).await;
                    handles.push(tokio::spawn(async move { (role, None) }));
                }
            }
        }

        if !any_target {
            let message = "No valid delegation targets found".to_string();
            self.finish_origin(origin, TaskOutcome::Failure(message.clone()), message).await;
            return;
        }

        let mut labelled = Vec::with_capacity(handles.len());
        for handle in handles {
            let (role, outcome) = handle.await.unwrap_or_else(|_| ("?".to_string(), None));
            match outcome {
                Some(TaskOutcome::Success(content)) => labelled.push(format!("{role}: {content}")),
                Some(TaskOutcome::Failure(err)) => labelled.push(format!("{role}: failed ({err})")),
                None => labelled.push(format!("{role}: (no valid target)")),
            }
        }

        let combined = labelled.join("\n");
        self.finish_origin(origin, TaskOutcome::Success(combined.clone()), combined).await;
    }

    /// The bounded tool-call iteration (§4.1 "Tool-call loop", cap
    /// default 20). Returns the terminal assistant text, which is
    /// whatever the cap'th response contained if the cap is hit.
    async fn run_tool_loop(self: &Arc<Self>) -> Result<String, MemberError> {
        let mut last_text = String::new();

        for _ in 0..self.config.tool_call_cap {
            let tool_defs = match &self.tools {
                Some(view) => view.definitions(),
                None => Vec::new(),
            };
            let request = CompletionRequest {
                model: self.effective_model(),
                messages: self.provider_messages().await,
                system: Some(SystemPrompt::Text(self.build_system_prompt())),
                tools: tool_defs,
                max_tokens: Some(self.effective_max_tokens()),
                temperature: self.role.model.temperature,
                ..Default::default()
            };

            let response = self.provider.complete(request).await?;
            let tool_uses = extract_tool_uses(&response.message);
            let assistant_text = text_of(&response.message);

            if tool_uses.is_empty() || self.tools.is_none() {
                self.append_turn(ContextRole::Assistant, assistant_text.clone(), None, Vec::new()).await;
                return Ok(assistant_text);
            }

            let stored_calls = tool_uses
                .iter()
                .map(|(id, name, input)| StoredToolCall { id: id.clone(), name: name.clone(), input: input.clone() })
                .collect();
            self.append_turn(ContextRole::Assistant, assistant_text.clone(), None, stored_calls).await;
            last_text = assistant_text;

            for (id, name, input) in tool_uses {
                let result_text = self.execute_tool(&id, &name, input).await;
                self.append_turn(ContextRole::Tool, result_text, Some(id), Vec::new()).await;
            }
        }

        Ok(last_text)
    }

    async fn execute_tool(&self, id: &str, name: &str, input: serde_json::Value) -> String {
        let Some(tools) = &self.tools else {
            return format!("no tools available to execute {name}");
        };
        self.emit_activity(ActivityEventKind::ToolCall, format!("{name}({})", truncate(&input.to_string(), 200))).await;
        let ctx = ToolContext { session_id: self.id.clone(), ..Default::default() };
        match tools.execute(name, input, &ctx).await {
            Ok(output) => serialize_tool_output(&output),
            Err(err) => {
                self.emit_activity(ActivityEventKind::ToolError, format!("{name}({id}): {err}")).await;
                err.to_string()
            }
        }
    }

    async fn append_turn(&self, role: ContextRole, content: String, tool_call_id: Option<String>, tool_calls: Vec<StoredToolCall>) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let record = ContextRecord { role, content, tool_call_id, tool_calls, sequence };
        {
            let mut ctx = self.context.write().await;
            ctx.push(record.clone());
            let window = self.history_window();
            let start = ctx.len().saturating_sub(window);
            ctx.drain(..start);
        }
        let conversation = self.conversation_id.read().await.clone();
        if let Some(conversation) = conversation {
            if let Err(err) = self.persistence.save_context(&self.id, &conversation, record).await {
                warn!(member = %self.id, %err, "failed to persist context turn");
            }
        }
    }

    async fn provider_messages(&self) -> Vec<Message> {
        let ctx = self.context.read().await;
        let mut messages = Vec::with_capacity(ctx.len());
        for record in ctx.iter() {
            match record.role {
                ContextRole::User => messages.push(Message::user(record.content.clone())),
                ContextRole::Assistant => {
                    let mut blocks = Vec::new();
                    if !record.content.is_empty() {
                        blocks.push(ContentBlock::Text(record.content.clone()));
                    }
                    for call in &record.tool_calls {
                        blocks.push(ContentBlock::ToolUse { id: call.id.clone(), name: call.name.clone(), input: call.input.clone() });
                    }
                    messages.push(Message { role: MessageRole::Assistant, content: blocks });
                }
                ContextRole::Tool => {
                    let tool_use_id = record.tool_call_id.clone().unwrap_or_default();
                    messages.push(Message {
                        role: MessageRole::User,
                        content: vec![ContentBlock::ToolResult {
                            tool_use_id,
                            content: vec![ContentItem::Text(record.content.clone())],
                            is_error: false,
                        }],
                    });
                }
                ContextRole::System => {}
            }
        }
        messages
    }

    fn history_window(&self) -> usize {
        self.token_settings.context_history.unwrap_or(match self.token_settings.mode {
            TokenMode::Normal => 40,
            TokenMode::Low => 10,
            TokenMode::Minimal => 5,
        })
    }

    fn effective_model(&self) -> String {
        if matches!(self.token_settings.mode, TokenMode::Low | TokenMode::Minimal) {
            if let Some(low) = &self.role.model.low_token_model {
                return low.clone();
            }
        }
        self.role.model.model.clone()
    }

    fn effective_max_tokens(&self) -> usize {
        match self.token_settings.mode {
            TokenMode::Normal => self
                .role
                .model
                .max_tokens
                .map(|v| v as usize)
                .or_else(|| self.token_settings.max_tokens.map(|v| v as usize))
                .unwrap_or(NORMAL_DEFAULT_MAX_TOKENS),
            TokenMode::Low => LOW_DEFAULT_MAX_TOKENS,
            TokenMode::Minimal => MINIMAL_DEFAULT_MAX_TOKENS,
        }
    }

    fn build_system_prompt(&self) -> String {
        let tools = match &self.tools {
            Some(view) => view.definitions(),
            None => Vec::new(),
        };
        prompt::build_system_prompt(&self.role, &self.team_name, &self.display_name, self.token_settings.mode, &tools)
    }
}

fn text_of(message: &Message) -> String {
    message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text(text) => Some(text.clone()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_tool_uses(message: &Message) -> Vec<(String, String, serde_json::Value)> {
    message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some((id.clone(), name.clone(), input.clone())),
            _ => None,
        })
        .collect()
}

fn serialize_tool_output(output: &ToolOutput) -> String {
    if let Some(structured) = &output.structured_content {
        return structured.to_string();
    }
    output
        .content
        .iter()
        .filter_map(|item| match item {
            ContentItem::Text(text) => Some(text.clone()),
            ContentItem::Image { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
