//! Core trait boundaries: `Provider`, `ContextStrategy`, `ObservabilityHook`,
//! `DurableContext`.
//!
//! These traits use RPITIT (`impl Future` in trait position) rather than
//! `#[async_trait]` so the common case (calling a concrete `P: Provider`)
//! pays no allocation. Callers that need a trait object wrap the
//! concrete type in a dyn-compatible adapter (see `ugudu-loop`'s
//! `BoxedHook`/`BoxedDurable`).

use std::time::Duration;

use crate::error::{ContextError, DurableError, HookError, ProviderError};
use crate::stream::StreamHandle;
use crate::types::{
    CompletionRequest, CompletionResponse, Message, ToolContext, ToolOutput,
};
use crate::wasm::WasmCompatSend;

/// An LLM backend. Implementors send completion requests and (optionally)
/// stream responses token by token.
pub trait Provider: Send + Sync {
    /// Send a completion request and await the full response.
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, ProviderError>> + Send;

    /// Send a completion request and stream the response incrementally.
    fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<StreamHandle, ProviderError>> + Send;
}

/// A context window compaction strategy. Decides when and how to shrink
/// the conversation history so it fits the model's context window.
pub trait ContextStrategy: Send + Sync {
    /// Whether compaction should run given the current messages and an
    /// estimated token count.
    fn should_compact(&self, messages: &[Message], token_count: usize) -> bool;

    /// Compact the message history, returning the replacement history.
    fn compact(
        &self,
        messages: Vec<Message>,
    ) -> impl Future<Output = Result<Vec<Message>, ContextError>> + WasmCompatSend;

    /// Estimate the token count of the given messages.
    fn token_estimate(&self, messages: &[Message]) -> usize;
}

/// A single observation point in the agentic loop.
///
/// Hooks see these events before/after each LLM call, before/after each
/// tool call, and at loop/compaction boundaries.
#[derive(Debug)]
pub enum HookEvent<'a> {
    /// Fired immediately before a completion request is sent.
    PreLlmCall {
        /// The request about to be sent.
        request: &'a CompletionRequest,
    },
    /// Fired immediately after a completion response is received.
    PostLlmCall {
        /// The response that was received.
        response: &'a CompletionResponse,
    },
    /// Fired immediately before a tool is executed.
    PreToolExecution {
        /// Name of the tool about to run.
        tool_name: &'a str,
        /// The input that will be passed to the tool.
        input: &'a serde_json::Value,
    },
    /// Fired immediately after a tool finishes executing.
    PostToolExecution {
        /// Name of the tool that ran.
        tool_name: &'a str,
        /// The tool's output.
        output: &'a ToolOutput,
    },
    /// Fired once per loop iteration, before the LLM call for that turn.
    LoopIteration {
        /// The 0-indexed turn number.
        turn: usize,
    },
    /// Fired when context compaction runs.
    ContextCompaction {
        /// Estimated token count before compaction.
        old_tokens: usize,
        /// Estimated token count after compaction.
        new_tokens: usize,
    },
}

/// What a hook tells the loop to do after observing an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookAction {
    /// Proceed normally.
    Continue,
    /// Skip the step that was about to run (e.g. don't call the tool).
    Skip,
    /// Stop the loop entirely with the given reason.
    Terminate {
        /// Human-readable reason surfaced in `LoopError::HookTerminated`.
        reason: String,
    },
}

/// Observes the agentic loop without controlling it (beyond `HookAction`).
///
/// Implementors receive [`HookEvent`]s at each loop boundary. Multiple
/// hooks may be registered; they fire in registration order and the loop
/// stops at the first non-`Continue` action.
pub trait ObservabilityHook: Send + Sync {
    /// Handle one lifecycle event.
    fn on_event(
        &self,
        event: HookEvent<'_>,
    ) -> impl Future<Output = Result<HookAction, HookError>> + Send;
}

/// Retry policy for a durable activity.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: Option<u32>,
    /// Initial backoff before the first retry.
    pub initial_interval: Option<Duration>,
    /// Multiplier applied to the backoff after each failed attempt.
    pub backoff_coefficient: Option<f64>,
}

/// Configuration for a single durable activity invocation.
#[derive(Debug, Clone)]
pub struct ActivityOptions {
    /// How long a single attempt may run before it's considered failed.
    pub start_to_close_timeout: Duration,
    /// Heartbeat interval, for long-running activities that report liveness.
    pub heartbeat_timeout: Option<Duration>,
    /// Retry policy applied by the durable execution engine.
    pub retry_policy: Option<RetryPolicy>,
}

/// A durable execution context. Routes LLM calls and tool executions
/// through a workflow engine (Temporal, Restate, Inngest, or an
/// in-process journal) so they can be replayed after a crash instead of
/// re-executed.
pub trait DurableContext: Send + Sync {
    /// Execute an LLM call as a durable activity.
    fn execute_llm_call(
        &self,
        request: CompletionRequest,
        options: ActivityOptions,
    ) -> impl Future<Output = Result<CompletionResponse, DurableError>> + Send;

    /// Execute a tool call as a durable activity.
    fn execute_tool(
        &self,
        tool_name: &str,
        input: serde_json::Value,
        ctx: &ToolContext,
        options: ActivityOptions,
    ) -> impl Future<Output = Result<ToolOutput, DurableError>> + Send;
}
