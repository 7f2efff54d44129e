//! Permission policy for gating tool execution.

/// A decision returned by a [`PermissionPolicy`] for a single tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionDecision {
    /// The call is allowed to proceed.
    Allow,
    /// The call is rejected outright, with a human-readable reason.
    Deny(String),
    /// The call requires external confirmation before it can proceed.
    ///
    /// Callers without an interactive confirmation path should treat this
    /// the same as `Deny`.
    Ask(String),
}

/// Decides whether a tool call is permitted.
///
/// Implementors inspect the tool name and its input and return a
/// [`PermissionDecision`]. Typically wired in as middleware ahead of tool
/// execution (see `ugudu-tool`'s `PermissionChecker`).
pub trait PermissionPolicy: Send + Sync {
    /// Check whether `tool_name` may be called with `input`.
    fn check(&self, tool_name: &str, input: &serde_json::Value) -> PermissionDecision;
}
