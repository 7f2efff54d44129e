//! Tunables for [`crate::Member`].

/// Member runtime configuration.
#[derive(Debug, Clone)]
pub struct MemberConfig {
    /// Bound on tool-call loop iterations per handler invocation
    /// (§4.1 "Tool-call loop", default 20).
    pub tool_call_cap: usize,
    /// Inbox channel capacity; overflow drops the message with a warning
    /// (§4.1 "send", default 100).
    pub inbox_capacity: usize,
}

impl Default for MemberConfig {
    fn default() -> Self {
        Self { tool_call_cap: 20, inbox_capacity: 100 }
    }
}
