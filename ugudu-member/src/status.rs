//! Member status FSM (§4.1 "Status FSM").

/// A member's current activity state.
///
/// `Waiting`, `Blocked`, and `Offline` are reserved for handlers not yet
/// driven by the serial event loop; they must still round-trip through
/// persistence without validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    /// Not currently handling a message.
    Idle,
    /// Inside a message handler.
    Working,
    /// Reserved: blocked on an external signal.
    Waiting,
    /// Reserved: blocked on a colleague or resource.
    Blocked,
    /// Reserved: not accepting work.
    Offline,
}

impl Default for MemberStatus {
    fn default() -> Self {
        Self::Idle
    }
}
