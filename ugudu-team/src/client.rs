//! A message forwarded out of the team's client channel to an `Ask`
//! caller (§4.2 "Ask aggregation").

/// One client-bound message, as delivered to an [`crate::Team::ask`] or
/// [`crate::Team::ask_member`] caller.
#[derive(Debug, Clone)]
pub struct ClientMessage {
    /// The member id that produced this message.
    pub from: String,
    /// The message body.
    pub content: String,
}
