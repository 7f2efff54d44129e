#![deny(missing_docs)]
//! Persistence contract for ugudu (§3, §6): an append-only sequence of
//! context messages per `(team, member, conversation)`, replayed on
//! restart.
//!
//! Two traits, at two altitudes:
//! - [`Store`] is the process-wide backend (`ugudu-persist-memory`,
//!   `ugudu-persist-sqlite` implement it) covering team registration plus
//!   conversation/context storage.
//! - [`PersistencePort`] is the narrow, team-scoped contract the member
//!   runtime and team router actually depend on. [`ScopedPersistence`]
//!   adapts any `Store` into one; [`ForwardingPersistence`] additionally
//!   relays `on_activity` events to a subscriber, matching the manager's
//!   persistence-callback wiring (§4.3).

mod error;
mod port;
mod store;
mod types;

pub use error::PersistError;
pub use port::{ForwardingPersistence, PersistencePort, ScopedPersistence};
pub use store::Store;
pub use types::{
    ActivityEvent, ActivityEventKind, ContextRecord, ContextRole, ConversationRecord,
    ConversationStatus, StoredToolCall, TeamRecord, TeamStatus,
};
