#![doc = include_str!("../README.md")]

pub mod durable;
pub mod guardrail;
pub mod guardrail_hook;
pub mod sandbox;
pub mod session;
pub mod tracing_hook;

pub use durable::*;
pub use guardrail::*;
pub use guardrail_hook::*;
pub use sandbox::*;
pub use session::*;
pub use tracing_hook::*;
