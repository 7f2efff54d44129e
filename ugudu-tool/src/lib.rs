#![deny(missing_docs)]
//! Tool interface, registry, and middleware pipeline for ugudu.
//!
//! [`Tool`] is the ergonomic entry point: implement it with concrete
//! `Args`/`Output`/`Error` types and `#[derive(schemars::JsonSchema)]` on
//! `Args` to get a JSON Schema for free. [`ToolDyn`] is the object-safe
//! erasure every `Tool` gets automatically, used internally so
//! [`ToolRegistry`] can hold heterogeneous tools behind `Arc<dyn ToolDyn>`.
//!
//! Tool calls run through a middleware chain (see [`middleware`]) before
//! reaching the tool itself; [`builtin`] ships permission checking, output
//! truncation, schema validation, timeouts, and structured-output
//! validation as middleware.

pub mod builtin;
pub mod middleware;
pub mod registry;
pub mod sandbox;
mod tool;

pub use builtin::{
    OutputFormatter, PermissionChecker, RetryLimitedValidator, SchemaValidator,
    StructuredOutputValidator, TimeoutMiddleware,
};
pub use middleware::{Next, ToolCall, ToolMiddleware, tool_middleware_fn};
pub use registry::ToolRegistry;
pub use sandbox::{ToolCategory, SandboxedView, categories_for_role, category_of};
pub use tool::{Tool, ToolDyn};
pub use ugudu_types::ToolError;

#[cfg(feature = "macros")]
pub use ugudu_tool_macros::ugudu_tool;
