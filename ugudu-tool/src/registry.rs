//! [`ToolRegistry`]: holds tools and the middleware chain that wraps them.

use std::collections::HashMap;
use std::sync::Arc;

use ugudu_types::{ToolContext, ToolDefinition, ToolError, ToolOutput};

use crate::middleware::{Next, ToolCall, ToolMiddleware};
use crate::tool::{Tool, ToolDyn};

/// Registry of tools available to a turn, plus the middleware that wraps
/// every call to them.
///
/// Holds tools as `Arc<dyn ToolDyn>` keyed by name. Middleware registered
/// via [`add_middleware`](Self::add_middleware) applies to every tool
/// call; middleware registered via
/// [`add_tool_middleware`](Self::add_tool_middleware) applies only to the
/// named tool and runs after the global chain.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolDyn>>,
    global_middleware: Vec<Arc<dyn ToolMiddleware>>,
    per_tool_middleware: HashMap<String, Vec<Arc<dyn ToolMiddleware>>>,
    next_call_id: std::sync::atomic::AtomicU64,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            global_middleware: Vec::new(),
            per_tool_middleware: HashMap::new(),
            next_call_id: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Register a strongly-typed tool. Overwrites any existing tool with
    /// the same name.
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.register_dyn(Arc::new(tool));
    }

    /// Register a tool via its object-safe erasure directly. Useful for
    /// tool sources that can't express a fixed `Args`/`Output` shape at
    /// compile time (MCP servers, HTTP-proxied tools).
    pub fn register_dyn(&mut self, tool: Arc<dyn ToolDyn>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolDyn>> {
        self.tools.get(name)
    }

    /// Definitions for every registered tool, in registration order is not
    /// guaranteed (backed by a `HashMap`).
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Register middleware that wraps every tool call, in registration
    /// order (earlier-registered middleware sees the call first).
    pub fn add_middleware(&mut self, middleware: impl ToolMiddleware + 'static) {
        self.global_middleware.push(Arc::new(middleware));
    }

    /// Register middleware that wraps calls to a single named tool. Runs
    /// after the global middleware chain.
    pub fn add_tool_middleware(
        &mut self,
        tool_name: impl Into<String>,
        middleware: impl ToolMiddleware + 'static,
    ) {
        self.per_tool_middleware
            .entry(tool_name.into())
            .or_default()
            .push(Arc::new(middleware));
    }

    /// Execute a tool by name with raw JSON input, running it through the
    /// global and per-tool middleware chains.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] if no tool is registered under
    /// `name`. Otherwise propagates whatever error the middleware chain or
    /// the tool itself returns.
    pub async fn execute(
        &self,
        name: &str,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let id = self
            .next_call_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let call = ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            input,
        };

        let empty: Vec<Arc<dyn ToolMiddleware>> = Vec::new();
        let per_tool = self.per_tool_middleware.get(name).unwrap_or(&empty);
        let chain: Vec<Arc<dyn ToolMiddleware>> = self
            .global_middleware
            .iter()
            .chain(per_tool.iter())
            .cloned()
            .collect();

        let next = Next::new(tool.as_ref(), &chain);
        next.run(&call, ctx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
