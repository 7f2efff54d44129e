//! The [`Tool`] trait and its object-safe erasure, [`ToolDyn`].

use std::future::Future;
use std::pin::Pin;

use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use ugudu_types::{ContentItem, ToolContext, ToolDefinition, ToolError, ToolOutput};

/// A strongly-typed tool.
///
/// Implement this with concrete `Args`/`Output`/`Error` associated types;
/// [`ToolRegistry`](crate::ToolRegistry) erases it to `Arc<dyn ToolDyn>`
/// internally so tools of different shapes can share one registry.
///
/// Uses RPITIT (`impl Future` in trait position) for `call` rather than
/// `#[async_trait]`, matching `ugudu-types`'s `Provider`/`ContextStrategy`.
pub trait Tool: Send + Sync {
    /// The tool's unique name.
    const NAME: &'static str;

    /// Deserialized argument type. Typically derives
    /// `serde::Deserialize` and `schemars::JsonSchema`.
    type Args: DeserializeOwned + JsonSchema + Send;

    /// Serialized result type.
    type Output: Serialize + Send;

    /// Error type. Must convert into [`ToolError`] so the registry can
    /// report failures uniformly regardless of tool implementation.
    type Error: Into<ToolError> + Send;

    /// The tool's definition, including its JSON Schema.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with already-deserialized arguments.
    fn call(
        &self,
        args: Self::Args,
        ctx: &ToolContext,
    ) -> impl Future<Output = Result<Self::Output, Self::Error>> + Send;
}

/// Object-safe erasure of [`Tool`], used internally by [`ToolRegistry`](crate::ToolRegistry)
/// so tools of different concrete types can be stored in one collection.
///
/// Any `T: Tool` gets a blanket [`ToolDyn`] implementation for free. Tool
/// sources that can't express a fixed `Args`/`Output` shape at compile
/// time (MCP servers, HTTP-proxied tools) can implement [`ToolDyn`]
/// directly instead.
pub trait ToolDyn: Send + Sync {
    /// The tool's unique name.
    fn name(&self) -> &str;

    /// The tool's definition, including its JSON Schema.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with raw JSON input, returning a [`ToolOutput`].
    fn call_dyn<'a>(
        &'a self,
        input: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send + 'a>>;
}

impl<T> ToolDyn for T
where
    T: Tool,
{
    fn name(&self) -> &str {
        T::NAME
    }

    fn definition(&self) -> ToolDefinition {
        Tool::definition(self)
    }

    fn call_dyn<'a>(
        &'a self,
        input: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ToolError>> + Send + 'a>> {
        Box::pin(async move {
            let args: T::Args = serde_json::from_value(input)
                .map_err(|e| ToolError::InvalidInput(e.to_string()))?;
            let output = self.call(args, ctx).await.map_err(Into::into)?;
            let value = serde_json::to_value(&output)
                .map_err(|e| ToolError::ExecutionFailed(Box::new(e)))?;
            let text = match &value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Ok(ToolOutput {
                content: vec![ContentItem::Text(text)],
                structured_content: Some(value),
                is_error: false,
            })
        })
    }
}
