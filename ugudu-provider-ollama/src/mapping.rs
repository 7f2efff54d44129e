//! Request/response mapping between ugudu-types and the Ollama Chat API format.
//!
//! Reference: <https://github.com/ollama/ollama/blob/main/docs/api.md#generate-a-chat-completion>

use ugudu_types::{
    CompletionRequest, CompletionResponse, ContentBlock, ContentItem, Message, ProviderError, Role,
    StopReason, SystemPrompt, TokenUsage, ToolDefinition,
};

// ─── Request mapping ─────────────────────────────────────────────────────────

/// Convert a [`CompletionRequest`] into the Ollama Chat API JSON body.
///
/// The returned value does **not** include `"stream"` — callers add that key.
#[must_use]
pub fn to_api_request(
    req: &CompletionRequest,
    default_model: &str,
    keep_alive: Option<&str>,
) -> serde_json::Value {
    let model = if req.model.is_empty() {
        default_model.to_string()
    } else {
        req.model.clone()
    };

    let mut messages = map_messages(&req.messages);

    // Ollama accepts system messages inline, but also supports a dedicated system prompt.
    // We prepend a system message if configured.
    if let Some(system) = &req.system {
        let system_text = match system {
            SystemPrompt::Text(text) => text.clone(),
            SystemPrompt::Blocks(blocks) => blocks
                .iter()
                .map(|b| b.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        };
        let system_msg = serde_json::json!({
            "role": "system",
            "content": system_text,
        });
        messages.insert(0, system_msg);
    }

    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
    });

    // Build options object for model parameters
    let mut options = serde_json::Map::new();

    if let Some(max_tokens) = req.max_tokens {
        options.insert("num_predict".into(), serde_json::Value::from(max_tokens));
    }

    if let Some(temp) = req.temperature {
        options.insert("temperature".into(), serde_json::Value::from(temp as f64));
    }

    if let Some(top_p) = req.top_p {
        options.insert("top_p".into(), serde_json::Value::from(top_p as f64));
    }

    if !req.stop_sequences.is_empty() {
        options.insert(
            "stop".into(),
            serde_json::Value::Array(
                req.stop_sequences
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
        );
    }

    // Merge extra fields into options (provider-specific Ollama options)
    if let Some(serde_json::Value::Object(extra_map)) = &req.extra {
        for (k, v) in extra_map {
            options.insert(k.clone(), v.clone());
        }
    }

    if !options.is_empty() {
        body["options"] = serde_json::Value::Object(options);
    }

    // Tools — Ollama uses the same format as OpenAI
    if !req.tools.is_empty() {
        body["tools"] =
            serde_json::Value::Array(req.tools.iter().map(map_tool_definition).collect());
    }

    // Tool choice — Ollama doesn't have direct tool_choice support in the same way,
    // but we include it for forward compatibility
    // (Ollama ignores unknown fields gracefully)

    // keep_alive
    if let Some(ka) = keep_alive {
        body["keep_alive"] = serde_json::Value::String(ka.to_string());
    }

    body
}

/// Map a list of [`Message`]s to Ollama's message array format.
fn map_messages(messages: &[Message]) -> Vec<serde_json::Value> {
    messages
        .iter()
        .map(|msg| {
            let role_str = match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
            };

            let mut message = serde_json::json!({ "role": role_str });

            // Extract text content
            let text_content = extract_text_content(&msg.content);
            if !text_content.is_empty() {
                message["content"] = serde_json::Value::String(text_content);
            }

            // Extract tool calls (for assistant messages)
            let tool_calls = extract_tool_calls(&msg.content);
            if !tool_calls.is_empty() {
                message["tool_calls"] = serde_json::Value::Array(tool_calls);
            }

            message
        })
        .collect()
}

/// Extract text content from content blocks into a single string.
fn extract_text_content(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text(text) => Some(text.as_str()),
            ContentBlock::ToolResult {
                content, is_error, ..
            } => {
                // Include tool results as text
                let text = content
                    .iter()
                    .filter_map(|item| match item {
                        ContentItem::Text(t) => Some(t.as_str()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                if !text.is_empty() {
                    Some(if *is_error { "Error: " } else { "" })
                } else {
                    None
                }
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

/// Extract tool calls from content blocks for Ollama format.
fn extract_tool_calls(blocks: &[ContentBlock]) -> Vec<serde_json::Value> {
    blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { name, input, .. } => Some(serde_json::json!({
                "function": {
                    "name": name,
                    "arguments": input,
                }
            })),
            _ => None,
        })
        .collect()
}

/// Map a [`ToolDefinition`] to Ollama's tool definition format (OpenAI-compatible).
fn map_tool_definition(tool: &ToolDefinition) -> serde_json::Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        }
    })
}

// ─── Response mapping ─────────────────────────────────────────────────────────

/// Parse an Ollama Chat API response JSON into a [`CompletionResponse`].
///
/// # Errors
///
/// Returns [`ProviderError::InvalidRequest`] if required fields are missing or malformed.
pub fn from_api_response(body: &serde_json::Value) -> Result<CompletionResponse, ProviderError> {
    let model = body["model"]
        .as_str()
        .ok_or_else(|| ProviderError::InvalidRequest("missing 'model' in response".into()))?
        .to_string();

    let message_obj = &body["message"];

    // Parse text content
    let content_text = message_obj["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let mut content_blocks = Vec::new();

    if !content_text.is_empty() {
        content_blocks.push(ContentBlock::Text(content_text));
    }

    // Parse tool calls (Ollama uses same format as OpenAI)
    if let Some(tool_calls) = message_obj["tool_calls"].as_array() {
        for tc in tool_calls {
            let function = &tc["function"];
            let name = function["name"].as_str().unwrap_or_default().to_string();
            let arguments = &function["arguments"];

            // Ollama does not provide tool call IDs; synthesize one
            let id = format!("ollama_{}", uuid::Uuid::new_v4());

            content_blocks.push(ContentBlock::ToolUse {
                id,
                name,
                input: arguments.clone(),
            });
        }
    }

    // Parse usage from Ollama's eval fields
    let usage = parse_usage(body);

    // Determine stop reason
    let stop_reason = parse_stop_reason(body);

    // Ollama doesn't return a message ID; synthesize one
    let id = format!("ollama_{}", uuid::Uuid::new_v4());

    Ok(CompletionResponse {
        id,
        model,
        message: Message {
            role: Role::Assistant,
            content: content_blocks,
        },
        usage,
        stop_reason,
    })
}

/// Parse [`TokenUsage`] from the Ollama response.
///
/// Ollama provides `eval_count` (output tokens) and `prompt_eval_count` (input tokens).
fn parse_usage(body: &serde_json::Value) -> TokenUsage {
    TokenUsage {
        input_tokens: body["prompt_eval_count"].as_u64().unwrap_or(0) as usize,
        output_tokens: body["eval_count"].as_u64().unwrap_or(0) as usize,
        cache_read_tokens: None,
        cache_creation_tokens: None,
        reasoning_tokens: None,
        iterations: None,
    }
}

/// Parse the stop reason from Ollama's `done_reason` field.
fn parse_stop_reason(body: &serde_json::Value) -> StopReason {
    match body["done_reason"].as_str() {
        Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some("tool_calls") => StopReason::ToolUse,
        _ => {
            // If there are tool calls in the message, treat as ToolUse
            if body["message"]["tool_calls"].is_array()
                && !body["message"]["tool_calls"]
                    .as_array()
                    .is_none_or(|a| a.is_empty())
            {
                StopReason::ToolUse
            } else {
                StopReason::EndTurn
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
