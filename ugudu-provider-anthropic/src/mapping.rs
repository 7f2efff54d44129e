//! Request/response mapping between ugudu-types and the Anthropic Messages API format.
//!
//! Reference: <https://docs.anthropic.com/en/api/messages>

use ugudu_types::{
    CacheTtl, CompletionRequest, CompletionResponse, ContentBlock, ContentItem, DocumentSource,
    ImageSource, Message, ProviderError, Role, StopReason, SystemPrompt, ThinkingConfig,
    TokenUsage, ToolChoice, ToolDefinition,
};

// ─── Request mapping ─────────────────────────────────────────────────────────

/// Convert a [`CompletionRequest`] into the Anthropic Messages API JSON body.
///
/// The returned value does **not** include `"stream"` — callers add that key.
#[must_use]
pub fn to_api_request(req: &CompletionRequest, default_model: &str) -> serde_json::Value {
    let model = if req.model.is_empty() {
        default_model.to_string()
    } else {
        req.model.clone()
    };

    let mut body = serde_json::json!({
        "model": model,
        "messages": map_messages(&req.messages),
        "max_tokens": req.max_tokens.unwrap_or(4096),
    });

    // System prompt
    if let Some(system) = &req.system {
        body["system"] = map_system_prompt(system);
    }

    // Temperature
    if let Some(temp) = req.temperature {
        body["temperature"] = serde_json::Value::from(temp);
    }

    // Top-p
    if let Some(top_p) = req.top_p {
        body["top_p"] = serde_json::Value::from(top_p);
    }

    // Stop sequences
    if !req.stop_sequences.is_empty() {
        body["stop_sequences"] = serde_json::Value::Array(
            req.stop_sequences
                .iter()
                .map(|s| serde_json::Value::String(s.clone()))
                .collect(),
        );
    }

    // Tools
    if !req.tools.is_empty() {
        body["tools"] =
            serde_json::Value::Array(req.tools.iter().map(map_tool_definition).collect());
    }

    // Tool choice
    if let Some(choice) = &req.tool_choice {
        body["tool_choice"] = map_tool_choice(choice);
    }

    // Thinking / extended thinking
    if let Some(thinking) = &req.thinking
        && let Some(thinking_val) = map_thinking_config(thinking)
    {
        body["thinking"] = thinking_val;
    }

    // Context management (server-side compaction)
    if let Some(ctx_mgmt) = &req.context_management {
        let edits: Vec<serde_json::Value> = ctx_mgmt
            .edits
            .iter()
            .map(|edit| match edit {
                ugudu_types::ContextEdit::Compact { strategy } => serde_json::json!({
                    "type": "auto",
                    "trigger": strategy,
                }),
            })
            .collect();
        body["context_management"] = serde_json::json!({ "edits": edits });
    }

    // Merge extra provider-specific fields last (they can override anything above)
    if let Some(serde_json::Value::Object(extra_map)) = &req.extra
        && let serde_json::Value::Object(body_map) = &mut body
    {
        for (k, v) in extra_map {
            body_map.insert(k.clone(), v.clone());
        }
    }

    body
}

/// Map a list of [`Message`]s to Anthropic's message array format.
fn map_messages(messages: &[Message]) -> serde_json::Value {
    let arr: Vec<serde_json::Value> = messages
        .iter()
        .filter_map(|msg| {
            // Anthropic does not accept system messages inline — they go in the top-level
            // "system" field. Filter them out here.
            if msg.role == Role::System {
                return None;
            }
            let role_str = match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => unreachable!("filtered above"),
            };
            let content = map_content_blocks(&msg.content);
            Some(serde_json::json!({ "role": role_str, "content": content }))
        })
        .collect();
    serde_json::Value::Array(arr)
}

/// Map a slice of [`ContentBlock`]s to Anthropic's content array.
pub(crate) fn map_content_blocks(blocks: &[ContentBlock]) -> serde_json::Value {
    let arr: Vec<serde_json::Value> = blocks.iter().map(map_content_block).collect();
    serde_json::Value::Array(arr)
}

/// Map a single [`ContentBlock`] to its Anthropic JSON representation.
pub(crate) fn map_content_block(block: &ContentBlock) -> serde_json::Value {
    match block {
        ContentBlock::Text(text) => serde_json::json!({
            "type": "text",
            "text": text,
        }),
        ContentBlock::Thinking {
            thinking,
            signature,
        } => serde_json::json!({
            "type": "thinking",
            "thinking": thinking,
            "signature": signature,
        }),
        ContentBlock::RedactedThinking { data } => serde_json::json!({
            "type": "redacted_thinking",
            "data": data,
        }),
        ContentBlock::ToolUse { id, name, input } => serde_json::json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input,
        }),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => {
            let mapped_content: Vec<serde_json::Value> =
                content.iter().map(map_content_item).collect();
            serde_json::json!({
                "type": "tool_result",
                "tool_use_id": tool_use_id,
                "content": mapped_content,
                "is_error": is_error,
            })
        }
        ContentBlock::Image { source } => serde_json::json!({
            "type": "image",
            "source": map_image_source(source),
        }),
        ContentBlock::Document { source } => serde_json::json!({
            "type": "document",
            "source": map_document_source(source),
        }),
        ContentBlock::Compaction { content } => serde_json::json!({
            "type": "compaction",
            "content": content,
        }),
    }
}

/// Map a [`ContentItem`] to its Anthropic JSON representation.
fn map_content_item(item: &ContentItem) -> serde_json::Value {
    match item {
        ContentItem::Text(text) => serde_json::json!({ "type": "text", "text": text }),
        ContentItem::Image { source } => serde_json::json!({
            "type": "image",
            "source": map_image_source(source),
        }),
    }
}

/// Map an [`ImageSource`] to Anthropic's image source format.
fn map_image_source(source: &ImageSource) -> serde_json::Value {
    match source {
        ImageSource::Base64 { media_type, data } => serde_json::json!({
            "type": "base64",
            "media_type": media_type,
            "data": data,
        }),
        ImageSource::Url { url } => serde_json::json!({
            "type": "url",
            "url": url,
        }),
    }
}

/// Map a [`DocumentSource`] to Anthropic's document source format.
fn map_document_source(source: &DocumentSource) -> serde_json::Value {
    match source {
        DocumentSource::Base64Pdf { data } => serde_json::json!({
            "type": "base64",
            "media_type": "application/pdf",
            "data": data,
        }),
        DocumentSource::PlainText { data } => serde_json::json!({
            "type": "text",
            "data": data,
        }),
        DocumentSource::Url { url } => serde_json::json!({
            "type": "url",
            "url": url,
        }),
    }
}

/// Map a [`SystemPrompt`] to Anthropic's system field value.
fn map_system_prompt(system: &SystemPrompt) -> serde_json::Value {
    match system {
        SystemPrompt::Text(text) => serde_json::Value::String(text.clone()),
        SystemPrompt::Blocks(blocks) => {
            let arr: Vec<serde_json::Value> = blocks
                .iter()
                .map(|block| {
                    let mut obj = serde_json::json!({
                        "type": "text",
                        "text": block.text,
                    });
                    if let Some(cache_control) = &block.cache_control {
                        obj["cache_control"] = map_cache_control(cache_control);
                    }
                    obj
                })
                .collect();
            serde_json::Value::Array(arr)
        }
    }
}

/// Map a [`ugudu_types::CacheControl`] to Anthropic's cache_control object.
fn map_cache_control(cc: &ugudu_types::CacheControl) -> serde_json::Value {
    let ttl = match cc.ttl {
        Some(CacheTtl::FiveMinutes) => "ephemeral",
        // Anthropic currently only supports "ephemeral" (5 min); 1-hour maps to it too
        Some(CacheTtl::OneHour) => "ephemeral",
        None => "ephemeral",
    };
    serde_json::json!({ "type": ttl })
}

/// Map a [`ToolDefinition`] to Anthropic's tool definition format.
fn map_tool_definition(tool: &ToolDefinition) -> serde_json::Value {
    let mut obj = serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.input_schema,
    });
    if let Some(cache_control) = &tool.cache_control {
        obj["cache_control"] = map_cache_control(cache_control);
    }
    obj
}

/// Map a [`ToolChoice`] to Anthropic's tool_choice format.
fn map_tool_choice(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Auto => serde_json::json!({ "type": "auto" }),
        ToolChoice::None => serde_json::json!({ "type": "none" }),
        ToolChoice::Required => serde_json::json!({ "type": "any" }),
        ToolChoice::Specific { name } => serde_json::json!({ "type": "tool", "name": name }),
    }
}

/// Map a [`ThinkingConfig`] to Anthropic's thinking object, or `None` if disabled.
fn map_thinking_config(config: &ThinkingConfig) -> Option<serde_json::Value> {
    match config {
        ThinkingConfig::Enabled { budget_tokens } => Some(serde_json::json!({
            "type": "enabled",
            "budget_tokens": budget_tokens,
        })),
        ThinkingConfig::Disabled => Some(serde_json::json!({ "type": "disabled" })),
        ThinkingConfig::Adaptive => None,
    }
}

// ─── Response mapping ─────────────────────────────────────────────────────────

/// Parse an Anthropic Messages API response JSON into a [`CompletionResponse`].
///
/// # Errors
///
/// Returns [`ProviderError::InvalidRequest`] if required fields are missing or malformed.
pub fn from_api_response(body: &serde_json::Value) -> Result<CompletionResponse, ProviderError> {
    let id = body["id"]
        .as_str()
        .ok_or_else(|| ProviderError::InvalidRequest("missing 'id' in response".into()))?
        .to_string();

    let model = body["model"]
        .as_str()
        .ok_or_else(|| ProviderError::InvalidRequest("missing 'model' in response".into()))?
        .to_string();

    let content_arr = body["content"].as_array().ok_or_else(|| {
        ProviderError::InvalidRequest("missing 'content' array in response".into())
    })?;

    let mut content_blocks = Vec::with_capacity(content_arr.len());
    for block in content_arr {
        content_blocks.push(parse_content_block(block)?);
    }

    let usage = parse_usage(&body["usage"]);

    let stop_reason = body["stop_reason"]
        .as_str()
        .map(parse_stop_reason)
        .unwrap_or(StopReason::EndTurn);

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

/// Parse a single content block from the Anthropic response JSON.
fn parse_content_block(block: &serde_json::Value) -> Result<ContentBlock, ProviderError> {
    let block_type = block["type"]
        .as_str()
        .ok_or_else(|| ProviderError::InvalidRequest("content block missing 'type'".into()))?;

    match block_type {
        "text" => {
            let text = block["text"]
                .as_str()
                .ok_or_else(|| ProviderError::InvalidRequest("text block missing 'text'".into()))?
                .to_string();
            Ok(ContentBlock::Text(text))
        }
        "thinking" => {
            let thinking = block["thinking"].as_str().unwrap_or_default().to_string();
            let signature = block["signature"].as_str().unwrap_or_default().to_string();
            Ok(ContentBlock::Thinking {
                thinking,
                signature,
            })
        }
        "redacted_thinking" => {
            let data = block["data"].as_str().unwrap_or_default().to_string();
            Ok(ContentBlock::RedactedThinking { data })
        }
        "tool_use" => {
            let id = block["id"]
                .as_str()
                .ok_or_else(|| ProviderError::InvalidRequest("tool_use block missing 'id'".into()))?
                .to_string();
            let name = block["name"]
                .as_str()
                .ok_or_else(|| {
                    ProviderError::InvalidRequest("tool_use block missing 'name'".into())
                })?
                .to_string();
            let input = block["input"].clone();
            Ok(ContentBlock::ToolUse { id, name, input })
        }
        "compaction" => {
            let content = block["content"].as_str().unwrap_or_default().to_string();
            Ok(ContentBlock::Compaction { content })
        }
        other => Err(ProviderError::InvalidRequest(format!(
            "unknown content block type: {other}"
        ))),
    }
}

/// Parse [`TokenUsage`] from the Anthropic response `usage` field.
fn parse_usage(usage: &serde_json::Value) -> TokenUsage {
    let iterations = usage["iterations"].as_array().map(|arr| {
        arr.iter()
            .map(|iter_val| ugudu_types::UsageIteration {
                input_tokens: iter_val["input_tokens"].as_u64().unwrap_or(0) as usize,
                output_tokens: iter_val["output_tokens"].as_u64().unwrap_or(0) as usize,
                cache_read_tokens: iter_val["cache_read_input_tokens"]
                    .as_u64()
                    .map(|n| n as usize),
                cache_creation_tokens: iter_val["cache_creation_input_tokens"]
                    .as_u64()
                    .map(|n| n as usize),
            })
            .collect()
    });

    TokenUsage {
        input_tokens: usage["input_tokens"].as_u64().unwrap_or(0) as usize,
        output_tokens: usage["output_tokens"].as_u64().unwrap_or(0) as usize,
        cache_read_tokens: usage["cache_read_input_tokens"]
            .as_u64()
            .map(|n| n as usize),
        cache_creation_tokens: usage["cache_creation_input_tokens"]
            .as_u64()
            .map(|n| n as usize),
        reasoning_tokens: None,
        iterations,
    }
}

/// Map an Anthropic `stop_reason` string to a [`StopReason`].
fn parse_stop_reason(reason: &str) -> StopReason {
    match reason {
        "end_turn" => StopReason::EndTurn,
        "tool_use" => StopReason::ToolUse,
        "max_tokens" => StopReason::MaxTokens,
        "stop_sequence" => StopReason::StopSequence,
        "compaction" => StopReason::Compaction,
        _ => StopReason::EndTurn,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
