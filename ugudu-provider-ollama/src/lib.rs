#![deny(missing_docs)]
//! Ollama local model provider for ugudu-turn.
//!
//! Implements the [`ugudu_turn::Provider`] trait for Ollama's `/api/chat` endpoint.
//! Ollama runs models locally, so there are no auth headers and cost is always zero.

mod types;

use ugudu_turn::provider::{Provider, ProviderError};
use ugudu_turn::types::*;
use rust_decimal::Decimal;
use types::*;
use uuid::Uuid;

/// Ollama local model provider.
pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    keep_alive: Option<String>,
}

impl OllamaProvider {
    /// Create a new Ollama provider pointed at the default local endpoint.
    ///
    /// Defaults to `http://localhost:11434/api/chat`.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: "http://localhost:11434/api/chat".into(),
            keep_alive: None,
        }
    }

    /// Override the API URL (for remote Ollama instances or custom ports).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the `keep_alive` duration for how long Ollama keeps the model loaded.
    ///
    /// Examples: `"5m"`, `"0"` (unload immediately), `"-1"` (keep forever).
    pub fn with_keep_alive(mut self, duration: impl Into<String>) -> Self {
        self.keep_alive = Some(duration.into());
        self
    }

    fn build_request(&self, request: &ProviderRequest) -> OllamaRequest {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| "llama3.2:1b".into());

        let mut messages: Vec<OllamaMessage> = Vec::new();

        // System prompt becomes a system message.
        if let Some(ref system) = request.system {
            messages.push(OllamaMessage {
                role: "system".into(),
                content: system.clone(),
                tool_calls: None,
            });
        }

        // Map ProviderMessages to Ollama messages.
        for m in &request.messages {
            match m.role {
                Role::System => {
                    let text = extract_text(&m.content);
                    messages.push(OllamaMessage {
                        role: "system".into(),
                        content: text,
                        tool_calls: None,
                    });
                }
                Role::User => {
                    // Separate tool results from other content.
                    let mut tool_results = Vec::new();
                    let mut other_text = Vec::new();
                    for part in &m.content {
                        match part {
                            ContentPart::ToolResult { content, .. } => {
                                tool_results.push(content.clone());
                            }
                            ContentPart::Text { text } => {
                                other_text.push(text.clone());
                            }
                            _ => {}
                        }
                    }

                    // Emit tool result messages as role="tool".
                    for content in tool_results {
                        messages.push(OllamaMessage {
                            role: "tool".into(),
                            content,
                            tool_calls: None,
                        });
                    }

                    // Emit user message if there is text content.
                    if !other_text.is_empty() {
                        messages.push(OllamaMessage {
                            role: "user".into(),
                            content: other_text.join("\n"),
                            tool_calls: None,
                        });
                    }
                }
                Role::Assistant => {
                    // Check for tool use parts.
                    let mut tool_calls = Vec::new();
                    let mut text_parts = Vec::new();
                    for part in &m.content {
                        match part {
                            ContentPart::ToolUse { name, input, .. } => {
                                tool_calls.push(OllamaToolCall {
                                    function: OllamaFunctionCall {
                                        name: name.clone(),
                                        arguments: input.clone(),
                                    },
                                });
                            }
                            ContentPart::Text { text } => {
                                text_parts.push(text.clone());
                            }
                            _ => {}
                        }
                    }

                    let content = text_parts.join("\n");
                    let tool_calls_field = if tool_calls.is_empty() {
                        None
                    } else {
                        Some(tool_calls)
                    };

                    messages.push(OllamaMessage {
                        role: "assistant".into(),
                        content,
                        tool_calls: tool_calls_field,
                    });
                }
            }
        }

        let tools: Vec<OllamaTool> = request
            .tools
            .iter()
            .map(|t| OllamaTool {
                tool_type: "function".into(),
                function: OllamaFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone(),
                },
            })
            .collect();

        // Build options from temperature and max_tokens.
        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
                ..Default::default()
            })
        } else {
            None
        };

        OllamaRequest {
            model,
            messages,
            stream: false,
            tools,
            keep_alive: self.keep_alive.clone(),
            options,
        }
    }

    fn parse_response(&self, response: OllamaResponse) -> ProviderResponse {
        let mut content: Vec<ContentPart> = Vec::new();

        // Extract text content from the message.
        if !response.message.content.is_empty() {
            content.push(ContentPart::Text {
                text: response.message.content.clone(),
            });
        }

        // Extract tool calls, synthesizing UUIDs since Ollama does not provide IDs.
        let has_tool_calls = response
            .message
            .tool_calls
            .as_ref()
            .is_some_and(|tc| !tc.is_empty());

        if let Some(tool_calls) = &response.message.tool_calls {
            for tc in tool_calls {
                content.push(ContentPart::ToolUse {
                    id: Uuid::new_v4().to_string(),
                    name: tc.function.name.clone(),
                    input: tc.function.arguments.clone(),
                });
            }
        }

        // Determine stop reason.
        let stop_reason = if has_tool_calls {
            StopReason::ToolUse
        } else {
            match response.done_reason.as_deref() {
                Some("stop") => StopReason::EndTurn,
                Some("length") => StopReason::MaxTokens,
                _ => StopReason::EndTurn,
            }
        };

        // Map Ollama timing fields to token usage.
        let usage = TokenUsage {
            input_tokens: response.prompt_eval_count.unwrap_or(0),
            output_tokens: response.eval_count.unwrap_or(0),
            cache_read_tokens: None,
            cache_creation_tokens: None,
        };

        ProviderResponse {
            content,
            stop_reason,
            usage,
            model: response.model,
            cost: Some(Decimal::ZERO),
            truncated: None,
        }
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for OllamaProvider {
    fn complete(
        &self,
        request: ProviderRequest,
    ) -> impl std::future::Future<Output = Result<ProviderResponse, ProviderError>> + Send {
        let api_request = self.build_request(&request);
        let http_request = self
            .client
            .post(&self.api_url)
            .header("content-type", "application/json")
            .json(&api_request);

        async move {
            let http_response = http_request
                .send()
                .await
                .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

            let status = http_response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(ProviderError::RateLimited);
            }
            if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN
            {
                let body = http_response.text().await.unwrap_or_default();
                return Err(ProviderError::AuthFailed(body));
            }
            if !status.is_success() {
                let body = http_response.text().await.unwrap_or_default();
                return Err(ProviderError::RequestFailed(format!(
                    "HTTP {status}: {body}"
                )));
            }

            let api_response: OllamaResponse = http_response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

            Ok(self.parse_response(api_response))
        }
    }
}

fn extract_text(parts: &[ContentPart]) -> String {
    parts
        .iter()
        .filter_map(|p| match p {
            ContentPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
