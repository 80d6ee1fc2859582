use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use super::base::{
    execute, json_u64, read_upload, Adapter, Completion, Exchange, Provider, ProviderKind,
};
use super::utils::merge_consecutive_roles;
use crate::errors::{LlmError, LlmResult};
use crate::models::content::{File, ImageSource};
use crate::models::message::{Message, MessageContent, ToolRequest};
use crate::models::request::Usage;
use crate::models::role::Role;
use crate::models::tool::ToolCall;
use crate::options::GenerationOptions;
use crate::tool::Tool;

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const FILES_BETA: &str = "files-api-2025-04-14";
pub const STRUCTURED_OUTPUTS_BETA: &str = "structured-outputs-2025-11-13";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicAdapter {
    client: Client,
    host: String,
    api_key: String,
    model: String,
}

impl AnthropicAdapter {
    pub fn new(client: Client, provider: &Provider) -> Self {
        Self {
            client,
            host: provider.host_or(ANTHROPIC_HOST).to_string(),
            api_key: provider.api_key.clone(),
            model: provider.model_or(ANTHROPIC_MODEL).to_string(),
        }
    }

    pub fn headers(&self, exchange: &Exchange<'_>) -> LlmResult<HeaderMap> {
        let mut betas = Vec::new();
        let has_files = exchange
            .messages
            .iter()
            .flat_map(|m| &m.content)
            .any(|c| matches!(c, MessageContent::File(_)));
        if has_files {
            betas.push(FILES_BETA);
        }
        if exchange.schema.is_some() {
            betas.push(STRUCTURED_OUTPUTS_BETA);
        }
        self.base_headers(&betas)
    }

    fn base_headers(&self, betas: &[&str]) -> LlmResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| LlmError::validation("api_key", "not a valid header value"))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        if !betas.is_empty() {
            let value = HeaderValue::from_str(&betas.join(","))
                .map_err(|e| LlmError::Decode(e.to_string()))?;
            headers.insert("anthropic-beta", value);
        }
        Ok(headers)
    }

    pub fn build_body(&self, exchange: &Exchange<'_>) -> LlmResult<Value> {
        let mut payload = json!({
            "model": self.model,
            "messages": messages_to_anthropic_spec(exchange.messages),
        });
        let object = payload
            .as_object_mut()
            .ok_or_else(|| LlmError::Decode("payload is not an object".to_string()))?;

        if let Some(system) = exchange.system {
            object.insert("system".to_string(), json!(system));
        }
        if !exchange.tools.is_empty() {
            object.insert("tools".to_string(), json!(tools_to_anthropic_spec(exchange.tools)));
        }
        if let Some(schema) = exchange.schema {
            object.insert(
                "output_format".to_string(),
                json!({"type": "json_schema", "schema": schema}),
            );
        }
        insert_options(object, exchange.options);

        Ok(payload)
    }

    pub fn parse_response(response: &Value) -> LlmResult<Completion> {
        let blocks = response
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| LlmError::Decode("response has no content array".to_string()))?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut thinking = Vec::new();
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => text.push_str(block["text"].as_str().unwrap_or_default()),
                Some("tool_use") => tool_calls.push(ToolRequest {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    tool_call: ToolCall::new(
                        block["name"].as_str().unwrap_or_default(),
                        block.get("input").cloned().unwrap_or_else(|| json!({})),
                    ),
                }),
                Some("thinking") => thinking.push(MessageContent::thinking(
                    block["thinking"].as_str().unwrap_or_default(),
                    block["signature"].as_str().unwrap_or_default(),
                )),
                Some("redacted_thinking") => thinking.push(MessageContent::redacted_thinking(
                    block["data"].as_str().unwrap_or_default(),
                )),
                _ => {}
            }
        }

        let usage = response
            .get("usage")
            .map(|u| Usage::new(json_u64(u, "input_tokens"), json_u64(u, "output_tokens")))
            .unwrap_or_default();

        Ok(Completion {
            text,
            tool_calls,
            usage,
            thinking,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }
}

fn insert_options(payload: &mut Map<String, Value>, options: &GenerationOptions) {
    let mut max_tokens = options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
    if let Some(budget) = options.thinking_budget {
        // the budget is carved out of max_tokens and must stay below it
        max_tokens = max_tokens.max(budget.saturating_add(DEFAULT_MAX_TOKENS));
        payload.insert(
            "thinking".to_string(),
            json!({"type": "enabled", "budget_tokens": budget}),
        );
    }
    payload.insert("max_tokens".to_string(), json!(max_tokens));

    if let Some(temp) = options.temperature {
        payload.insert("temperature".to_string(), json!(temp));
    }
    if let Some(top_p) = options.top_p {
        payload.insert("top_p".to_string(), json!(top_p));
    }
    if let Some(top_k) = options.top_k {
        payload.insert("top_k".to_string(), json!(top_k));
    }
    if let Some(stops) = &options.stop_sequences {
        payload.insert("stop_sequences".to_string(), json!(stops));
    }
}

/// Convert internal messages to anthropic turns of content blocks
pub fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
    merge_consecutive_roles(messages)
        .iter()
        .filter_map(|message| {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };

            let mut blocks: Vec<Value> = message.content.iter().filter_map(content_to_block).collect();
            // tool results lead the user turn that answers a tool_use, thinking leads the assistant turn
            blocks.sort_by_key(|b| {
                !matches!(
                    b["type"].as_str(),
                    Some("tool_result" | "thinking" | "redacted_thinking")
                )
            });

            if blocks.is_empty() {
                None
            } else {
                Some(json!({"role": role, "content": blocks}))
            }
        })
        .collect()
}

fn content_to_block(content: &MessageContent) -> Option<Value> {
    match content {
        MessageContent::Text(text) if !text.text.is_empty() => {
            Some(json!({"type": "text", "text": text.text}))
        }
        MessageContent::Text(_) => None,
        MessageContent::Image(image) => Some(match image.source() {
            ImageSource::Inline { mime_type, data } => json!({
                "type": "image",
                "source": {"type": "base64", "media_type": mime_type, "data": data}
            }),
            ImageSource::Remote { url } => json!({
                "type": "image",
                "source": {"type": "url", "url": url}
            }),
        }),
        MessageContent::File(file) => Some(json!({
            "type": "document",
            "source": {"type": "file", "file_id": file.id}
        })),
        MessageContent::ToolRequest(request) => Some(json!({
            "type": "tool_use",
            "id": request.id,
            "name": request.tool_call.name,
            "input": if request.tool_call.arguments.is_object() {
                request.tool_call.arguments.clone()
            } else {
                json!({})
            },
        })),
        MessageContent::ToolResponse(response) => Some(json!({
            "type": "tool_result",
            "tool_use_id": response.id,
            "content": response.output,
            "is_error": response.is_error,
        })),
        MessageContent::Thinking(thinking) => Some(json!({
            "type": "thinking",
            "thinking": thinking.thinking,
            "signature": thinking.signature,
        })),
        MessageContent::RedactedThinking(redacted) => Some(json!({
            "type": "redacted_thinking",
            "data": redacted.data,
        })),
    }
}

pub fn tools_to_anthropic_spec(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.parameters,
            })
        })
        .collect()
}

#[async_trait]
impl Adapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn complete(
        &self,
        exchange: &Exchange<'_>,
        cancel: &CancellationToken,
    ) -> LlmResult<Completion> {
        let payload = self.build_body(exchange)?;
        let headers = self.headers(exchange)?;
        tracing::debug!(model = %self.model, tools = exchange.tools.len(), "anthropic messages");

        let request = self
            .client
            .post(self.url("/v1/messages"))
            .headers(headers)
            .json(&payload);
        let response = execute(self.kind(), request, cancel).await?;

        Self::parse_response(&response)
    }

    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        cancel: &CancellationToken,
    ) -> LlmResult<File> {
        let (name, bytes) = read_upload(path).await?;
        let part = Part::bytes(bytes)
            .file_name(name.clone())
            .mime_str(mime_type)?;

        let request = self
            .client
            .post(self.url("/v1/files"))
            .headers(self.base_headers(&[FILES_BETA])?)
            .multipart(Form::new().part("file", part));
        let response = execute(self.kind(), request, cancel).await?;

        let id = response
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| LlmError::Decode("file upload response has no id".to_string()))?;
        let mime_type = response
            .get("mime_type")
            .and_then(Value::as_str)
            .unwrap_or(mime_type);
        let name = response
            .get("filename")
            .and_then(Value::as_str)
            .unwrap_or(&name);
        Ok(File::new(id, mime_type).with_name(name))
    }
}
