use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::base::{
    execute, json_u64, read_upload, send_checked, Adapter, Completion, Exchange, Provider,
    ProviderKind,
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

pub const GOOGLE_HOST: &str = "https://generativelanguage.googleapis.com";
pub const GOOGLE_MODEL: &str = "gemini-2.5-flash";

// Prefix for call ids made up locally; these are never sent back to google
const SYNTHETIC_ID_PREFIX: &str = "llmux_call_";

pub struct GoogleAdapter {
    client: Client,
    host: String,
    api_key: String,
    model: String,
}

impl GoogleAdapter {
    pub fn new(client: Client, provider: &Provider) -> Self {
        Self {
            client,
            host: provider.host_or(GOOGLE_HOST).to_string(),
            api_key: provider.api_key.clone(),
            model: provider.model_or(GOOGLE_MODEL).to_string(),
        }
    }

    pub fn build_body(&self, exchange: &Exchange<'_>) -> LlmResult<Value> {
        let mut payload = json!({
            "contents": messages_to_google_spec(exchange.messages),
        });
        let object = payload
            .as_object_mut()
            .ok_or_else(|| LlmError::Decode("payload is not an object".to_string()))?;

        if let Some(system) = exchange.system {
            object.insert(
                "systemInstruction".to_string(),
                json!({"parts": [{"text": system}]}),
            );
        }
        if !exchange.tools.is_empty() {
            object.insert(
                "tools".to_string(),
                json!([{"functionDeclarations": tools_to_google_spec(exchange.tools)}]),
            );
        }

        let config = generation_config(exchange.options, exchange.schema);
        if !config.is_empty() {
            object.insert("generationConfig".to_string(), Value::Object(config));
        }

        Ok(payload)
    }

    pub fn parse_response(response: &Value) -> LlmResult<Completion> {
        let Some(candidate) = response.get("candidates").and_then(|c| c.get(0)) else {
            let reason = response["promptFeedback"]["blockReason"]
                .as_str()
                .unwrap_or("no candidates returned");
            return Err(LlmError::Decode(format!("google returned no answer: {}", reason)));
        };

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let parts = candidate["content"]["parts"].as_array().cloned().unwrap_or_default();
        for part in &parts {
            if part.get("thought").and_then(Value::as_bool).unwrap_or(false) {
                continue;
            }
            if let Some(t) = part.get("text").and_then(Value::as_str) {
                text.push_str(t);
            }
            if let Some(call) = part.get("functionCall") {
                // google does not always issue call ids, results are then linked by name
                let id = call
                    .get("id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .map(String::from)
                    .unwrap_or_else(|| format!("{}{}", SYNTHETIC_ID_PREFIX, Uuid::new_v4().simple()));
                tool_calls.push(ToolRequest {
                    id,
                    tool_call: ToolCall::new(
                        call["name"].as_str().unwrap_or_default(),
                        call.get("args").cloned().unwrap_or_else(|| json!({})),
                    ),
                });
            }
        }

        let usage = response
            .get("usageMetadata")
            .map(|u| {
                Usage::new(
                    json_u64(u, "promptTokenCount"),
                    json_u64(u, "candidatesTokenCount") + json_u64(u, "thoughtsTokenCount"),
                )
            })
            .unwrap_or_default();

        Ok(Completion {
            text,
            tool_calls,
            usage,
            ..Default::default()
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }
}

fn generation_config(options: &GenerationOptions, schema: Option<&Value>) -> Map<String, Value> {
    let mut config = Map::new();
    if let Some(temp) = options.temperature {
        config.insert("temperature".to_string(), json!(temp));
    }
    if let Some(top_p) = options.top_p {
        config.insert("topP".to_string(), json!(top_p));
    }
    if let Some(top_k) = options.top_k {
        config.insert("topK".to_string(), json!(top_k));
    }
    if let Some(tokens) = options.max_tokens {
        config.insert("maxOutputTokens".to_string(), json!(tokens));
    }
    if let Some(stops) = &options.stop_sequences {
        config.insert("stopSequences".to_string(), json!(stops));
    }
    if let Some(seed) = options.seed {
        config.insert("seed".to_string(), json!(seed));
    }
    if let Some(penalty) = options.frequency_penalty {
        config.insert("frequencyPenalty".to_string(), json!(penalty));
    }
    if let Some(penalty) = options.presence_penalty {
        config.insert("presencePenalty".to_string(), json!(penalty));
    }
    if let Some(budget) = options.thinking_budget {
        config.insert("thinkingConfig".to_string(), json!({"thinkingBudget": budget}));
    }
    if let Some(schema) = schema {
        config.insert("responseMimeType".to_string(), json!("application/json"));
        config.insert("responseSchema".to_string(), schema.clone());
    }
    config
}

/// Convert internal messages to google `contents`, where the assistant is the `model` role
pub fn messages_to_google_spec(messages: &[Message]) -> Vec<Value> {
    merge_consecutive_roles(messages)
        .iter()
        .filter_map(|message| {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            let parts: Vec<Value> = message.content.iter().filter_map(content_to_part).collect();
            if parts.is_empty() {
                None
            } else {
                Some(json!({"role": role, "parts": parts}))
            }
        })
        .collect()
}

fn content_to_part(content: &MessageContent) -> Option<Value> {
    match content {
        MessageContent::Text(text) if text.text.is_empty() => None,
        MessageContent::Text(text) => Some(json!({"text": text.text})),
        MessageContent::Image(image) => Some(match image.source() {
            ImageSource::Inline { mime_type, data } => json!({
                "inlineData": {"mimeType": mime_type, "data": data}
            }),
            ImageSource::Remote { url } => json!({
                "fileData": {"mimeType": image.mime_type, "fileUri": url}
            }),
        }),
        MessageContent::File(file) => Some(json!({
            "fileData": {"mimeType": file.mime_type, "fileUri": file.id}
        })),
        MessageContent::ToolRequest(request) => {
            let mut call = json!({
                "name": request.tool_call.name,
                "args": request.tool_call.arguments,
            });
            insert_vendor_id(&mut call, &request.id);
            Some(json!({"functionCall": call}))
        }
        MessageContent::ToolResponse(response) => {
            let body = if response.is_error {
                json!({"error": response.output})
            } else {
                json!({"content": response.output})
            };
            let mut function_response = json!({"name": response.name, "response": body});
            insert_vendor_id(&mut function_response, &response.id);
            Some(json!({"functionResponse": function_response}))
        }
        // gemini thought signatures are not replayed
        MessageContent::Thinking(_) | MessageContent::RedactedThinking(_) => None,
    }
}

/// Echo an id google issued so parallel calls to one function stay paired
fn insert_vendor_id(part: &mut Value, id: &str) {
    if id.is_empty() || id.starts_with(SYNTHETIC_ID_PREFIX) {
        return;
    }
    if let Some(object) = part.as_object_mut() {
        object.insert("id".to_string(), json!(id));
    }
}

pub fn tools_to_google_spec(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            })
        })
        .collect()
}

#[async_trait]
impl Adapter for GoogleAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn complete(
        &self,
        exchange: &Exchange<'_>,
        cancel: &CancellationToken,
    ) -> LlmResult<Completion> {
        let payload = self.build_body(exchange)?;
        tracing::debug!(model = %self.model, tools = exchange.tools.len(), "google generateContent");

        let request = self
            .client
            .post(self.url(&format!("/v1beta/models/{}:generateContent", self.model)))
            .header("x-goog-api-key", &self.api_key)
            .json(&payload);
        let response = execute(self.kind(), request, cancel).await?;

        Self::parse_response(&response)
    }

    /// Resumable upload: start a session, then send the bytes and finalize in one go
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        cancel: &CancellationToken,
    ) -> LlmResult<File> {
        let (name, bytes) = read_upload(path).await?;

        let start = self
            .client
            .post(self.url("/upload/v1beta/files"))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({"file": {"display_name": name}}));
        let session = send_checked(self.kind(), start, cancel).await?;
        let upload_url = session
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| LlmError::Decode("upload session has no x-goog-upload-url".to_string()))?;

        let finish = self
            .client
            .post(upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes);
        let response = execute(self.kind(), finish, cancel).await?;

        let file = &response["file"];
        let uri = file
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| LlmError::Decode("file upload response has no uri".to_string()))?;
        let mime_type = file
            .get("mimeType")
            .and_then(Value::as_str)
            .unwrap_or(mime_type);
        Ok(File::new(uri, mime_type).with_name(name))
    }
}
