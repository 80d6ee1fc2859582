use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::base::{execute, read_upload, Adapter, Completion, Exchange, Provider, ProviderKind};
use super::utils::{
    insert_openai_options, messages_to_openai_spec, openai_response_format,
    openai_response_to_completion, tools_to_openai_spec,
};
use crate::errors::{LlmError, LlmResult};
use crate::models::content::File;

pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OPENAI_MODEL: &str = "gpt-4o";

pub struct OpenAiAdapter {
    client: Client,
    host: String,
    api_key: String,
    model: String,
}

impl OpenAiAdapter {
    pub fn new(client: Client, provider: &Provider) -> Self {
        Self {
            client,
            host: provider.host_or(OPENAI_HOST).to_string(),
            api_key: provider.api_key.clone(),
            model: provider.model_or(OPENAI_MODEL).to_string(),
        }
    }

    pub fn build_body(&self, exchange: &Exchange<'_>) -> LlmResult<Value> {
        let messages = messages_to_openai_spec(exchange.system, exchange.messages);
        let tools_spec = tools_to_openai_spec(exchange.tools)?;

        let mut payload = json!({
            "model": self.model,
            "messages": messages
        });
        let object = payload
            .as_object_mut()
            .ok_or_else(|| LlmError::Decode("payload is not an object".to_string()))?;

        if !tools_spec.is_empty() {
            object.insert("tools".to_string(), json!(tools_spec));
        }
        if let Some(schema) = exchange.schema {
            object.insert(
                "response_format".to_string(),
                openai_response_format(schema, exchange.strict_schema),
            );
        }
        insert_openai_options(object, exchange.options, "max_completion_tokens");

        Ok(payload)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }
}

#[async_trait]
impl Adapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn complete(
        &self,
        exchange: &Exchange<'_>,
        cancel: &CancellationToken,
    ) -> LlmResult<Completion> {
        let payload = self.build_body(exchange)?;
        tracing::debug!(model = %self.model, tools = exchange.tools.len(), "openai chat completion");

        let request = self
            .client
            .post(self.url("/v1/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&payload);
        let response = execute(self.kind(), request, cancel).await?;

        openai_response_to_completion(&response)
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
        let form = Form::new().text("purpose", "user_data").part("file", part);

        let request = self
            .client
            .post(self.url("/v1/files"))
            .bearer_auth(&self.api_key)
            .multipart(form);
        let response = execute(self.kind(), request, cancel).await?;

        file_from_response(&response, mime_type, &name)
    }
}

/// Read the `{ "id": ..., "filename": ... }` object returned by openai style file endpoints
pub(crate) fn file_from_response(response: &Value, mime_type: &str, name: &str) -> LlmResult<File> {
    let id = response
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| LlmError::Decode("file upload response has no id".to_string()))?;
    let name = response
        .get("filename")
        .and_then(Value::as_str)
        .unwrap_or(name);
    Ok(File::new(id, mime_type).with_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Message;
    use crate::models::request::{Request, Usage};
    use crate::models::tool::ToolCall;
    use crate::options::GenerationOptions;
    use crate::tool::Tool;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(response_body: Value) -> (MockServer, OpenAiAdapter) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test_api_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let provider = Provider::new("openai", "test_api_key")
            .with_model("gpt-3.5-turbo")
            .with_base_url(mock_server.uri());
        let adapter = OpenAiAdapter::new(Client::new(), &provider);
        (mock_server, adapter)
    }

    #[tokio::test]
    async fn test_complete_basic() -> LlmResult<()> {
        let response_body = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello! How can I assist you today?",
                    "tool_calls": null
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 15,
                "total_tokens": 27
            }
        });

        let (_server, adapter) = setup_mock_server(response_body).await;

        let request = Request::new()
            .with_system("You are a helpful assistant.")
            .with_user("Hello?");
        let response = adapter
            .send(&request, &GenerationOptions::new(), &CancellationToken::new())
            .await?;

        assert_eq!(response.text, "Hello! How can I assist you today?");
        assert_eq!(response.usage, Usage::new(12, 15));
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_tool_request() -> LlmResult<()> {
        let response_body = json!({
            "id": "chatcmpl-tool",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_123",
                        "type": "function",
                        "function": {
                            "name": "get_weather",
                            "arguments": "{\"location\":\"San Francisco, CA\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {
                "prompt_tokens": 20,
                "completion_tokens": 15,
                "total_tokens": 35
            }
        });

        let (_server, adapter) = setup_mock_server(response_body).await;

        let tool = Tool::new(
            "get_weather",
            "Gets the current weather for a location",
            json!({
                "type": "object",
                "properties": {
                    "location": {
                        "type": "string",
                        "description": "The city and state, e.g. New York, NY"
                    }
                },
                "required": ["location"]
            }),
            |_| Ok("sunny".to_string()),
        );

        let history = vec![Message::user().with_text("What's the weather in San Francisco?")];
        let completion = adapter
            .send_with_tools(
                &history,
                Some("You are a helpful assistant."),
                &[tool],
                &GenerationOptions::new(),
                &CancellationToken::new(),
            )
            .await?;

        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(
            completion.tool_calls[0].tool_call,
            ToolCall::new("get_weather", json!({"location": "San Francisco, CA"}))
        );
        assert_eq!(completion.usage, Usage::new(20, 15));
        Ok(())
    }

    #[test]
    fn test_body_carries_schema_and_options() -> LlmResult<()> {
        let provider = Provider::new("openai", "key");
        let adapter = OpenAiAdapter::new(Client::new(), &provider);
        let messages = vec![Message::user().with_text("List three colors")];
        let schema = json!({"type": "object", "properties": {"colors": {"type": "array"}}});
        let options = GenerationOptions::new()
            .with_max_tokens(100)
            .with_seed(42)
            .with_reasoning_effort("low");

        let exchange = Exchange::new(&messages, &options).with_schema(Some(&schema));
        let body = adapter.build_body(&exchange)?;

        assert_eq!(body["model"], OPENAI_MODEL);
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["schema"], schema);
        assert!(body["response_format"]["json_schema"].get("strict").is_none());
        assert_eq!(body["max_completion_tokens"], 100);
        assert_eq!(body["seed"], 42);
        assert_eq!(body["reasoning_effort"], "low");
        assert!(body.get("tools").is_none());
        assert!(body.get("temperature").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_strict_schema_is_opt_in() -> LlmResult<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "response_format": {"json_schema": {"name": "response", "strict": true}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "{\"ok\":true}"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 7, "completion_tokens": 4, "total_tokens": 11}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = Provider::new("openai", "key").with_base_url(mock_server.uri());
        let schema = json!({
            "type": "object",
            "properties": {"ok": {"type": "boolean"}},
            "required": ["ok"],
            "additionalProperties": false
        });
        let response = OpenAiAdapter::new(Client::new(), &provider)
            .send(
                &Request::new()
                    .with_user("Are you ok?")
                    .with_schema(schema)
                    .with_strict_schema(true),
                &GenerationOptions::new(),
                &CancellationToken::new(),
            )
            .await?;

        assert_eq!(response.text, r#"{"ok":true}"#);
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_file() -> LlmResult<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "file-abc123",
                "object": "file",
                "filename": "notes.txt",
                "purpose": "user_data"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "remember the milk")?;

        let provider = Provider::new("openai", "key").with_base_url(mock_server.uri());
        let adapter = OpenAiAdapter::new(Client::new(), &provider);
        let file = adapter
            .upload_file(&path, "text/plain", &CancellationToken::new())
            .await?;

        assert_eq!(file.id, "file-abc123");
        assert_eq!(file.name.as_deref(), Some("notes.txt"));
        Ok(())
    }
}
