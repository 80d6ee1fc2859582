use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::base::{execute, read_upload, Adapter, Completion, Exchange, Provider, ProviderKind};
use super::openai::file_from_response;
use super::utils::{
    insert_openai_options, messages_to_openai_spec, openai_response_format,
    openai_response_to_completion, tools_to_openai_spec,
};
use crate::errors::{LlmError, LlmResult};
use crate::models::content::File;

pub const XAI_HOST: &str = "https://api.x.ai";
pub const XAI_MODEL: &str = "grok-3-mini";

/// Grok speaks the openai chat completion dialect with its own host and option limits
pub struct XaiAdapter {
    client: Client,
    host: String,
    api_key: String,
    model: String,
}

impl XaiAdapter {
    pub fn new(client: Client, provider: &Provider) -> Self {
        Self {
            client,
            host: provider.host_or(XAI_HOST).to_string(),
            api_key: provider.api_key.clone(),
            model: provider.model_or(XAI_MODEL).to_string(),
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
            object.insert("tool_choice".to_string(), json!("auto"));
        }
        if let Some(schema) = exchange.schema {
            object.insert(
                "response_format".to_string(),
                openai_response_format(schema, exchange.strict_schema),
            );
        }
        insert_openai_options(object, exchange.options, "max_tokens");

        Ok(payload)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }
}

#[async_trait]
impl Adapter for XaiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Xai
    }

    async fn complete(
        &self,
        exchange: &Exchange<'_>,
        cancel: &CancellationToken,
    ) -> LlmResult<Completion> {
        let payload = self.build_body(exchange)?;
        tracing::debug!(model = %self.model, tools = exchange.tools.len(), "xai chat completion");

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
        let form = Form::new().part("file", part);

        let request = self
            .client
            .post(self.url("/v1/files"))
            .bearer_auth(&self.api_key)
            .multipart(form);
        let response = execute(self.kind(), request, cancel).await?;

        file_from_response(&response, mime_type, &name)
    }
}
