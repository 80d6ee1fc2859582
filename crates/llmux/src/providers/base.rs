use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::EnumIter;
use tokio_util::sync::CancellationToken;

use super::errors::classify;
use crate::errors::{LlmError, LlmResult};
use crate::models::content::File;
use crate::models::message::{Message, MessageContent, ToolRequest};
use crate::models::request::{Request, Response, Usage};
use crate::options::GenerationOptions;
use crate::tool::Tool;

/// The closed set of vendors an adapter exists for
#[derive(EnumIter, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Google,
    Xai,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::Xai => "xai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "google" | "gemini" => Ok(ProviderKind::Google),
            "xai" | "grok" => Ok(ProviderKind::Xai),
            _ => Err(LlmError::validation(
                "provider",
                format!("unknown provider '{}'", name),
            )),
        }
    }
}

/// One vendor API identity, passed by value on every call
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Provider {
    pub fn new<N: Into<String>, K: Into<String>>(name: N, api_key: K) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.into(),
            model: None,
            base_url: None,
        }
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn kind(&self) -> LlmResult<ProviderKind> {
        self.name.parse()
    }

    pub fn validate_key(&self) -> LlmResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::validation(
                "api_key",
                format!("an API key is required for provider '{}'", self.name),
            ));
        }
        Ok(())
    }

    /// Check the identity is usable without touching the network
    pub fn validate(&self) -> LlmResult<ProviderKind> {
        self.validate_key()?;
        self.kind()
    }

    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model.as_deref().filter(|m| !m.is_empty()).unwrap_or(default)
    }

    pub fn host_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(default)
            .trim_end_matches('/')
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Everything an adapter needs to build one vendor request
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    pub system: Option<&'a str>,
    pub messages: &'a [Message],
    pub tools: &'a [Tool],
    pub schema: Option<&'a Value>,
    pub strict_schema: bool,
    pub options: &'a GenerationOptions,
}

impl<'a> Exchange<'a> {
    pub fn new(messages: &'a [Message], options: &'a GenerationOptions) -> Self {
        Self {
            system: None,
            messages,
            tools: &[],
            schema: None,
            strict_schema: false,
            options,
        }
    }

    pub fn with_system(mut self, system: Option<&'a str>) -> Self {
        self.system = system.filter(|s| !s.is_empty());
        self
    }

    pub fn with_tools(mut self, tools: &'a [Tool]) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_schema(mut self, schema: Option<&'a Value>) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_strict_schema(mut self, strict: bool) -> Self {
        self.strict_schema = strict;
        self
    }
}

/// One model turn as seen by the agent: final text and any pending tool calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub tool_calls: Vec<ToolRequest>,
    /// Reasoning blocks the vendor needs back alongside the tool calls, in order
    pub thinking: Vec<MessageContent>,
    pub usage: Usage,
}

/// Per-vendor translator between the abstract model and one wire protocol
#[async_trait]
pub trait Adapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Perform one model round-trip
    async fn complete(
        &self,
        exchange: &Exchange<'_>,
        cancel: &CancellationToken,
    ) -> LlmResult<Completion>;

    /// Upload a local file and return the provider's handle to it
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        cancel: &CancellationToken,
    ) -> LlmResult<File>;

    /// Send a plain request, without tools
    async fn send(
        &self,
        request: &Request,
        options: &GenerationOptions,
        cancel: &CancellationToken,
    ) -> LlmResult<Response> {
        let messages = request.to_messages();
        let exchange = Exchange::new(&messages, options)
            .with_system(request.system.as_deref())
            .with_schema(request.schema.as_ref())
            .with_strict_schema(request.strict_schema);
        let completion = self.complete(&exchange, cancel).await?;
        Ok(Response {
            text: completion.text,
            usage: completion.usage,
        })
    }

    /// Send a conversation with tools, surfacing any tool calls the model requested
    async fn send_with_tools(
        &self,
        history: &[Message],
        system: Option<&str>,
        tools: &[Tool],
        options: &GenerationOptions,
        cancel: &CancellationToken,
    ) -> LlmResult<Completion> {
        let exchange = Exchange::new(history, options)
            .with_system(system)
            .with_tools(tools);
        self.complete(&exchange, cancel).await
    }
}

/// Send a prepared request, returning the response only when it succeeded.
///
/// Any status of 400 or above is handed to the classifier rather than parsed as success.
pub(crate) async fn send_checked(
    kind: ProviderKind,
    request: RequestBuilder,
    cancel: &CancellationToken,
) -> LlmResult<reqwest::Response> {
    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(LlmError::Cancelled),
        response = request.send() => response?,
    };

    let status = response.status().as_u16();
    if status < 400 {
        return Ok(response);
    }

    let headers = response.headers().clone();
    let text = read_text(response, cancel).await?;
    Err(classify(kind, status, &text, &headers).into())
}

/// Send a prepared request and decode the JSON body
pub(crate) async fn execute(
    kind: ProviderKind,
    request: RequestBuilder,
    cancel: &CancellationToken,
) -> LlmResult<Value> {
    let response = send_checked(kind, request, cancel).await?;
    let status = response.status().as_u16();
    let text = read_text(response, cancel).await?;
    tracing::trace!(provider = %kind, status, bytes = text.len(), "received response");

    serde_json::from_str(&text).map_err(|e| {
        let sample: String = text.chars().take(200).collect();
        LlmError::Decode(format!("{} response was not JSON ({}): {}", kind, e, sample))
    })
}

async fn read_text(response: reqwest::Response, cancel: &CancellationToken) -> LlmResult<String> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LlmError::Cancelled),
        text = response.text() => Ok(text?),
    }
}

/// Read a file for upload, returning its file name and bytes
pub(crate) async fn read_upload(path: &Path) -> LlmResult<(String, Vec<u8>)> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok((name, bytes))
}

pub(crate) fn json_u64(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("Claude".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!("gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Google);
        assert_eq!(" grok ".parse::<ProviderKind>().unwrap(), ProviderKind::Xai);

        let err = "mistral".parse::<ProviderKind>().unwrap_err();
        assert_eq!(err.field(), Some("provider"));
    }

    #[test]
    fn test_display_round_trips() {
        for kind in ProviderKind::iter() {
            assert_eq!(kind.to_string().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_provider_validation() {
        let err = Provider::new("openai", " ").validate().unwrap_err();
        assert_eq!(err.field(), Some("api_key"));

        let err = Provider::new("nope", "key").validate().unwrap_err();
        assert_eq!(err.field(), Some("provider"));

        assert_eq!(
            Provider::new("xai", "key").validate().unwrap(),
            ProviderKind::Xai
        );
    }

    #[test]
    fn test_overrides() {
        let provider = Provider::new("openai", "key")
            .with_model("gpt-4o-mini")
            .with_base_url("http://localhost:8080/");
        assert_eq!(provider.model_or("gpt-4o"), "gpt-4o-mini");
        assert_eq!(provider.host_or("https://api.openai.com"), "http://localhost:8080");
        assert!(!format!("{:?}", provider).contains("key\""));
    }
}
