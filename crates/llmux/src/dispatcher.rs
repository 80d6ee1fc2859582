use std::fmt;
use std::path::Path;
use std::sync::Arc;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::capabilities::{validate_options, Capabilities};
use crate::configuration::Settings;
use crate::errors::{LlmError, LlmResult};
use crate::models::content::File;
use crate::models::request::{Request, Response};
use crate::options::GenerationOptions;
use crate::providers::base::{Adapter, Provider};
use crate::providers::factory::get_adapter;

/// Runs before validation and may rewrite the request or abort the call
pub type BeforeHook = Arc<dyn Fn(&mut Request) -> LlmResult<()> + Send + Sync>;
/// Observes the outcome of an adapter call; it cannot change it
pub type AfterHook = Arc<dyn Fn(Result<&Response, &LlmError>) + Send + Sync>;

/// Entry point for one-shot prompts and file uploads.
///
/// Holds the shared HTTP client and the configured defaults. Cloning is cheap and
/// clones share the same connection pool.
#[derive(Clone, Default)]
pub struct Dispatcher {
    client: Client,
    settings: Settings,
    before: Option<BeforeHook>,
    after: Option<AfterHook>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_before_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Request) -> LlmResult<()> + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(hook));
        self
    }

    pub fn with_after_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(Result<&Response, &LlmError>) + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(hook));
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Validate the caller's options, then fill the gaps from the configured defaults
    pub fn resolve_options(
        &self,
        provider: &Provider,
        options: &GenerationOptions,
    ) -> LlmResult<GenerationOptions> {
        let kind = provider.kind()?;
        validate_options(kind, options)?;

        let capabilities = Capabilities::for_kind(kind);
        let merged = options.merged_with(&self.settings.defaults, |field| {
            capabilities.supports(field)
        });
        // A configured effort outside the provider's domain is dropped, not an error
        if options.reasoning_effort.is_none() && validate_options(kind, &merged).is_err() {
            return Ok(GenerationOptions {
                reasoning_effort: None,
                ..merged
            });
        }
        Ok(merged)
    }

    /// The adapter for a provider, sharing this dispatcher's client
    pub fn adapter(&self, provider: &Provider) -> LlmResult<Box<dyn Adapter>> {
        get_adapter(provider, self.client.clone())
    }

    /// Send a single request and return the provider's answer.
    ///
    /// Every validation step runs before any network traffic.
    pub async fn prompt(
        &self,
        provider: &Provider,
        mut request: Request,
        options: &GenerationOptions,
        cancel: &CancellationToken,
    ) -> LlmResult<Response> {
        if let Some(before) = &self.before {
            before(&mut request)?;
        }

        // key, then input, then provider name
        provider.validate_key()?;
        if !request.has_input() {
            return Err(LlmError::validation(
                "user",
                "a request needs either user text or messages",
            ));
        }
        let kind = provider.kind()?;
        let options = self.resolve_options(provider, options)?;
        let adapter = self.adapter(provider)?;

        tracing::debug!(
            provider = %kind,
            model = provider.model.as_deref().unwrap_or("default"),
            messages = request.messages.len(),
            "dispatching prompt"
        );
        let result = adapter.send(&request, &options, cancel).await;

        if let Some(after) = &self.after {
            after(result.as_ref());
        }
        result
    }

    /// Upload a local file to the provider, guessing its MIME type from the extension when not given
    pub async fn upload_file(
        &self,
        provider: &Provider,
        path: &Path,
        mime_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> LlmResult<File> {
        let kind = provider.validate()?;
        if !path.is_file() {
            return Err(LlmError::validation(
                "path",
                format!("{} is not a readable file", path.display()),
            ));
        }

        let mime_type = match mime_type {
            Some(mime) if !mime.is_empty() => mime.to_string(),
            _ => mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };

        tracing::debug!(provider = %kind, path = %path.display(), mime = %mime_type, "uploading file");
        self.adapter(provider)?
            .upload_file(path, &mime_type, cancel)
            .await
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("settings", &self.settings)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}
