use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::{LlmError, LlmResult};
use crate::models::content::File;
use crate::models::message::Message;
use crate::providers::base::{Adapter, Completion, Exchange, ProviderKind};

/// A mock adapter that plays back scripted completions and records what it was sent
#[derive(Clone)]
pub struct MockAdapter {
    responses: Arc<Mutex<Vec<LlmResult<Completion>>>>,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Vec<Message>>>>,
    systems: Arc<Mutex<Vec<Option<String>>>>,
}

impl MockAdapter {
    /// Create a new mock adapter with a sequence of completions
    pub fn new(responses: Vec<Completion>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<LlmResult<Completion>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
            systems: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The history passed on each call, in order
    pub fn histories(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }

    pub fn systems(&self) -> Vec<Option<String>> {
        self.systems.lock().unwrap().clone()
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn complete(
        &self,
        exchange: &Exchange<'_>,
        cancel: &CancellationToken,
    ) -> LlmResult<Completion> {
        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(exchange.messages.to_vec());
        self.systems
            .lock()
            .unwrap()
            .push(exchange.system.map(String::from));

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Plain empty answer once the script runs out
            Ok(Completion::default())
        } else {
            responses.remove(0)
        }
    }

    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        _cancel: &CancellationToken,
    ) -> LlmResult<File> {
        Ok(File::new(format!("file-{}", path.display()), mime_type))
    }
}
