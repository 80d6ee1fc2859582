use std::collections::HashSet;

use tokio_util::sync::CancellationToken;

use crate::dispatcher::Dispatcher;
use crate::errors::{LlmError, LlmResult};
use crate::memory::{memory_tools, AgentConfig, MemoryStore};
use crate::models::message::{Message, ToolRequest};
use crate::models::request::{Response, Usage};
use crate::options::GenerationOptions;
use crate::providers::base::{Adapter, Provider};
use crate::tool::Tool;

/// Configures and builds an [`Agent`]
pub struct AgentBuilder {
    provider: Provider,
    system_prompt: Option<String>,
    max_iterations: Option<usize>,
    options: GenerationOptions,
    memory: Option<AgentConfig>,
    dispatcher: Dispatcher,
    adapter: Option<Box<dyn Adapter>>,
}

impl AgentBuilder {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            system_prompt: None,
            max_iterations: None,
            options: GenerationOptions::default(),
            memory: None,
            dispatcher: Dispatcher::default(),
            adapter: None,
        }
    }

    pub fn system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Ceiling on model calls per `chat`. Defaults to the configured settings.
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn memory(mut self, config: AgentConfig) -> Self {
        self.memory = Some(config);
        self
    }

    /// Share a dispatcher's client and settings
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Use a specific adapter instead of the one selected for the provider
    pub fn adapter(mut self, adapter: Box<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn build(self) -> LlmResult<Agent> {
        self.provider.validate()?;
        let options = self
            .dispatcher
            .resolve_options(&self.provider, &self.options)?;

        let max_iterations = self
            .max_iterations
            .unwrap_or(self.dispatcher.settings().max_tool_iterations);
        if max_iterations == 0 {
            return Err(LlmError::validation(
                "max_iterations",
                "the agent needs at least one model call per chat",
            ));
        }

        let adapter = match self.adapter {
            Some(adapter) => adapter,
            None => self.dispatcher.adapter(&self.provider)?,
        };

        let mut agent = Agent {
            adapter,
            system_prompt: self.system_prompt.filter(|s| !s.is_empty()),
            options,
            max_iterations,
            tools: Vec::new(),
            history: Vec::new(),
            memory: None,
        };

        if let Some(config) = self.memory {
            let store = MemoryStore::from_config(&config)?;
            if config.expose_tools {
                for tool in memory_tools(&store) {
                    agent.add_tool(tool)?;
                }
            }
            agent.memory = Some((config, store));
        }

        Ok(agent)
    }
}

/// A stateful conversation with one provider that runs tools on the model's behalf.
///
/// History is append-only apart from [`Agent::reset`]. One agent holds one conversation;
/// `chat` takes `&mut self`, so parallel conversations need separate agents.
pub struct Agent {
    adapter: Box<dyn Adapter>,
    system_prompt: Option<String>,
    options: GenerationOptions,
    max_iterations: usize,
    tools: Vec<Tool>,
    history: Vec<Message>,
    memory: Option<(AgentConfig, MemoryStore)>,
}

impl Agent {
    pub fn builder(provider: Provider) -> AgentBuilder {
        AgentBuilder::new(provider)
    }

    /// Register a tool. Names must be valid and unique.
    pub fn add_tool(&mut self, tool: Tool) -> LlmResult<()> {
        tool.validate()?;
        if self.tools.iter().any(|t| t.name == tool.name) {
            return Err(LlmError::validation(
                "tool.name",
                format!("a tool named '{}' is already registered", tool.name),
            ));
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn memory(&self) -> Option<&MemoryStore> {
        self.memory.as_ref().map(|(_, store)| store)
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Forget the conversation. Tools, options and memory are kept.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Send a user message and keep calling the model until it stops asking for tools.
    ///
    /// The returned usage covers every model call made for this message. On error the
    /// history is left as it was at the point of failure.
    pub async fn chat<S: Into<String>>(
        &mut self,
        text: S,
        cancel: &CancellationToken,
    ) -> LlmResult<Response> {
        self.close_dangling_calls();
        self.history.push(Message::user().with_text(text));

        let mut usage = Usage::default();
        let mut iterations = 0;

        loop {
            if iterations >= self.max_iterations {
                return Err(LlmError::MaxToolIterations(self.max_iterations));
            }
            if cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }
            iterations += 1;

            let system = self.system_prompt()?;
            tracing::debug!(
                iteration = iterations,
                messages = self.history.len(),
                tools = self.tools.len(),
                "calling model"
            );
            let completion = self
                .adapter
                .send_with_tools(
                    &self.history,
                    system.as_deref(),
                    &self.tools,
                    &self.options,
                    cancel,
                )
                .await?;
            usage += completion.usage;

            if completion.tool_calls.is_empty() {
                self.history
                    .push(Message::assistant().with_text(completion.text.clone()));
                return Ok(Response {
                    text: completion.text,
                    usage,
                });
            }

            // signed reasoning has to precede the tool requests it produced
            let mut request_message = completion
                .thinking
                .into_iter()
                .fold(Message::assistant(), |message, block| message.with_content(block));
            if !completion.text.is_empty() {
                request_message = request_message.with_text(completion.text);
            }
            for request in &completion.tool_calls {
                request_message = request_message
                    .with_tool_request(request.id.clone(), request.tool_call.clone());
            }
            self.history.push(request_message);

            let results = self.execute_tools(&completion.tool_calls)?;
            self.history.push(results);
        }
    }

    /// Run every requested tool, in order, collecting the results into one user message
    fn execute_tools(&self, requests: &[ToolRequest]) -> LlmResult<Message> {
        // Resolve all names first so an unknown tool aborts before any handler runs
        let tools = requests
            .iter()
            .map(|request| {
                self.tools
                    .iter()
                    .find(|tool| tool.name == request.tool_call.name)
                    .ok_or_else(|| LlmError::ToolNotFound(request.tool_call.name.clone()))
            })
            .collect::<LlmResult<Vec<&Tool>>>()?;

        let mut message = Message::user();
        for (request, tool) in requests.iter().zip(tools) {
            tracing::debug!(tool = %tool.name, id = %request.id, "executing tool");
            let (output, is_error) = match tool.call(&request.tool_call.arguments) {
                Ok(output) => (output, false),
                Err(err) => (format!("error: {}", err), true),
            };
            message = message.with_tool_response(request.id.clone(), &tool.name, output, is_error);
        }
        Ok(message)
    }

    /// Give every tool request without a result an error result, so the next call is well formed
    fn close_dangling_calls(&mut self) {
        let answered: HashSet<&str> = self
            .history
            .iter()
            .flat_map(|m| m.tool_responses())
            .map(|r| r.id.as_str())
            .collect();

        let dangling: Vec<ToolRequest> = self
            .history
            .iter()
            .flat_map(|m| m.tool_requests())
            .filter(|r| !answered.contains(r.id.as_str()))
            .cloned()
            .collect();
        if dangling.is_empty() {
            return;
        }

        let mut message = Message::user();
        for request in dangling {
            message = message.with_tool_response(
                request.id,
                request.tool_call.name,
                "error: tool call was not completed",
                true,
            );
        }
        self.history.push(message);
    }

    fn system_prompt(&self) -> LlmResult<Option<String>> {
        let context = match &self.memory {
            Some((config, store)) if config.include_context => store.context()?,
            _ => None,
        };
        Ok(match (self.system_prompt.clone(), context) {
            (Some(prompt), Some(context)) => Some(format!("{}\n\n{}", prompt, context)),
            (prompt, None) => prompt,
            (None, context) => context,
        })
    }
}
