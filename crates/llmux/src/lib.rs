pub mod agent;
pub mod capabilities;
pub mod configuration;
pub mod dispatcher;
pub mod errors;
pub mod memory;
pub mod models;
pub mod options;
pub mod providers;
pub mod tool;

pub use agent::{Agent, AgentBuilder};
pub use configuration::Settings;
pub use dispatcher::Dispatcher;
pub use errors::{ApiError, LlmError, LlmResult};
pub use memory::{AgentConfig, MemoryStore};
pub use models::content::{File, Image};
pub use models::message::Message;
pub use models::request::{Request, Response, Usage};
pub use options::GenerationOptions;
pub use providers::base::{Provider, ProviderKind};
pub use tool::Tool;
pub use tokio_util::sync::CancellationToken;
