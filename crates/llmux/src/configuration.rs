use config::{Config, Environment};
use serde::Deserialize;

use crate::errors::{LlmError, LlmResult};
use crate::options::GenerationOptions;

pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 10;

/// Process-wide defaults, loaded once by the caller and handed to the dispatcher or agent
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub defaults: GenerationOptions,
    pub max_tool_iterations: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            defaults: GenerationOptions::default(),
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
        }
    }
}

// Flat shape of the LLMUX_* variables
#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    top_p: Option<f32>,
    #[serde(default)]
    top_k: Option<u32>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    seed: Option<i64>,
    #[serde(default)]
    frequency_penalty: Option<f32>,
    #[serde(default)]
    presence_penalty: Option<f32>,
    #[serde(default)]
    thinking_budget: Option<u32>,
    #[serde(default)]
    reasoning_effort: Option<String>,
    #[serde(default = "default_max_tool_iterations")]
    max_tool_iterations: usize,
}

fn default_max_tool_iterations() -> usize {
    DEFAULT_MAX_TOOL_ITERATIONS
}

impl Settings {
    /// Read settings from `LLMUX_*` environment variables
    pub fn from_env() -> LlmResult<Self> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("LLMUX")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()?;

        let raw: RawSettings = config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            LlmError::Config(err.to_string())
        })?;

        if raw.max_tool_iterations == 0 {
            return Err(LlmError::Config(
                "LLMUX_MAX_TOOL_ITERATIONS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            defaults: GenerationOptions {
                temperature: raw.temperature,
                top_p: raw.top_p,
                top_k: raw.top_k,
                max_tokens: raw.max_tokens,
                stop_sequences: None,
                seed: raw.seed,
                frequency_penalty: raw.frequency_penalty,
                presence_penalty: raw.presence_penalty,
                thinking_budget: raw.thinking_budget,
                reasoning_effort: raw.reasoning_effort,
            },
            max_tool_iterations: raw.max_tool_iterations,
        })
    }

    pub fn with_defaults(mut self, defaults: GenerationOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_max_tool_iterations(mut self, max: usize) -> Self {
        self.max_tool_iterations = max;
        self
    }
}
