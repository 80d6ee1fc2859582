//! Which optional generation parameters each provider accepts.
//!
//! Checked before any network call so an unsupported option never reaches a vendor.

use crate::errors::{LlmError, LlmResult};
use crate::options::GenerationOptions;
use crate::providers::base::ProviderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub temperature: bool,
    pub top_p: bool,
    pub top_k: bool,
    pub max_tokens: bool,
    pub stop_sequences: bool,
    pub seed: bool,
    pub frequency_penalty: bool,
    pub presence_penalty: bool,
    pub thinking_budget: bool,
    pub reasoning_effort: bool,
    /// Allowed reasoning effort values, `None` when any value is passed through
    pub reasoning_effort_values: Option<&'static [&'static str]>,
}

pub static OPENAI: Capabilities = Capabilities {
    temperature: true,
    top_p: true,
    top_k: false,
    max_tokens: true,
    stop_sequences: true,
    seed: true,
    frequency_penalty: true,
    presence_penalty: true,
    thinking_budget: false,
    reasoning_effort: true,
    reasoning_effort_values: None,
};

pub static ANTHROPIC: Capabilities = Capabilities {
    temperature: true,
    top_p: true,
    top_k: true,
    max_tokens: true,
    stop_sequences: true,
    seed: false,
    frequency_penalty: false,
    presence_penalty: false,
    thinking_budget: true,
    reasoning_effort: false,
    reasoning_effort_values: None,
};

pub static GOOGLE: Capabilities = Capabilities {
    temperature: true,
    top_p: true,
    top_k: true,
    max_tokens: true,
    stop_sequences: true,
    seed: true,
    frequency_penalty: true,
    presence_penalty: true,
    thinking_budget: true,
    reasoning_effort: false,
    reasoning_effort_values: None,
};

pub static XAI: Capabilities = Capabilities {
    temperature: true,
    top_p: true,
    top_k: false,
    max_tokens: true,
    stop_sequences: true,
    seed: true,
    frequency_penalty: true,
    presence_penalty: true,
    thinking_budget: false,
    reasoning_effort: true,
    reasoning_effort_values: Some(&["low", "high"]),
};

impl Capabilities {
    pub fn for_kind(kind: ProviderKind) -> &'static Capabilities {
        match kind {
            ProviderKind::OpenAi => &OPENAI,
            ProviderKind::Anthropic => &ANTHROPIC,
            ProviderKind::Google => &GOOGLE,
            ProviderKind::Xai => &XAI,
        }
    }

    pub fn supports(&self, field: &str) -> bool {
        match field {
            "temperature" => self.temperature,
            "top_p" => self.top_p,
            "top_k" => self.top_k,
            "max_tokens" => self.max_tokens,
            "stop_sequences" => self.stop_sequences,
            "seed" => self.seed,
            "frequency_penalty" => self.frequency_penalty,
            "presence_penalty" => self.presence_penalty,
            "thinking_budget" => self.thinking_budget,
            "reasoning_effort" => self.reasoning_effort,
            _ => false,
        }
    }
}

/// Reject options the provider does not accept, naming the first offending field
pub fn validate_options(kind: ProviderKind, options: &GenerationOptions) -> LlmResult<()> {
    let capabilities = Capabilities::for_kind(kind);

    if let Some(field) = options
        .set_fields()
        .into_iter()
        .find(|field| !capabilities.supports(field))
    {
        return Err(LlmError::validation(
            field,
            format!("{} is not supported by {}", field, kind),
        ));
    }

    if let (Some(effort), Some(allowed)) = (
        options.reasoning_effort.as_deref(),
        capabilities.reasoning_effort_values,
    ) {
        if !allowed.contains(&effort) {
            return Err(LlmError::validation(
                "reasoning_effort",
                format!(
                    "{} only accepts {}, got '{}'",
                    kind,
                    allowed.join(" or "),
                    effort
                ),
            ));
        }
    }

    Ok(())
}
