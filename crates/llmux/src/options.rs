use serde::{Deserialize, Serialize};

/// Optional generation parameters. Unset fields are left out of the wire body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
    pub stop_sequences: Option<Vec<String>>,
    pub seed: Option<i64>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub thinking_budget: Option<u32>,
    pub reasoning_effort: Option<String>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stop_sequences<I, S>(mut self, stops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_sequences = Some(stops.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_frequency_penalty(mut self, penalty: f32) -> Self {
        self.frequency_penalty = Some(penalty);
        self
    }

    pub fn with_presence_penalty(mut self, penalty: f32) -> Self {
        self.presence_penalty = Some(penalty);
        self
    }

    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    pub fn with_reasoning_effort<S: Into<String>>(mut self, effort: S) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }

    /// Names of every field that is set, in table order
    pub fn set_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.temperature.is_some() {
            fields.push("temperature");
        }
        if self.top_p.is_some() {
            fields.push("top_p");
        }
        if self.top_k.is_some() {
            fields.push("top_k");
        }
        if self.max_tokens.is_some() {
            fields.push("max_tokens");
        }
        if self.stop_sequences.is_some() {
            fields.push("stop_sequences");
        }
        if self.seed.is_some() {
            fields.push("seed");
        }
        if self.frequency_penalty.is_some() {
            fields.push("frequency_penalty");
        }
        if self.presence_penalty.is_some() {
            fields.push("presence_penalty");
        }
        if self.thinking_budget.is_some() {
            fields.push("thinking_budget");
        }
        if self.reasoning_effort.is_some() {
            fields.push("reasoning_effort");
        }
        fields
    }

    /// Fill unset fields from `defaults`, keeping only the ones `accept` allows
    pub fn merged_with<F>(&self, defaults: &GenerationOptions, accept: F) -> GenerationOptions
    where
        F: Fn(&str) -> bool,
    {
        fn pick<T: Clone>(own: &Option<T>, default: &Option<T>, allowed: bool) -> Option<T> {
            match own {
                Some(value) => Some(value.clone()),
                None if allowed => default.clone(),
                None => None,
            }
        }

        GenerationOptions {
            temperature: pick(&self.temperature, &defaults.temperature, accept("temperature")),
            top_p: pick(&self.top_p, &defaults.top_p, accept("top_p")),
            top_k: pick(&self.top_k, &defaults.top_k, accept("top_k")),
            max_tokens: pick(&self.max_tokens, &defaults.max_tokens, accept("max_tokens")),
            stop_sequences: pick(
                &self.stop_sequences,
                &defaults.stop_sequences,
                accept("stop_sequences"),
            ),
            seed: pick(&self.seed, &defaults.seed, accept("seed")),
            frequency_penalty: pick(
                &self.frequency_penalty,
                &defaults.frequency_penalty,
                accept("frequency_penalty"),
            ),
            presence_penalty: pick(
                &self.presence_penalty,
                &defaults.presence_penalty,
                accept("presence_penalty"),
            ),
            thinking_budget: pick(
                &self.thinking_budget,
                &defaults.thinking_budget,
                accept("thinking_budget"),
            ),
            reasoning_effort: pick(
                &self.reasoning_effort,
                &defaults.reasoning_effort,
                accept("reasoning_effort"),
            ),
        }
    }
}
