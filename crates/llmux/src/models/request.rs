use std::ops::AddAssign;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::{File, Image};
use super::message::{Message, MessageContent};
use super::role::Role;

/// Token counts for one or more round-trips
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u64,
    pub output: u64,
}

impl Usage {
    pub fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }

    pub fn total(&self) -> u64 {
        self.input + self.output
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.input += other.input;
        self.output += other.output;
    }
}

/// A single abstract call to a model.
///
/// Either `user` (a single turn) or `messages` (a conversation) carries the input. When
/// `messages` is non-empty it wins and `user` is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub system: Option<String>,
    pub user: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    /// JSON schema the answer must conform to, passed through the vendor's native field
    pub schema: Option<Value>,
    /// Ask openai and xai to enforce `schema` strictly. Strict mode rejects schemas
    /// with optional properties or without `additionalProperties: false`.
    #[serde(default)]
    pub strict_schema: bool,
    #[serde(default)]
    pub files: Vec<File>,
    #[serde(default)]
    pub images: Vec<Image>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system<S: Into<String>>(mut self, system: S) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_user<S: Into<String>>(mut self, user: S) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_strict_schema(mut self, strict: bool) -> Self {
        self.strict_schema = strict;
        self
    }

    pub fn with_file(mut self, file: File) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_image(mut self, image: Image) -> Self {
        self.images.push(image);
        self
    }

    pub fn has_input(&self) -> bool {
        !self.messages.is_empty() || self.user.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    /// Flatten the request into the conversation sent to an adapter.
    ///
    /// Files and images are attached to the last user turn, or to a new user turn when the
    /// conversation ends with the assistant.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = if self.messages.is_empty() {
            match &self.user {
                Some(user) => vec![Message::user().with_text(user.clone())],
                None => Vec::new(),
            }
        } else {
            self.messages.clone()
        };

        if self.files.is_empty() && self.images.is_empty() {
            return messages;
        }

        if messages.last().map(|m| m.role) != Some(Role::User) {
            messages.push(Message::user());
        }
        if let Some(last) = messages.last_mut() {
            last.content
                .extend(self.images.iter().cloned().map(MessageContent::Image));
            last.content
                .extend(self.files.iter().cloned().map(MessageContent::File));
        }
        messages
    }
}

/// The final answer of a call. Produced fresh and never mutated after return.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub text: String,
    pub usage: Usage,
}
