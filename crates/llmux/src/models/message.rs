use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::content::{File, Image, RedactedThinkingContent, TextContent, ThinkingContent};
use super::role::Role;
use super::tool::ToolCall;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub tool_call: ToolCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// The id of the originating tool request
    pub id: String,
    /// Name of the tool that produced the output. Google links results by name, not id.
    pub name: String,
    pub output: String,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
/// Content passed inside a message, which can be both simple content and tool content
pub enum MessageContent {
    Text(TextContent),
    Image(Image),
    File(File),
    ToolRequest(ToolRequest),
    ToolResponse(ToolResponse),
    Thinking(ThinkingContent),
    RedactedThinking(RedactedThinkingContent),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent { text: text.into() })
    }

    pub fn tool_request<S: Into<String>>(id: S, tool_call: ToolCall) -> Self {
        MessageContent::ToolRequest(ToolRequest {
            id: id.into(),
            tool_call,
        })
    }

    pub fn tool_response<I, N, O>(id: I, name: N, output: O, is_error: bool) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        O: Into<String>,
    {
        MessageContent::ToolResponse(ToolResponse {
            id: id.into(),
            name: name.into(),
            output: output.into(),
            is_error,
        })
    }

    pub fn thinking<T: Into<String>, S: Into<String>>(thinking: T, signature: S) -> Self {
        MessageContent::Thinking(ThinkingContent {
            thinking: thinking.into(),
            signature: signature.into(),
        })
    }

    pub fn redacted_thinking<S: Into<String>>(data: S) -> Self {
        MessageContent::RedactedThinking(RedactedThinkingContent { data: data.into() })
    }

    /// True for reasoning blocks, signed or redacted
    pub fn is_thinking(&self) -> bool {
        matches!(
            self,
            MessageContent::Thinking(_) | MessageContent::RedactedThinking(_)
        )
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        if let MessageContent::ToolRequest(ref tool_request) = self {
            Some(tool_request)
        } else {
            None
        }
    }

    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        if let MessageContent::ToolResponse(ref tool_response) = self {
            Some(tool_response)
        } else {
            None
        }
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: Vec<MessageContent>,
}

impl Message {
    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Message {
            role: Role::User,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Message {
            role: Role::Assistant,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    pub fn with_image(self, image: Image) -> Self {
        self.with_content(MessageContent::Image(image))
    }

    pub fn with_file(self, file: File) -> Self {
        self.with_content(MessageContent::File(file))
    }

    /// Add a tool request to the message
    pub fn with_tool_request<S: Into<String>>(self, id: S, tool_call: ToolCall) -> Self {
        self.with_content(MessageContent::tool_request(id, tool_call))
    }

    /// Add a tool response to the message
    pub fn with_tool_response<I, N, O>(self, id: I, name: N, output: O, is_error: bool) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        O: Into<String>,
    {
        self.with_content(MessageContent::tool_response(id, name, output, is_error))
    }

    /// Concatenated text of every text block
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(MessageContent::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_requests(&self) -> impl Iterator<Item = &ToolRequest> {
        self.content.iter().filter_map(MessageContent::as_tool_request)
    }

    pub fn tool_responses(&self) -> impl Iterator<Item = &ToolResponse> {
        self.content.iter().filter_map(MessageContent::as_tool_response)
    }

    pub fn has_tool_requests(&self) -> bool {
        self.tool_requests().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_builders() {
        let message = Message::assistant()
            .with_text("Let me check. ")
            .with_text("One moment.")
            .with_tool_request("call_1", ToolCall::new("get_weather", json!({"city": "Oslo"})));

        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.text(), "Let me check. One moment.");
        assert!(message.has_tool_requests());
        let request = message.tool_requests().next().unwrap();
        assert_eq!(request.id, "call_1");
        assert_eq!(request.tool_call.arguments["city"], "Oslo");
    }

    #[test]
    fn test_content_serialization_is_tagged() {
        let content = MessageContent::tool_response("call_1", "get_weather", "sunny", false);
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value["type"], "toolResponse");
        assert_eq!(value["id"], "call_1");
        assert_eq!(value["output"], "sunny");
    }

    #[test]
    fn test_thinking_is_not_text() {
        let message = Message::assistant()
            .with_content(MessageContent::thinking("2 + 2 is 4", "sig_abc"))
            .with_text("4");

        assert_eq!(message.text(), "4");
        assert!(message.content[0].is_thinking());
        let value = serde_json::to_value(&message.content[0]).unwrap();
        assert_eq!(value["type"], "thinking");
        assert_eq!(value["signature"], "sig_abc");
    }
}
