use std::collections::HashSet;

use serde_json::{json, Map, Value};

use super::base::{json_u64, Completion};
use crate::errors::{LlmError, LlmResult};
use crate::models::message::{Message, MessageContent, ToolRequest};
use crate::models::request::Usage;
use crate::models::role::Role;
use crate::models::tool::ToolCall;
use crate::options::GenerationOptions;
use crate::tool::Tool;

/// Convert internal Message format to the OpenAI chat completion message specification.
///
/// The system prompt becomes the first message. Tool results are lifted out of the user
/// turn into one `tool` role message each, linked by `tool_call_id`.
pub fn messages_to_openai_spec(system: Option<&str>, messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    if let Some(system) = system {
        messages_spec.push(json!({
            "role": "system",
            "content": system
        }));
    }

    for message in messages {
        match message.role {
            Role::Assistant => messages_spec.push(assistant_to_openai_spec(message)),
            Role::User => {
                for response in message.tool_responses() {
                    messages_spec.push(json!({
                        "role": "tool",
                        "tool_call_id": response.id,
                        "content": response.output
                    }));
                }
                if let Some(content) = user_content_to_openai_spec(message) {
                    messages_spec.push(json!({
                        "role": "user",
                        "content": content
                    }));
                }
            }
        }
    }

    messages_spec
}

fn assistant_to_openai_spec(message: &Message) -> Value {
    let text = message.text();
    let mut converted = json!({
        "role": "assistant",
        "content": if text.is_empty() { Value::Null } else { json!(text) }
    });

    let tool_calls: Vec<Value> = message
        .tool_requests()
        .map(|request| {
            json!({
                "id": request.id,
                "type": "function",
                "function": {
                    "name": request.tool_call.name,
                    "arguments": arguments_to_string(&request.tool_call.arguments),
                }
            })
        })
        .collect();
    if !tool_calls.is_empty() {
        converted["tool_calls"] = json!(tool_calls);
    }
    converted
}

/// A plain string when the turn is a single text block, an array of parts otherwise
fn user_content_to_openai_spec(message: &Message) -> Option<Value> {
    let mut parts = Vec::new();
    for content in &message.content {
        match content {
            MessageContent::Text(text) if !text.text.is_empty() => {
                parts.push(json!({"type": "text", "text": text.text}));
            }
            MessageContent::Image(image) => {
                parts.push(json!({
                    "type": "image_url",
                    "image_url": {"url": image.as_url()}
                }));
            }
            MessageContent::File(file) => {
                parts.push(json!({
                    "type": "file",
                    "file": {"file_id": file.id}
                }));
            }
            _ => {}
        }
    }

    match parts.as_slice() {
        [] => None,
        [only] if only["type"] == "text" => Some(only["text"].clone()),
        _ => Some(Value::Array(parts)),
    }
}

fn arguments_to_string(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    }
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> LlmResult<Vec<Value>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(LlmError::validation(
                "tools",
                format!("duplicate tool name: {}", tool.name),
            ));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            }
        }));
    }

    Ok(result)
}

/// The native structured output field shared by openai and xai
pub fn openai_response_format(schema: &Value, strict: bool) -> Value {
    let mut json_schema = json!({
        "name": "response",
        "schema": schema,
    });
    if strict {
        json_schema["strict"] = json!(true);
    }
    json!({"type": "json_schema", "json_schema": json_schema})
}

/// Copy the set options onto an openai style payload
pub fn insert_openai_options(
    payload: &mut Map<String, Value>,
    options: &GenerationOptions,
    max_tokens_key: &str,
) {
    if let Some(temp) = options.temperature {
        payload.insert("temperature".to_string(), json!(temp));
    }
    if let Some(top_p) = options.top_p {
        payload.insert("top_p".to_string(), json!(top_p));
    }
    if let Some(tokens) = options.max_tokens {
        payload.insert(max_tokens_key.to_string(), json!(tokens));
    }
    if let Some(stops) = &options.stop_sequences {
        payload.insert("stop".to_string(), json!(stops));
    }
    if let Some(seed) = options.seed {
        payload.insert("seed".to_string(), json!(seed));
    }
    if let Some(penalty) = options.frequency_penalty {
        payload.insert("frequency_penalty".to_string(), json!(penalty));
    }
    if let Some(penalty) = options.presence_penalty {
        payload.insert("presence_penalty".to_string(), json!(penalty));
    }
    if let Some(effort) = &options.reasoning_effort {
        payload.insert("reasoning_effort".to_string(), json!(effort));
    }
}

/// Convert an openai style chat completion into text, tool calls and usage
pub fn openai_response_to_completion(response: &Value) -> LlmResult<Completion> {
    let message = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| LlmError::Decode("response has no choices[0].message".to_string()))?;

    let text = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            let id = call["id"].as_str().unwrap_or_default().to_string();
            let name = call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let raw = call["function"]["arguments"].as_str().unwrap_or("{}");
            let arguments = if raw.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str::<Value>(raw).unwrap_or_else(|_| json!(raw))
            };
            tool_calls.push(ToolRequest {
                id,
                tool_call: ToolCall::new(name, arguments),
            });
        }
    }

    let usage = response
        .get("usage")
        .map(|u| Usage::new(json_u64(u, "prompt_tokens"), json_u64(u, "completion_tokens")))
        .unwrap_or_default();

    Ok(Completion {
        text,
        tool_calls,
        usage,
        ..Default::default()
    })
}

/// Merge consecutive turns with the same role, for vendors that require alternation
pub fn merge_consecutive_roles(messages: &[Message]) -> Vec<Message> {
    let mut merged: Vec<Message> = Vec::with_capacity(messages.len());
    for message in messages {
        match merged.last_mut() {
            Some(last) if last.role == message.role => {
                last.content.extend(message.content.iter().cloned());
            }
            _ => merged.push(message.clone()),
        }
    }
    merged
}
