use llmux::{Agent, CancellationToken, LlmError, LlmResult, Provider, Tool, Usage};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn weather_tool() -> Tool {
    Tool::new(
        "get_weather",
        "Get the weather for a location",
        json!({
            "type": "object",
            "required": ["location"],
            "properties": {
                "location": {
                    "type": "string",
                    "description": "The city and state, e.g. San Francisco, CA"
                }
            }
        }),
        |args| match args["location"].as_str() {
            Some(location) => Ok(format!("Sunny in {}", location)),
            None => Err(anyhow::anyhow!("location is required")),
        },
    )
}

fn openai_tool_call(id: &str, arguments: &str, prompt: u64, completion: u64) -> Value {
    json!({
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": id,
                    "type": "function",
                    "function": {"name": "get_weather", "arguments": arguments}
                }]
            },
            "finish_reason": "tool_calls"
        }],
        "usage": {"prompt_tokens": prompt, "completion_tokens": completion}
    })
}

fn openai_text(text: &str, prompt: u64, completion: u64) -> Value {
    json!({
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": prompt, "completion_tokens": completion}
    })
}

async fn mount_once(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(1)
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_openai_agent_sums_usage_across_rounds() -> LlmResult<()> {
    let server = MockServer::start().await;
    mount_once(
        &server,
        "/v1/chat/completions",
        openai_tool_call("call_1", r#"{"location":"Boston, MA"}"#, 50, 10),
    )
    .await;
    // The second round must carry the tool result linked by id
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system"},
                {"role": "user"},
                {"role": "assistant"},
                {"role": "tool", "tool_call_id": "call_1", "content": "Sunny in Boston, MA"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_text("It is sunny.", 80, 6)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Provider::new("openai", "key").with_base_url(server.uri());
    let mut agent = Agent::builder(provider)
        .system_prompt("You are a weather assistant.")
        .build()?;
    agent.add_tool(weather_tool())?;

    let response = agent
        .chat("Weather in Boston?", &CancellationToken::new())
        .await?;

    assert_eq!(response.text, "It is sunny.");
    assert_eq!(response.usage, Usage::new(130, 16));
    assert_eq!(agent.history().len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_tool_error_is_sent_back_to_the_model() -> LlmResult<()> {
    let server = MockServer::start().await;
    mount_once(
        &server,
        "/v1/chat/completions",
        openai_tool_call("call_bad", r#"{"city":"Boston"}"#, 1, 1),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "user"},
                {"role": "assistant"},
                {"role": "tool", "tool_call_id": "call_bad", "content": "error: location is required"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_text("Which city?", 1, 1)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Provider::new("openai", "key").with_base_url(server.uri());
    let mut agent = Agent::builder(provider).build()?;
    agent.add_tool(weather_tool())?;

    let response = agent.chat("Weather?", &CancellationToken::new()).await?;
    assert_eq!(response.text, "Which city?");
    Ok(())
}

#[tokio::test]
async fn test_max_iterations_makes_exactly_that_many_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openai_tool_call("call_loop", r#"{"location":"Nowhere"}"#, 1, 1)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let provider = Provider::new("xai", "key").with_base_url(server.uri());
    let mut agent = Agent::builder(provider).max_iterations(3).build().unwrap();
    agent.add_tool(weather_tool()).unwrap();

    let err = agent
        .chat("Loop", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::MaxToolIterations(3)));
}

#[tokio::test]
async fn test_anthropic_agent_round_trip() -> LlmResult<()> {
    let server = MockServer::start().await;
    mount_once(
        &server,
        "/v1/messages",
        json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"location": "Oslo"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 30, "output_tokens": 12}
        }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "user"},
                {"role": "assistant"},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "toolu_1", "content": "Sunny in Oslo"}
                ]}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_2",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "Sunny."}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 60, "output_tokens": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Provider::new("anthropic", "key").with_base_url(server.uri());
    let mut agent = Agent::builder(provider).build()?;
    agent.add_tool(weather_tool())?;

    let response = agent.chat("Oslo weather?", &CancellationToken::new()).await?;
    assert_eq!(response.text, "Sunny.");
    assert_eq!(response.usage, Usage::new(90, 14));
    Ok(())
}

#[tokio::test]
async fn test_gemini_agent_round_trip() -> LlmResult<()> {
    let server = MockServer::start().await;
    let route = "/v1beta/models/gemini-2.5-flash:generateContent";
    mount_once(
        &server,
        route,
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "get_weather", "args": {"location": "Rome"}}}
                ]}
            }],
            "usageMetadata": {"promptTokenCount": 20, "candidatesTokenCount": 5}
        }),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(route))
        .and(body_partial_json(json!({
            "contents": [
                {"role": "user"},
                {"role": "model"},
                {"role": "user", "parts": [
                    {"functionResponse": {"name": "get_weather", "response": {"content": "Sunny in Rome"}}}
                ]}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Sunny in Rome."}]}}],
            "usageMetadata": {"promptTokenCount": 40, "candidatesTokenCount": 4}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Provider::new("gemini", "key").with_base_url(server.uri());
    let mut agent = Agent::builder(provider).build()?;
    agent.add_tool(weather_tool())?;

    let response = agent.chat("Rome weather?", &CancellationToken::new()).await?;
    assert_eq!(response.text, "Sunny in Rome.");
    assert_eq!(response.usage, Usage::new(60, 9));
    Ok(())
}
