use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;

use super::base::ProviderKind;
use crate::errors::ApiError;

/// Map a failed vendor response onto the unified error.
///
/// Retryability depends only on the status: 429 and every 5xx. The message is never empty;
/// when the vendor envelope cannot be read it falls back to the raw body.
pub fn classify(kind: ProviderKind, status: u16, body: &str, headers: &HeaderMap) -> ApiError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let (vendor_type, message) = parsed
        .as_ref()
        .map(|json| match kind {
            ProviderKind::OpenAi => openai_envelope(json),
            ProviderKind::Xai => xai_envelope(json),
            ProviderKind::Anthropic => anthropic_envelope(json),
            ProviderKind::Google => google_envelope(json),
        })
        .unwrap_or((None, None));

    let message = message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback_message(status, body));

    ApiError {
        provider: kind,
        status_code: status,
        vendor_type: vendor_type.unwrap_or_default(),
        message,
        retryable: is_retryable(status),
        retry_after: retry_after(headers),
    }
}

pub fn is_retryable(status: u16) -> bool {
    status == 429 || status >= 500
}

/// `Retry-After` in whole seconds; anything else (absent, HTTP date, garbage) is zero
pub fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::ZERO)
}

fn fallback_message(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        body.to_string()
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(String::from)
}

// { "error": { "message": "...", "type": "...", "code": "..." } }
fn openai_envelope(json: &Value) -> (Option<String>, Option<String>) {
    let Some(error) = json.get("error").filter(|e| e.is_object()) else {
        return (None, None);
    };
    let vendor_type = str_field(error, "type").or_else(|| str_field(error, "code"));
    (vendor_type, str_field(error, "message"))
}

// xai answers either in the openai shape or as { "code": "...", "error": "..." }
fn xai_envelope(json: &Value) -> (Option<String>, Option<String>) {
    match json.get("error") {
        Some(Value::String(message)) => (str_field(json, "code"), Some(message.clone())),
        _ => openai_envelope(json),
    }
}

// { "type": "error", "error": { "type": "...", "message": "..." } }
fn anthropic_envelope(json: &Value) -> (Option<String>, Option<String>) {
    match json.get("error") {
        Some(error) => (str_field(error, "type"), str_field(error, "message")),
        None => (None, None),
    }
}

// { "error": { "code": 400, "message": "...", "status": "INVALID_ARGUMENT" } }
fn google_envelope(json: &Value) -> (Option<String>, Option<String>) {
    // errors from the batch endpoints arrive wrapped in a one element array
    let json = json.as_array().and_then(|a| a.first()).unwrap_or(json);
    match json.get("error") {
        Some(error) => (str_field(error, "status"), str_field(error, "message")),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use strum::IntoEnumIterator;

    fn headers_with_retry_after(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_429_is_always_retryable() {
        for kind in ProviderKind::iter() {
            for body in ["", "not json", r#"{"error":{"message":"slow down"}}"#] {
                let err = classify(kind, 429, body, &HeaderMap::new());
                assert!(err.retryable, "{} {:?}", kind, body);
            }
        }
    }

    #[test]
    fn test_400_is_never_retryable() {
        for kind in ProviderKind::iter() {
            let err = classify(kind, 400, "{}", &HeaderMap::new());
            assert!(!err.retryable);
            assert_eq!(err.status_code, 400);
        }
    }

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(is_retryable(500));
        assert!(is_retryable(503));
        assert!(is_retryable(529));
        assert!(!is_retryable(401));
        assert!(!is_retryable(404));
    }

    #[test]
    fn test_retry_after_header() {
        let err = classify(
            ProviderKind::OpenAi,
            429,
            "",
            &headers_with_retry_after("30"),
        );
        assert_eq!(err.retry_after, Duration::from_secs(30));

        let err = classify(
            ProviderKind::OpenAi,
            429,
            "",
            &headers_with_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(err.retry_after, Duration::ZERO);

        let err = classify(ProviderKind::OpenAi, 429, "", &HeaderMap::new());
        assert_eq!(err.retry_after, Duration::ZERO);
    }

    #[test]
    fn test_openai_envelope() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        let err = classify(ProviderKind::OpenAi, 401, body, &HeaderMap::new());
        assert_eq!(err.vendor_type, "invalid_request_error");
        assert_eq!(err.message, "Incorrect API key provided");
    }

    #[test]
    fn test_xai_string_envelope() {
        let body = r#"{"code":"Client specified an invalid argument","error":"Incorrect API key provided"}"#;
        let err = classify(ProviderKind::Xai, 400, body, &HeaderMap::new());
        assert_eq!(err.vendor_type, "Client specified an invalid argument");
        assert_eq!(err.message, "Incorrect API key provided");
    }

    #[test]
    fn test_anthropic_envelope() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let err = classify(ProviderKind::Anthropic, 529, body, &HeaderMap::new());
        assert_eq!(err.vendor_type, "overloaded_error");
        assert_eq!(err.message, "Overloaded");
        assert!(err.retryable);
    }

    #[test]
    fn test_google_envelope() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        let err = classify(ProviderKind::Google, 400, body, &HeaderMap::new());
        assert_eq!(err.vendor_type, "INVALID_ARGUMENT");
        assert_eq!(err.message, "API key not valid.");
    }

    #[test]
    fn test_message_falls_back_to_body() {
        let err = classify(
            ProviderKind::Anthropic,
            502,
            "<html>Bad Gateway</html>",
            &HeaderMap::new(),
        );
        assert_eq!(err.message, "<html>Bad Gateway</html>");
        assert_eq!(err.vendor_type, "");

        let err = classify(ProviderKind::Google, 500, "", &HeaderMap::new());
        assert_eq!(err.message, "HTTP 500");

        let err = classify(ProviderKind::OpenAi, 400, r#"{"error":{}}"#, &HeaderMap::new());
        assert_eq!(err.message, r#"{"error":{}}"#);
    }
}
