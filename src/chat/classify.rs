//! Translation of raw transport failures into [`ChatError`]
//!
//! This is the only place that looks at HTTP status codes.

use super::ChatError;
use serde_json::Value;
use std::time::Duration;

/// Classify a non-success HTTP response.
///
/// `retry_after` is the raw `Retry-After` header value, if the backend sent one.
pub fn classify_status(status: u16, retry_after: Option<&str>, body: &str) -> ChatError {
    let payload = serde_json::from_str::<Value>(body).ok();
    let detail = payload.as_ref().and_then(backend_message);

    match status {
        429 => {
            let delay = retry_after
                .and_then(parse_retry_after)
                .or_else(|| payload.as_ref().and_then(body_retry_after));
            ChatError::rate_limit(detail.unwrap_or_else(|| "Rate limit exceeded".to_string()), delay)
        }
        401 => ChatError::auth(detail.unwrap_or_else(|| "Authentication failed".to_string())),
        _ => {
            let message = detail.unwrap_or_else(|| {
                let body = body.trim();
                if body.is_empty() {
                    format!("Request failed with status code {status}")
                } else {
                    format!("HTTP {status}: {body}")
                }
            });
            ChatError::http(status, message, payload)
        }
    }
}

/// Classify a failure that happened before any response arrived.
pub fn classify_send_error(err: &reqwest::Error, timeout: Duration) -> ChatError {
    if err.is_timeout() {
        ChatError::generic(format!(
            "Request timed out after {} seconds",
            timeout.as_secs()
        ))
    } else if err.is_connect() {
        ChatError::generic(format!("Connection failed: {err}"))
    } else {
        ChatError::generic(format!("Request failed: {err}"))
    }
}

/// Best-effort human readable message from an error payload.
///
/// Understands `{"detail": "..."}`, the validation form
/// `{"detail": [{"msg": "..."}]}`, `{"message": "..."}` and
/// `{"error": {"message": "..."}}`.
fn backend_message(payload: &Value) -> Option<String> {
    match payload.get("detail") {
        Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
        Some(Value::Array(items)) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if !msgs.is_empty() {
                return Some(msgs.join("; "));
            }
        }
        _ => {}
    }

    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| {
            payload
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
        })
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn parse_retry_after(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    // HTTP-date form
    let when = chrono::DateTime::parse_from_rfc2822(raw).ok()?;
    let delta = when.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

fn body_retry_after(payload: &Value) -> Option<Duration> {
    payload
        .get("retry_after")
        .or_else(|| payload.get("error").and_then(|e| e.get("retry_after")))
        .and_then(Value::as_f64)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}
