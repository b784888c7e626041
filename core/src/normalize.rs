//! Turns a raw `HttpResponse` into a payload or a `ClientError::Request`.
//!
//! # Design
//! Success responses never fail here: whatever the body holds becomes a
//! `Payload`. Failure responses always produce an error with a bounded
//! message, whatever the body looks like. Building that message never fails
//! either; a body that cannot be rendered falls back to
//! `UNSERIALIZABLE_BODY`.

use serde_json::Value;

use crate::error::ClientError;
use crate::http::HttpResponse;
use crate::payload::Payload;

/// Longest error message kept before truncation, in characters.
pub const MAX_MESSAGE_CHARS: usize = 400;

pub const TRUNCATION_SUFFIX: &str = "...(truncated)";

/// Message used when an error body cannot be rendered as text.
pub const UNSERIALIZABLE_BODY: &str = "<<unserializable response body>>";

/// Parse the response body and fail on a non-2xx status.
pub fn normalize(response: HttpResponse) -> Result<Payload, ClientError> {
    let payload = Payload::parse(&response.body);
    if response.is_success() {
        return Ok(payload);
    }
    Err(request_error(&response, &payload))
}

/// Build the `Request` error for a failed response.
pub fn request_error(response: &HttpResponse, payload: &Payload) -> ClientError {
    let message = truncate_message(error_message(payload));
    let message = if message.is_empty() {
        response.status_text.clone()
    } else {
        message
    };
    ClientError::Request {
        status: response.status,
        message,
    }
}

/// Derive a human-readable message from an error body.
pub fn error_message(payload: &Payload) -> String {
    match payload {
        Payload::Empty => String::new(),
        Payload::Text(text) => text.clone(),
        Payload::Structured(Value::String(text)) => text.clone(),
        Payload::Structured(Value::Object(fields)) => match fields.get("message") {
            Some(Value::String(message)) if !message.is_empty() => message.clone(),
            Some(message) if !is_blank(message) => render(message),
            _ => render(&Value::Object(fields.clone())),
        },
        Payload::Structured(other) => render(other),
    }
}

/// Cut `message` to `MAX_MESSAGE_CHARS` characters and mark the cut.
pub fn truncate_message(message: String) -> String {
    match message.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((cut, _)) => {
            let mut truncated = message[..cut].to_string();
            truncated.push_str(TRUNCATION_SUFFIX);
            truncated
        }
        None => message,
    }
}

// A `message` that carries nothing readable: null, false, zero or "".
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn render(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| UNSERIALIZABLE_BODY.to_string())
}
