//! Upstream response classification.
//!
//! The backend often fails silently: it answers `200 OK` with an HTML
//! error page instead of JSON. [`classify`] is the single place that
//! turns every upstream outcome into either the envelope's `value` or a
//! typed [`GatewayError`]. Raw upstream bodies never leave this module
//! except as a bounded, log-only [`snippet`].

use serde_json::Value;

use super::client::{UpstreamFailure, UpstreamResponse};
use crate::error::{ErrorCode, GatewayError};

const MAX_BACKEND_MESSAGE: usize = 200;
const SNIPPET_LEN: usize = 160;

pub fn classify(outcome: &Result<UpstreamResponse, UpstreamFailure>) -> Result<Value, GatewayError> {
    let response = match outcome {
        Ok(response) => response,
        Err(UpstreamFailure::Timeout(after)) => {
            return Err(GatewayError::new(
                ErrorCode::UpstreamTimeout,
                format!("backend did not respond within {}s", after.as_secs()),
            ))
        }
        Err(UpstreamFailure::RedirectLoop(budget)) => {
            return Err(GatewayError::new(
                ErrorCode::UpstreamRedirectLoop,
                format!("backend redirected more than {budget} times"),
            ))
        }
        Err(UpstreamFailure::Transport(_)) => {
            return Err(GatewayError::new(
                ErrorCode::UpstreamError,
                "backend is unreachable",
            ))
        }
    };

    let status = response.status;
    if status.is_server_error() {
        return Err(GatewayError::new(
            ErrorCode::UpstreamError,
            format!("backend failed with status {}", status.as_u16()),
        ));
    }
    if !status.is_success() {
        return Err(GatewayError::new(
            ErrorCode::UpstreamError,
            format!("backend answered with unexpected status {}", status.as_u16()),
        ));
    }

    if response
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("text/html"))
    {
        return Err(non_json());
    }

    let Ok(parsed) = serde_json::from_slice::<Value>(&response.body) else {
        return Err(non_json());
    };

    unwrap_envelope(parsed)
}

/// Interpret a parsed `{ok:true, value}` / `{ok:false, code, message}` envelope.
pub fn unwrap_envelope(parsed: Value) -> Result<Value, GatewayError> {
    let Value::Object(mut envelope) = parsed else {
        return Err(GatewayError::new(
            ErrorCode::Contract,
            "backend response is not an envelope object",
        ));
    };

    match envelope.get("ok") {
        Some(Value::Bool(true)) => Ok(envelope.remove("value").unwrap_or(Value::Null)),
        Some(Value::Bool(false)) => {
            let code = envelope
                .get("code")
                .and_then(Value::as_str)
                .map_or(ErrorCode::UpstreamError, ErrorCode::from_backend);
            let message = envelope
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| "backend reported an error".to_string(), bounded_message);
            Err(GatewayError::new(code, message))
        }
        _ => Err(GatewayError::new(
            ErrorCode::Contract,
            "backend envelope has no boolean 'ok'",
        )),
    }
}

fn non_json() -> GatewayError {
    GatewayError::new(
        ErrorCode::UpstreamNonJson,
        "backend returned a non-JSON response",
    )
}

fn bounded_message(message: &str) -> String {
    match message.char_indices().nth(MAX_BACKEND_MESSAGE) {
        Some((idx, _)) => format!("{}…", &message[..idx]),
        None => message.to_string(),
    }
}

/// Single-line prefix of an upstream body for logs.
#[must_use]
pub fn snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    text.chars()
        .take(SNIPPET_LEN)
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}
