//! Unified error types for Frontdoor.
//!
//! Defines [`FrontdoorError`] (process-level failures: config, startup,
//! CLI commands), [`ValidationError`] for config validation failures, and
//! the request-level taxonomy: [`ErrorCode`] plus the client-visible
//! [`ErrorEnvelope`]. Process errors use `thiserror`; request errors are
//! plain values that always become a response.

use std::path::PathBuf;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub scope: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}: {}", self.scope, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible (only fails on OOM which is unrecoverable)
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FrontdoorError {
    #[error("No config source found.\n\n  {hint}")]
    NoConfigSource { hint: String },

    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Template bundle not found: {}", path.display())]
    TemplateBundleNotFound { path: PathBuf },

    #[error("Template bundle at {} contains no page templates", path.display())]
    TemplateBundleEmpty { path: PathBuf },

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),
}

/// Request-level error taxonomy surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadInput,
    NotFound,
    Unauthorized,
    RateLimited,
    UpstreamNonJson,
    UpstreamError,
    UpstreamTimeout,
    UpstreamRedirectLoop,
    TemplateMissing,
    Contract,
}

impl ErrorCode {
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::BadInput => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamNonJson
            | Self::UpstreamError
            | Self::UpstreamRedirectLoop
            | Self::TemplateMissing
            | Self::Contract => StatusCode::BAD_GATEWAY,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadInput => "BAD_INPUT",
            Self::NotFound => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::RateLimited => "RATE_LIMITED",
            Self::UpstreamNonJson => "UPSTREAM_NON_JSON",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::UpstreamRedirectLoop => "UPSTREAM_REDIRECT_LOOP",
            Self::TemplateMissing => "TEMPLATE_MISSING",
            Self::Contract => "CONTRACT",
        }
    }

    /// Map a code reported by the backend's `{ok:false}` envelope.
    ///
    /// Only client-meaningful codes survive; anything else the backend
    /// reports is an upstream failure from the caller's point of view.
    #[must_use]
    pub fn from_backend(code: &str) -> Self {
        match code {
            "BAD_INPUT" => Self::BadInput,
            "NOT_FOUND" => Self::NotFound,
            "UNAUTHORIZED" => Self::Unauthorized,
            "RATE_LIMITED" => Self::RateLimited,
            "CONTRACT" => Self::Contract,
            _ => Self::UpstreamError,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified request failure, not yet bound to a correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayError {
    pub code: ErrorCode,
    pub message: String,
}

impl GatewayError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn into_envelope(self, corr_id: &str) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            status: self.code.status().as_u16(),
            error_code: self.code,
            message: self.message,
            corr_id: corr_id.to_string(),
        }
    }
}

/// The JSON body returned for every failed JSON/API/shortlink request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub status: u16,
    pub error_code: ErrorCode,
    pub message: String,
    pub corr_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_codes_are_gateway_class() {
        assert_eq!(ErrorCode::UpstreamNonJson.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::UpstreamError.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ErrorCode::UpstreamTimeout.status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(ErrorCode::TemplateMissing.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn envelope_serializes_camel_case() {
        let env = GatewayError::new(ErrorCode::UpstreamNonJson, "backend returned HTML")
            .into_envelope("abc-123");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["status"], 502);
        assert_eq!(json["errorCode"], "UPSTREAM_NON_JSON");
        assert_eq!(json["corrId"], "abc-123");
    }

    #[test]
    fn unknown_backend_code_is_upstream_error() {
        assert_eq!(ErrorCode::from_backend("NOT_FOUND"), ErrorCode::NotFound);
        assert_eq!(ErrorCode::from_backend("SHEET_LOCKED"), ErrorCode::UpstreamError);
    }
}
