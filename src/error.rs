//! Error types for the generation gateway

use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Rejections raised while cleaning model output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    #[error("generated code failed structural check: {0}")]
    InvalidGeneratedCode(&'static str),

    #[error("generated code matched unsafe pattern `{0}`")]
    UnsafeGeneratedCode(&'static str),
}

/// Failures talking to the generative model.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("model response contained no text")]
    EmptyResponse,
}

/// Failures of a rate-limit backend (never of the limit itself).
#[derive(Error, Debug)]
pub enum RateLimitError {
    #[error("rate-limit store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rate-limit store error: {0}")]
    Store(String),
}

/// Stable failure categories reported to callers and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MethodNotAllowed,
    RateLimited,
    InvalidPrompt,
    ServiceUnavailable,
    UpstreamTimeout,
    UpstreamQuotaExceeded,
    InvalidGeneratedCode,
    UnsafeGeneratedCode,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MethodNotAllowed => "MethodNotAllowed",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::InvalidPrompt => "InvalidPrompt",
            ErrorKind::ServiceUnavailable => "ServiceUnavailable",
            ErrorKind::UpstreamTimeout => "UpstreamTimeout",
            ErrorKind::UpstreamQuotaExceeded => "UpstreamQuotaExceeded",
            ErrorKind::InvalidGeneratedCode => "InvalidGeneratedCode",
            ErrorKind::UnsafeGeneratedCode => "UnsafeGeneratedCode",
        }
    }
}

/// Every way a generation request can end without code.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("invalid prompt: {0}")]
    InvalidPrompt(&'static str),

    #[error("model credential is not configured")]
    NotConfigured,

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("model did not answer within {0:?}")]
    UpstreamTimeout(Duration),

    #[error("upstream quota exceeded: {0}")]
    UpstreamQuotaExceeded(String),

    #[error(transparent)]
    Sanitize(#[from] SanitizeError),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            GatewayError::RateLimited { .. } => ErrorKind::RateLimited,
            GatewayError::InvalidPrompt(_) => ErrorKind::InvalidPrompt,
            GatewayError::NotConfigured | GatewayError::ServiceUnavailable(_) => {
                ErrorKind::ServiceUnavailable
            }
            GatewayError::UpstreamTimeout(_) => ErrorKind::UpstreamTimeout,
            GatewayError::UpstreamQuotaExceeded(_) => ErrorKind::UpstreamQuotaExceeded,
            GatewayError::Sanitize(SanitizeError::InvalidGeneratedCode(_)) => {
                ErrorKind::InvalidGeneratedCode
            }
            GatewayError::Sanitize(SanitizeError::UnsafeGeneratedCode(_)) => {
                ErrorKind::UnsafeGeneratedCode
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::InvalidPrompt => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Coarse text safe to show a caller; detail stays in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            GatewayError::MethodNotAllowed(_) => "Method not allowed",
            GatewayError::RateLimited { .. } => "Too many requests. Please try again later.",
            GatewayError::InvalidPrompt(_) => {
                "Invalid prompt. Must be a non-empty string of at most 500 characters."
            }
            GatewayError::NotConfigured => "Service configuration error",
            GatewayError::ServiceUnavailable(_) => {
                "Failed to generate background. Please try again."
            }
            GatewayError::UpstreamTimeout(_) => "AI service timed out. Please try again.",
            GatewayError::UpstreamQuotaExceeded(_) => {
                "AI service quota exceeded. Please try again later."
            }
            GatewayError::Sanitize(SanitizeError::InvalidGeneratedCode(_)) => {
                "Generated code was invalid. Please try a different prompt."
            }
            GatewayError::Sanitize(SanitizeError::UnsafeGeneratedCode(_)) => {
                "Generated code contains unsafe patterns. Please try a different prompt."
            }
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            GatewayError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<RateLimitError> for GatewayError {
    // Fail closed: a limiter we cannot consult denies service
    fn from(err: RateLimitError) -> Self {
        GatewayError::ServiceUnavailable(err.to_string())
    }
}

impl From<UpstreamError> for GatewayError {
    fn from(err: UpstreamError) -> Self {
        let status = match &err {
            UpstreamError::Api { status, .. } => Some(*status),
            _ => None,
        };
        let message = err.to_string();
        let lower = message.to_lowercase();

        if matches!(status, Some(401) | Some(403)) || lower.contains("api key") {
            GatewayError::NotConfigured
        } else if status == Some(429) || lower.contains("quota") || lower.contains("limit") {
            GatewayError::UpstreamQuotaExceeded(message)
        } else {
            GatewayError::ServiceUnavailable(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, message: &str) -> UpstreamError {
        UpstreamError::Api {
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn upstream_key_errors_are_configuration_problems() {
        let err = GatewayError::from(api(400, "API key not valid. Please pass a valid API key."));
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(err.public_message(), "Service configuration error");

        let err = GatewayError::from(api(403, "permission denied"));
        assert!(matches!(err, GatewayError::NotConfigured));
    }

    #[test]
    fn upstream_quota_is_distinct_from_local_rate_limit() {
        let err = GatewayError::from(api(429, "Resource has been exhausted"));
        assert_eq!(err.kind(), ErrorKind::UpstreamQuotaExceeded);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.retry_after(), None);

        let err = GatewayError::from(api(500, "Daily quota reached"));
        assert_eq!(err.kind(), ErrorKind::UpstreamQuotaExceeded);
    }

    #[test]
    fn unknown_upstream_failures_fall_back_to_generic() {
        let err = GatewayError::from(api(503, "backend overloaded"));
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(
            err.public_message(),
            "Failed to generate background. Please try again."
        );
        assert!(!err.public_message().contains("overloaded"));

        let err = GatewayError::from(UpstreamError::EmptyResponse);
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
    }

    #[test]
    fn status_codes_follow_the_contract() {
        assert_eq!(
            GatewayError::InvalidPrompt("empty").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::RateLimited { retry_after: 7 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            GatewayError::MethodNotAllowed("GET".into()).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            GatewayError::from(SanitizeError::UnsafeGeneratedCode("eval")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::from(RateLimitError::Store("down".into())).kind(),
            ErrorKind::ServiceUnavailable
        );
    }
}
