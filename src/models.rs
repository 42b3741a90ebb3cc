use serde::{Deserialize, Serialize};

// Generation request after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub client_key: String,
}

// Success body sent back to the renderer
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct GenerateResponse {
    pub success: bool,
    pub code: String,
    pub timestamp: String, // ISO-8601, UTC
    pub prompt: String,
}

// Failure body, `retryAfter` only for local rate limiting
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl GenerateResponse {
    pub fn new(code: String, prompt: String) -> Self {
        Self {
            success: true,
            code,
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            prompt,
        }
    }
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self {
            success: false,
            error: error.into(),
            retry_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_is_omitted_when_absent() {
        let body = serde_json::to_value(ErrorResponse::new("nope", None)).unwrap();
        assert_eq!(body, serde_json::json!({"success": false, "error": "nope"}));

        let body = serde_json::to_value(ErrorResponse::new("slow down", Some(12))).unwrap();
        assert_eq!(body["retryAfter"], 12);
    }

    #[test]
    fn success_timestamp_is_rfc3339() {
        let resp = GenerateResponse::new("ctx.fillRect(0, 0, width, height);".into(), "p".into());
        assert!(chrono::DateTime::parse_from_rfc3339(&resp.timestamp).is_ok());
        assert!(resp.success);
    }
}
