//! The generation request pipeline shared by every transport.
//!
//! Steps run strictly in order and the first failure ends the request:
//! preflight, method check, rate limit, prompt validation, credential
//! check, model call, sanitize. Each outcome becomes a [`GatewayResponse`]
//! with a JSON body; callers never see a raw error.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE, ORIGIN, VARY,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::OriginPolicy;
use crate::error::GatewayError;
use crate::metrics::{FAILURES, GENERATED_TOTAL, MODEL_LATENCY, REQUEST_TOTAL};
use crate::models::{ErrorResponse, GenerateResponse, GenerationRequest};
use crate::prompt::{build_instruction, extract_prompt};
use crate::rate_limit::{RateDecision, RateLimiter};
use crate::sanitize::CodeSanitizer;
use crate::upstream::ModelClient;

// Headers checked in order for the caller's address
const CLIENT_ADDR_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "client-ip"];
const UNKNOWN_CLIENT: &str = "unknown";

/// Transport-neutral view of one inbound call.
pub struct GatewayRequest<'a> {
    pub method: &'a Method,
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
    pub peer: Option<IpAddr>,
}

/// Transport-neutral reply.
#[derive(Debug)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

pub struct GenerationGateway {
    limiter: Arc<dyn RateLimiter>,
    model: Option<Arc<dyn ModelClient>>,
    sanitizer: CodeSanitizer,
    model_timeout: Duration,
    origins: OriginPolicy,
}

impl GenerationGateway {
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        model: Option<Arc<dyn ModelClient>>,
        model_timeout: Duration,
        origins: OriginPolicy,
    ) -> Self {
        Self {
            limiter,
            model,
            sanitizer: CodeSanitizer::new(),
            model_timeout,
            origins,
        }
    }

    pub fn model_configured(&self) -> bool {
        self.model.is_some()
    }

    pub fn limiter_backend(&self) -> &'static str {
        self.limiter.backend()
    }

    pub async fn handle(&self, req: GatewayRequest<'_>) -> GatewayResponse {
        let mut headers = cors_headers(&self.origins, req.headers);

        if *req.method == Method::OPTIONS {
            return GatewayResponse {
                status: StatusCode::OK,
                headers,
                body: String::new(),
            };
        }

        REQUEST_TOTAL.inc();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client_key = client_key(req.headers, req.peer);

        match self.generate(req.method, &client_key, req.body).await {
            Ok(success) => {
                GENERATED_TOTAL.inc();
                info!(client = %client_key, code_chars = success.code.len(), "generated background code");
                GatewayResponse {
                    status: StatusCode::OK,
                    headers,
                    body: to_json(&success),
                }
            }
            Err(err) => self.failure(req.headers, &client_key, &err),
        }
    }

    /// JSON failure reply carrying the usual CORS headers.
    pub fn failure(
        &self,
        request_headers: &HeaderMap,
        client_key: &str,
        err: &GatewayError,
    ) -> GatewayResponse {
        let kind = err.kind().as_str();
        FAILURES.with_label_values(&[kind]).inc();
        warn!(client = %client_key, kind, error = %err, "generation request failed");

        let mut headers = cors_headers(&self.origins, request_headers);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = ErrorResponse::new(err.public_message(), err.retry_after());
        GatewayResponse {
            status: err.status(),
            headers,
            body: to_json(&body),
        }
    }

    /// Everything after preflight, as a plain `Result`.
    pub async fn generate(
        &self,
        method: &Method,
        client_key: &str,
        body: &[u8],
    ) -> Result<GenerateResponse, GatewayError> {
        if *method != Method::POST {
            return Err(GatewayError::MethodNotAllowed(method.to_string()));
        }

        match self.limiter.check_and_consume(client_key).await? {
            RateDecision::Denied { retry_after } => {
                return Err(GatewayError::RateLimited { retry_after });
            }
            RateDecision::Allowed { remaining } => {
                debug!(client = %client_key, remaining, "rate limit passed");
            }
        }

        let request = GenerationRequest {
            prompt: extract_prompt(body)?,
            client_key: client_key.to_string(),
        };

        let model = self.model.as_ref().ok_or(GatewayError::NotConfigured)?;
        let instruction = build_instruction(&request.prompt);

        let started = Instant::now();
        let outcome = timeout(self.model_timeout, model.generate(&instruction)).await;
        MODEL_LATENCY.observe(started.elapsed().as_secs_f64());

        let raw = match outcome {
            Ok(result) => result.map_err(|e| {
                warn!(client = %request.client_key, error = %e, "model call failed");
                GatewayError::from(e)
            })?,
            Err(_) => return Err(GatewayError::UpstreamTimeout(self.model_timeout)),
        };

        let code = self.sanitizer.sanitize(&raw)?;
        Ok(GenerateResponse::new(code, request.prompt))
    }
}

/// Identity used for rate limiting.
pub fn client_key(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    for name in CLIENT_ADDR_HEADERS {
        let first = headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(addr) = first {
            return addr.to_string();
        }
    }

    peer.map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub fn cors_headers(policy: &OriginPolicy, request_headers: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();

    match policy {
        OriginPolicy::Any => {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        }
        OriginPolicy::List(allowed) => {
            headers.insert(VARY, HeaderValue::from_static("Origin"));
            let matched = request_headers
                .get(ORIGIN)
                .filter(|o| o.to_str().is_ok_and(|o| allowed.iter().any(|a| a == o)));
            if let Some(origin) = matched {
                headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            }
        }
    }

    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| r#"{"success":false,"error":"Internal error"}"#.to_string())
}
