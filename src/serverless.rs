//! Single-invocation adapter.
//!
//! A function runtime hands over one event (`httpMethod`, `headers`,
//! `body`, `isBase64Encoded`) and expects one `{statusCode, headers, body}`
//! reply. The work is done by the same [`GenerationGateway`] the server
//! uses, so both entry points answer identically.

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::gateway::{GatewayRequest, GatewayResponse, GenerationGateway};

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEvent {
    pub http_method: String,
    // runtimes send `null` as readily as they omit the field
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_base64_encoded: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl FunctionEvent {
    fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.append(name, value);
                }
                _ => debug!(header = %name, "skipping malformed event header"),
            }
        }
        map
    }

    /// Raw body bytes; a body that fails to decode is treated as empty.
    fn body_bytes(&self) -> Vec<u8> {
        let raw = self.body.as_deref().unwrap_or_default();
        if !self.is_base64_encoded {
            return raw.as_bytes().to_vec();
        }

        match STANDARD.decode(raw.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "event body is not valid base64");
                Vec::new()
            }
        }
    }
}

impl From<GatewayResponse> for FunctionResponse {
    fn from(resp: GatewayResponse) -> Self {
        let headers = resp
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            status_code: resp.status.as_u16(),
            headers,
            body: resp.body,
        }
    }
}

pub async fn handle_event(gateway: &GenerationGateway, event: FunctionEvent) -> FunctionResponse {
    let headers = event.header_map();
    // an unparseable verb is just another method that is not POST
    let method = Method::from_bytes(event.http_method.to_uppercase().as_bytes())
        .unwrap_or(Method::TRACE);
    let body = event.body_bytes();

    gateway
        .handle(GatewayRequest {
            method: &method,
            headers: &headers,
            body: &body,
            peer: None,
        })
        .await
        .into()
}

/// Parse a raw invocation and answer it; unreadable events still get a JSON reply.
pub async fn handle_invocation(gateway: &GenerationGateway, input: &str) -> FunctionResponse {
    match serde_json::from_str::<FunctionEvent>(input) {
        Ok(event) => handle_event(gateway, event).await,
        Err(e) => {
            warn!(error = %e, "invocation event is not a valid function event");
            let err = GatewayError::InvalidPrompt("invocation event is malformed");
            gateway.failure(&HeaderMap::new(), "unknown", &err).into()
        }
    }
}
