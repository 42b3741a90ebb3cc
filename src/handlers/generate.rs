use axum::{
    body::{Body, to_bytes},
    extract::{ConnectInfo, Request, State},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::gateway::{GatewayRequest, GatewayResponse};
use crate::prompt::MAX_BODY_BYTES;
use crate::state::AppState;

pub async fn generate_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    // an unreadable or oversized body reaches the gateway as empty, which
    // fails prompt validation like any other malformed body
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "request body unreadable");
            Default::default()
        }
    };

    state
        .gateway
        .handle(GatewayRequest {
            method: &parts.method,
            headers: &parts.headers,
            body: &body,
            peer,
        })
        .await
        .into_response()
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        response
    }
}
