use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Args;
use crate::gateway::GenerationGateway;
use crate::rate_limit::{InMemoryRateLimiter, RateLimiter};
use crate::shared_store::SharedStoreRateLimiter;
use crate::upstream::{GeminiClient, ModelClient};

// app's shared state
pub struct AppState {
    pub gateway: GenerationGateway,
    // set only when counters live in this process, for the sweeper
    pub local_limiter: Option<Arc<InMemoryRateLimiter>>,
}

impl AppState {
    pub fn from_args(args: &Args) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;

        let (limiter, local_limiter) = match &args.store_url {
            Some(url) => {
                info!(url = %url, "using shared rate-limit store");
                let shared = SharedStoreRateLimiter::new(
                    client.clone(),
                    url,
                    args.store_token.clone(),
                    args.rate_limit,
                    args.rate_window(),
                );
                (Arc::new(shared) as Arc<dyn RateLimiter>, None)
            }
            None => {
                let local = Arc::new(InMemoryRateLimiter::new(args.rate_limit, args.rate_window()));
                (local.clone() as Arc<dyn RateLimiter>, Some(local))
            }
        };

        let model: Option<Arc<dyn ModelClient>> = match args.api_key() {
            Some(key) => Some(Arc::new(GeminiClient::new(
                client,
                &args.model_url,
                &args.model,
                key,
            ))),
            None => {
                warn!("GEMINI_API_KEY is not set, generation requests will fail");
                None
            }
        };

        let gateway = GenerationGateway::new(
            limiter,
            model,
            args.model_timeout(),
            args.origin_policy(),
        );

        Ok(Self {
            gateway,
            local_limiter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn in_memory_limiter_without_store() {
        let args = Args::parse_from(["codegen-gateway", "--api-key", "k"]);
        let state = AppState::from_args(&args).unwrap();
        assert!(state.local_limiter.is_some());
        assert_eq!(state.gateway.limiter_backend(), "memory");
        assert!(state.gateway.model_configured());
    }

    #[test]
    fn shared_store_when_url_given() {
        let args = Args::parse_from([
            "codegen-gateway",
            "--store-url",
            "https://store.example",
            "--api-key",
            "",
        ]);
        let state = AppState::from_args(&args).unwrap();
        assert!(state.local_limiter.is_none());
        assert_eq!(state.gateway.limiter_backend(), "shared-store");
        assert!(!state.gateway.model_configured());
    }
}
