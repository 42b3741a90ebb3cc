//! Gateway that turns a free-text prompt into canvas drawing code.
//!
//! Requests are rate limited per client, the prompt is wrapped in a fixed
//! instruction, sent to a generative model, and the reply is cleaned and
//! screened before it is returned. The same [`gateway::GenerationGateway`]
//! backs both the long-lived HTTP server and the single-invocation
//! function binary.

pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod prompt;
pub mod rate_limit;
pub mod sanitize;
pub mod serverless;
pub mod shared_store;
pub mod state;
pub mod upstream;

pub use config::Args;
pub use error::{ErrorKind, GatewayError, SanitizeError};
pub use gateway::{GatewayRequest, GatewayResponse, GenerationGateway};
pub use rate_limit::{InMemoryRateLimiter, RateDecision, RateLimiter};
pub use sanitize::CodeSanitizer;
pub use state::AppState;
pub use upstream::ModelClient;

/// Install the fmt subscriber, `RUST_LOG` overrides the default level.
pub fn init_tracing(to_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if to_stderr {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
}
