use clap::Parser;
use codegen_gateway::{AppState, Args, handlers, init_tracing, rate_limit};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // parse cli arguments
    let args = Args::parse();
    init_tracing(false);

    let state = Arc::new(AppState::from_args(&args)?);

    // spawn the background sweeper when counters are kept locally
    if let Some(limiter) = state.local_limiter.clone() {
        let every = args.sweep_interval();
        tokio::spawn(async move {
            rate_limit::sweeper(limiter, every).await;
        });
    }

    let app = handlers::router(state.clone());

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(port = args.port, path = handlers::GENERATE_PATH, "gateway listening");
    info!(
        limit = args.rate_limit,
        window_secs = args.rate_window,
        backend = state.gateway.limiter_backend(),
        "rate limit configured"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
