//! One request per process: a function event on stdin, the reply on stdout.

use clap::Parser;
use codegen_gateway::serverless::handle_invocation;
use codegen_gateway::{AppState, Args, init_tracing};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(true);

    // configuration comes from the environment only
    let args = Args::parse_from(["generate-fn"]);
    let state = AppState::from_args(&args)?;

    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;

    // a malformed event still gets a 400 reply on stdout
    let response = handle_invocation(&state.gateway, &input).await;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&serde_json::to_vec(&response)?).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}
