use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use context_edge::config::GateArgs;
use context_edge::handlers::gate_router;
use context_edge::kv::SledKv;
use context_edge::rate_limit::ThrottleGate;
use context_edge::state::GateState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = GateArgs::parse();
    let kv = Arc::new(SledKv::open(&args.kv_path)?);
    let state = Arc::new(GateState {
        client: reqwest::Client::new(),
        origin: args.origin.trim_end_matches('/').to_string(),
        protected_prefix: args.protected_prefix.clone(),
        gate: ThrottleGate::new(kv, args.rate_limit, args.rate_window, args.record_ttl),
    });

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        "throttle gate on {addr}: {} req/{}s on POST {}, forwarding to {}",
        args.rate_limit, args.rate_window, args.protected_prefix, state.origin
    );
    axum::serve(listener, gate_router(state)).await?;
    Ok(())
}
