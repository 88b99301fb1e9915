use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use aws_config::{BehaviorVersion, Region};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use context_edge::artifacts::HttpArtifactSource;
use context_edge::config::SyncArgs;
use context_edge::handlers::sync_router;
use context_edge::kv::{KvStore, SledKv};
use context_edge::object_store::R2ObjectStore;
use context_edge::retry::BackoffPolicy;
use context_edge::state::SyncState;
use context_edge::sync::SyncOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = SyncArgs::parse();

    // R2 speaks the s3 api; credentials come from the sdk's environment chain
    let endpoint = format!("https://{}.r2.cloudflarestorage.com", args.account_id);
    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new("auto"))
        .endpoint_url(endpoint)
        .load()
        .await;
    let store = Arc::new(R2ObjectStore::new(
        aws_sdk_s3::Client::new(&aws_config),
        args.bucket.clone(),
    ));

    let kv: Arc<dyn KvStore> = Arc::new(SledKv::open(&args.kv_path)?);
    let source = Arc::new(HttpArtifactSource::new(
        reqwest::Client::new(),
        args.origin.clone(),
    ));

    let orchestrator = SyncOrchestrator::new(
        kv.clone(),
        store,
        source,
        args.retry_attempts,
        BackoffPolicy {
            base: Duration::from_millis(args.backoff_base_ms),
            multiplier: args.backoff_multiplier,
        },
        Duration::from_secs(args.result_ttl),
        Duration::from_secs(args.pointer_ttl),
    );

    let state = Arc::new(SyncState {
        kv,
        orchestrator,
        worker: args.worker_name.clone(),
    });

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        "sync worker {} on {addr}, bucket {}",
        args.worker_name, args.bucket
    );
    axum::serve(listener, sync_router(state)).await?;
    Ok(())
}
