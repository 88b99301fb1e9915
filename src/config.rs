use clap::Parser;

// CLI arguments for the throttle gate
#[derive(Parser, Debug, Clone)]
#[command(name = "throttle-gate")]
#[command(about = "Rate-limit gate in front of the ai-context generate endpoint")]
pub struct GateArgs {
    // Port to run the gate on
    #[arg(short, long, default_value_t = 8081)]
    pub port: u16,

    // Origin service requests are forwarded to
    #[arg(short, long, default_value = "http://localhost:8080")]
    pub origin: String,

    // Path prefix protected by the throttle (POST only)
    #[arg(long, default_value = "/generate")]
    pub protected_prefix: String,

    // Max requests per identity per window
    #[arg(long, default_value_t = 100)]
    pub rate_limit: u32,

    // Window duration in seconds
    #[arg(long, default_value_t = 3600)]
    pub rate_window: u64,

    // Rate window record expiry in seconds (window plus a buffer margin)
    #[arg(long, default_value_t = 3900)]
    pub record_ttl: u64,

    // Sled path for rate window records
    #[arg(long, default_value = "data/gate-kv")]
    pub kv_path: String,
}

// CLI arguments for the sync worker
#[derive(Parser, Debug, Clone)]
#[command(name = "sync-worker")]
#[command(about = "Syncs generated context artifacts to an R2 bucket")]
pub struct SyncArgs {
    // Port to run the worker on
    #[arg(short, long, default_value_t = 8082)]
    pub port: u16,

    // Origin serving the generated context artifacts
    #[arg(short, long, default_value = "http://localhost:8080")]
    pub origin: String,

    // R2 bucket name
    #[arg(long)]
    pub bucket: String,

    // Cloudflare account id (builds the R2 endpoint url);
    // credentials come from the AWS sdk environment chain
    #[arg(long)]
    pub account_id: String,

    // Worker name reported by /health
    #[arg(long, default_value = "ai-context-r2-sync")]
    pub worker_name: String,

    // Retry budget per sync unit
    #[arg(long, default_value_t = 3)]
    pub retry_attempts: u32,

    // Backoff base delay in milliseconds
    #[arg(long, default_value_t = 500)]
    pub backoff_base_ms: u64,

    // Backoff multiplier
    #[arg(long, default_value_t = 3)]
    pub backoff_multiplier: u32,

    // Sync result retention in seconds (7 days)
    #[arg(long, default_value_t = 604_800)]
    pub result_ttl: u64,

    // Latest pointer retention in seconds (1 year)
    #[arg(long, default_value_t = 31_536_000)]
    pub pointer_ttl: u64,

    // Sled path for sync records
    #[arg(long, default_value = "data/sync-kv")]
    pub kv_path: String,
}
