//! `certtrack` — run one deadline lifecycle job to completion.
//!
//! The external scheduler (cron, systemd timers, a container orchestrator)
//! invokes one subcommand per trigger: `materialize` monthly, `notify` and
//! `expire` daily, `archive` annually. The job's structured report is
//! printed as JSON on stdout; a failed run exits non-zero.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use uuid::Uuid;

use certtrack_core::clock::{Clock, SystemClock};
use certtrack_core::config::CertTrackConfig;
use certtrack_engine::{
    CadenceEngine, NotificationExpirer, RequirementArchiver, RetryPolicy, ScheduleMaterializer,
};
use certtrack_notify::{ProviderRegistry, StoreSink};
use certtrack_store::Store;

#[derive(Parser)]
#[command(name = "certtrack", version, about = "Certificate deadline lifecycle jobs")]
struct Cli {
    /// Path to certtrack.toml (default: ~/.certtrack/certtrack.toml).
    #[arg(long, global = true)]
    config: Option<String>,

    /// Correlation id bound to every log line and echoed in the report.
    /// Generated when not supplied.
    #[arg(long, global = true)]
    request_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Materialize upcoming schedules for active requirements (monthly).
    Materialize,
    /// Evaluate the notification cadence for live schedules (daily).
    Notify,
    /// Archive requirements whose effective window has ended (annual).
    Archive,
    /// Expire stale pending notification deliveries (daily).
    Expire,
    /// Create the database schema and exit.
    InitDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "certtrack=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // config: explicit path > CERTTRACK_CONFIG env > ~/.certtrack/certtrack.toml
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var("CERTTRACK_CONFIG").ok());
    let config = CertTrackConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        CertTrackConfig::default()
    });

    ensure_parent_dir(&config.database.path);
    info!(path = %config.database.path, "opening SQLite database");
    let store = Arc::new(Store::open(&config.database.path)?);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let retry = RetryPolicy::from_config(&config.retry);
    let request_id = cli
        .request_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let (success, report) = match cli.command {
        Command::Materialize => {
            let job = ScheduleMaterializer::new(store, clock, retry);
            let r = job.run(&request_id).await;
            (r.success, serde_json::to_value(&r)?)
        }
        Command::Notify => {
            let sink = Arc::new(StoreSink::new(
                store.clone(),
                ProviderRegistry::with_schedule_providers(),
                clock.clone(),
            ));
            let job = CadenceEngine::new(store, sink, clock, retry)
                .with_expiry_days(config.notifications.expiry_days);
            let r = job.run(&request_id).await;
            (r.success, serde_json::to_value(&r)?)
        }
        Command::Archive => {
            let job = RequirementArchiver::new(store, clock, retry);
            let r = job.run(&request_id).await;
            (r.success, serde_json::to_value(&r)?)
        }
        Command::Expire => {
            let job = NotificationExpirer::new(store, clock, retry);
            let r = job.run(&request_id).await;
            (r.success, serde_json::to_value(&r)?)
        }
        Command::InitDb => {
            // Store::open already ran the migrations.
            info!("database schema ready");
            (
                true,
                serde_json::json!({ "success": true, "request_id": request_id }),
            )
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}
