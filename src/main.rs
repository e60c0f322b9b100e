use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use feedmill::config::Config;
use feedmill::engine::Engine;
use feedmill::feed::Fetcher;
use feedmill::ratelimit::RateLimiter;
use feedmill::server;
use feedmill::storage::Database;

#[derive(Parser)]
#[command(
    name = "feedmill",
    version,
    about = "RSS/Atom ingestion service with a deduplicated, append-only article store"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "feedmill.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP surface plus the background staleness sweeper (default)
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run one staleness sweep and print per-feed outcomes as JSON
    Sweep,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feedmill=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config).context("loading configuration")?;
    let engine = build_engine(&config).await?;

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => serve(engine, config, bind).await,
        Command::Sweep => {
            let results = engine.sweep().await.context("staleness sweep")?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
    }
}

async fn build_engine(config: &Config) -> Result<Arc<Engine>> {
    let db = Database::open(&config.database_path)
        .await
        .with_context(|| format!("opening database {}", config.database_path))?;

    let timeout = Duration::from_secs(config.fetch_timeout_secs);
    let fetcher = if config.allow_private_networks {
        Fetcher::new_allowing_private_networks(timeout, config.max_response_bytes)
    } else {
        Fetcher::new(timeout, config.max_response_bytes)
    }
    .context("building HTTP client")?;

    let limiter = Arc::new(RateLimiter::new(
        Duration::from_secs(config.rate_limit_window_secs),
        config.rate_limit_max_requests,
    ));

    Ok(Arc::new(Engine::new(
        db,
        fetcher,
        limiter,
        Duration::from_secs(config.refresh_interval_minutes * 60),
        config.sweep_concurrency,
    )))
}

async fn serve(engine: Arc<Engine>, config: Config, bind: Option<String>) -> Result<()> {
    engine.rate_limiter().clone().start_pruning();
    spawn_sweeper(
        engine.clone(),
        Duration::from_secs(config.refresh_interval_minutes * 60),
    );

    let addr = bind.unwrap_or_else(|| config.bind_addr.clone());
    let app = server::router(engine, &config.allowed_origins);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %addr, "feedmill listening");
    axum::serve(listener, app).await.context("server terminated")?;
    Ok(())
}

/// Periodic sweep driver. Failures inside a sweep are already isolated per
/// feed; a failure of the sweep itself (storage down) is logged and the
/// next tick retries.
fn spawn_sweeper(engine: Arc<Engine>, period: Duration) {
    let period = period.max(Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match engine.sweep().await {
                Ok(results) => {
                    let failed = results.iter().filter(|entry| !entry.success).count();
                    tracing::info!(
                        refreshed = results.len() - failed,
                        failed,
                        "sweep finished"
                    );
                }
                Err(err) => tracing::warn!(error = %err, "sweep failed"),
            }
        }
    });
}
