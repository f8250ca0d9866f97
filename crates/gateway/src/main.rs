use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::HeaderValue;
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use vg_domain::config::{Config, ConfigSeverity};
use vg_gateway::api;
use vg_gateway::api::webhooks::DedupeStore;
use vg_gateway::cli::{Cli, Command, ConfigCommand};
use vg_gateway::jobs::JobQueue;
use vg_gateway::state::AppState;
use vg_store::{OrderStore, TenantRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let config = vg_gateway::cli::load_config(&cli.config)?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let config = vg_gateway::cli::load_config(&cli.config)?;
            let issues = config.validate();
            for issue in &issues {
                let tag = match issue.severity {
                    ConfigSeverity::Warning => "warning",
                    ConfigSeverity::Error => "error",
                };
                println!("{tag}: {issue}");
            }
            if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
                std::process::exit(1);
            }
            println!("config OK");
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let config = vg_gateway::cli::load_config(&cli.config)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Command::Version) => {
            println!("voicegate {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,vg_gateway=debug")),
        )
        .json()
        .init();
}

/// Start the gateway server with the given configuration.
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("voicegate starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Persistence ──────────────────────────────────────────────────
    let tenants = Arc::new(
        TenantRegistry::new(&config.store.state_path).context("initializing tenant registry")?,
    );
    let orders = Arc::new(
        OrderStore::new(&config.store.state_path).context("initializing order store")?,
    );

    // ── Job queue + worker ───────────────────────────────────────────
    let jobs = Arc::new(
        JobQueue::new(&config.store.state_path, &config.jobs)
            .context("initializing job queue")?,
    );
    jobs.spawn_worker();
    tracing::info!("job worker ready");

    // ── Webhook dedupe + secrets ─────────────────────────────────────
    let dedupe = Arc::new(DedupeStore::new(Duration::from_secs(
        config.webhooks.dedupe_ttl_secs,
    )));
    let voice_webhook_secret = std::env::var(&config.webhooks.voice_secret_env).ok();
    let pos_webhook_secret = std::env::var(&config.webhooks.pos_secret_env).ok();

    // ── Outbound HTTP client (OAuth exchange) ────────────────────────
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("building HTTP client")?;

    let state = AppState {
        config: config.clone(),
        tenants,
        orders,
        jobs,
        dedupe,
        http,
        voice_webhook_secret,
        pos_webhook_secret,
    };

    // ── Router ───────────────────────────────────────────────────────
    let mut cors = CorsLayer::new();
    if !config.server.cors_origins.is_empty() {
        let origins: Vec<HeaderValue> = config
            .server
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors = cors.allow_origin(AllowOrigin::list(origins));
    }

    let app = api::router(&config)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    tracing::info!(bind = %config.server.bind, "voicegate listening");

    axum::serve(listener, app).await.context("serving")
}
