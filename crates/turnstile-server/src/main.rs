use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use turnstile_access::{sweep, PipelineConfig};
use turnstile_api::AppState;
use turnstile_channel::{ChannelAdapter, HttpChannelAdapter};
use turnstile_db::Database;

/// Placeholder service secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turnstile=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let service_secret = std::env::var("TURNSTILE_SERVICE_SECRET").unwrap_or_default();
    if service_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&service_secret.as_str()) {
        eprintln!("FATAL: TURNSTILE_SERVICE_SECRET is unset or still a placeholder.");
        eprintln!("       Every collaborator (bot, scheduler, webhook) authenticates with it.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    let channel_id = std::env::var("TURNSTILE_CHANNEL_ID").unwrap_or_default();
    if channel_id.is_empty() {
        eprintln!("FATAL: TURNSTILE_CHANNEL_ID is unset.");
        eprintln!("       This is the provider-side id of the gated channel.");
        std::process::exit(1);
    }

    let host = std::env::var("TURNSTILE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("TURNSTILE_PORT")
        .unwrap_or_else(|_| "3400".into())
        .parse()?;
    let db_path: PathBuf = std::env::var("TURNSTILE_DB_PATH")
        .unwrap_or_else(|_| "turnstile.db".into())
        .into();
    let provider_url =
        std::env::var("TURNSTILE_PROVIDER_URL").unwrap_or_else(|_| "http://127.0.0.1:3500".into());
    let provider_timeout_secs = env_u64("TURNSTILE_PROVIDER_TIMEOUT_SECS", 5);

    let mut config = PipelineConfig::new(channel_id);
    config.token_ttl = ChronoDuration::hours(env_u64("TURNSTILE_TOKEN_TTL_HOURS", 24) as i64);
    config.invite_ttl =
        ChronoDuration::minutes(env_u64("TURNSTILE_INVITE_TTL_MINUTES", 5) as i64);
    config.default_offer =
        ChronoDuration::days(env_u64("TURNSTILE_DEFAULT_OFFER_DAYS", 30) as i64);
    config.notification_retention =
        ChronoDuration::days(env_u64("TURNSTILE_RETENTION_DAYS", 90) as i64);

    // Init DB and provider adapter
    let db = Arc::new(Database::open(&db_path)?);
    let adapter: Arc<dyn ChannelAdapter> = Arc::new(HttpChannelAdapter::new(
        &provider_url,
        Duration::from_secs(provider_timeout_secs),
    )?);

    // Background sweeps. Deployments driving cadence from an external cron
    // hit the /api/v1/sweeps endpoints instead and turn these off.
    if env_u64("TURNSTILE_INTERNAL_SWEEPS", 1) == 1 {
        let token_interval = env_u64("TURNSTILE_TOKEN_SWEEP_SECS", 3600);
        let invite_interval = env_u64("TURNSTILE_INVITE_SWEEP_SECS", 3600);
        let membership_interval = env_u64("TURNSTILE_MEMBERSHIP_SWEEP_SECS", 86_400);
        let notification_interval = env_u64("TURNSTILE_NOTIFICATION_SWEEP_SECS", 86_400);

        tokio::spawn(sweep::run_token_sweep_loop(db.clone(), token_interval, 0));
        // offset from the token sweep to spread the load
        tokio::spawn(sweep::run_invite_sweep_loop(
            db.clone(),
            invite_interval,
            invite_interval / 2,
        ));
        tokio::spawn(sweep::run_membership_sweep_loop(
            db.clone(),
            adapter.clone(),
            membership_interval,
        ));
        tokio::spawn(sweep::run_notification_sweep_loop(
            db.clone(),
            config.clone(),
            notification_interval,
        ));
        info!(
            "Internal sweeps on (token {}s, invite {}s, membership {}s, notification {}s)",
            token_interval, invite_interval, membership_interval, notification_interval
        );
    } else {
        info!("Internal sweeps off; expecting an external scheduler");
    }

    let state = AppState {
        db,
        adapter,
        config,
        service_secret,
    };

    let app = turnstile_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Turnstile listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
