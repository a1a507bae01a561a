mod activity;
mod auth;
mod config;
mod db;
mod errors;
mod mail;
mod models;
mod perimeter;
mod resources;
mod routes;
mod session;
mod state;
mod store;
mod sweeper;
mod twofactor;
mod verification;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::mail::{LogMailer, Mailer, SmtpMailer};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{IdentityStore, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV Builder API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let pool = create_pool(&config.database_url).await?;
    let store: Arc<dyn IdentityStore> = Arc::new(PgStore::new(pool));

    // One-shot maintenance mode for schedulers: `api sweep`
    if std::env::args().nth(1).as_deref() == Some("sweep") {
        sweeper::run(store.as_ref()).await?;
        return Ok(());
    }

    // Initialize the mailer; without SMTP config verification links are
    // logged instead of sent, which is the local-dev mode.
    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            info!("SMTP mailer initialized (relay: {})", smtp.host);
            Arc::new(SmtpMailer::new(smtp)?)
        }
        None => {
            info!("No SMTP configuration, verification mails will be logged");
            Arc::new(LogMailer)
        }
    };

    // Shared HTTP client for federated token exchange
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    for (provider, client) in [("google", &config.google), ("github", &config.github)] {
        if client.is_some() {
            info!("Federated sign-in enabled: {provider}");
        }
    }

    // Build app state
    let state = AppState {
        store,
        mailer,
        http,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
