//! Email Key Gate - Main Application Entry Point
//!
//! REST API that issues email-verified API keys and meters every call made
//! with them against an hourly quota.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool and run migrations
//! 3. Connect the ephemeral store (Redis, or in-process when unset)
//! 4. Pick the email notifier (Resend, or log-only when unset)
//! 5. Build the router and start serving

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use url::Url;

use email_key_gate::{
    config, db, routes,
    services::{
        access_gate::AccessGate,
        key_admin_service::KeyAdmin,
        notifier::{LogNotifier, Notifier, ResendNotifier},
        scorer::SyntaxScorer,
        validation_service::EmailValidator,
        verification_service::VerificationFlow,
    },
    state::AppState,
    store::{
        EphemeralStore, KeyStore, MemoryStore, PgKeyStore, RedisStore, UsageStore,
        VerificationStore,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG, defaults to "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let keys: Arc<dyn KeyStore> = Arc::new(PgKeyStore::new(pool));

    let ephemeral: Arc<dyn EphemeralStore> = match &config.redis_url {
        Some(redis_url) => {
            let store = RedisStore::connect(redis_url, "email_key_gate").await?;
            tracing::info!("Connected to Redis");
            Arc::new(store)
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-process ephemeral store");
            Arc::new(MemoryStore::new())
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.resend_api_key {
        Some(api_key) => Arc::new(ResendNotifier::new(api_key.clone(), &config.email_from)?),
        None => {
            tracing::warn!("RESEND_API_KEY not set, verification emails will not be delivered");
            Arc::new(LogNotifier)
        }
    };

    if config.admin_secret_key.is_none() {
        tracing::warn!("ADMIN_SECRET_KEY not set, admin key creation is disabled");
    }

    let base_url = Url::parse(&config.api_base_url).context("API_BASE_URL is not a valid URL")?;
    let policy = config.issuance_policy();
    let usage = UsageStore::new(ephemeral.clone());

    let state = AppState {
        keys: keys.clone(),
        gate: AccessGate::new(keys.clone(), usage.clone()),
        verification: Arc::new(VerificationFlow::new(
            keys.clone(),
            VerificationStore::new(ephemeral.clone()),
            notifier,
            policy,
            base_url,
        )),
        admin: KeyAdmin::new(keys, usage, policy, config.admin_secret_key.clone()),
        validator: EmailValidator::new(Arc::new(SyntaxScorer), ephemeral),
    };

    let app = routes::router(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
