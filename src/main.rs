use std::{net::SocketAddr, sync::Arc};

use relay::{
    config::AppConfig,
    dispatcher::Dispatcher,
    inbound::{InboundReceiver, ProviderRouter},
    router::build_router,
    state::AppState,
};
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,relay=debug")),
        )
        .init();

    let config = AppConfig::from_env();

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(&pool)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let dispatcher = Dispatcher::new(pool.clone(), config.dispatcher.clone())?;
    let router = ProviderRouter::with_defaults();
    for provider in config.provider_secrets.keys() {
        if router.get(provider).is_none() {
            tracing::warn!(provider = %provider, "secret configured for unknown provider");
        }
    }
    let mut providers: Vec<_> = router
        .providers()
        .filter(|provider| config.provider_secrets.contains_key(*provider))
        .collect();
    providers.sort_unstable();
    tracing::info!(providers = ?providers, "inbound providers enabled");
    let receiver = InboundReceiver::new(
        config.provider_secrets.clone(),
        router,
        Arc::new(dispatcher.clone()),
    );

    let state = AppState {
        pool,
        dispatcher,
        receiver,
        admin_api_token: config.admin_api_token.as_deref().map(Arc::from),
    };

    if state.admin_api_token.is_none() {
        tracing::warn!("RELAY_ADMIN_API_TOKEN is not set; admin API is unauthenticated");
    }

    let app = build_router(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "relay listening");
    axum::serve(listener, app).await?;

    Ok(())
}
