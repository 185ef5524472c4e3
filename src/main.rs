use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use relink::api;
use relink::config::Config;
use relink::engine::RuleEngine;
use relink::redirect;
use relink::storage::{CachedStore, RuleStore, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    info!("Using SQLite storage: {}", config.database.url);
    let sqlite: Arc<dyn RuleStore> = Arc::new(
        SqliteStore::new(&config.database.url, config.database.max_connections).await?,
    );

    info!("Initializing database...");
    sqlite.init().await?;
    info!("Database initialized successfully");

    let store: Arc<dyn RuleStore> = if config.cache.enabled {
        info!(
            "Read cache enabled ({} entries, {}s TTL)",
            config.cache.max_entries, config.cache.ttl_secs
        );
        Arc::new(CachedStore::new(
            Arc::clone(&sqlite),
            config.cache.max_entries,
            config.cache.ttl_secs,
        ))
    } else {
        sqlite
    };

    let engine = RuleEngine::new(Arc::clone(&store));

    // Create routers
    let api_router = api::create_api_router(Arc::clone(&store), engine.clone());
    let redirect_router = redirect::create_redirect_router(Arc::clone(&store), engine);

    // Start API server
    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);

    // Start redirect server
    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr).await?;
    info!("🚀 Redirect server listening on http://{}", redirect_addr);

    // Run both servers concurrently
    tokio::try_join!(
        axum::serve(api_listener, api_router),
        axum::serve(redirect_listener, redirect_router),
    )?;

    Ok(())
}
