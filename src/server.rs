//! MCP server initialization for stdio and Streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that wire an
//! initialized [`SightingStore`] into the MCP tool handler.

use crate::tools::SightingTools;
use anyhow::Result;
use rmcp::ServiceExt;
use sightings::config::SightingsConfig;
use sightings::sighting::SightingStore;
use std::sync::Arc;

/// Build the store from config and make sure its schema is in place.
async fn setup_store(config: &SightingsConfig) -> Result<Arc<SightingStore>> {
    let store = SightingStore::from_config(config)?;
    store.initialize().await?;
    tracing::info!(
        backend = store.backend_name(),
        semantic = store.semantic_enabled(),
        "store ready"
    );
    Ok(Arc::new(store))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: SightingsConfig) -> Result<()> {
    tracing::info!("starting sightings MCP server on stdio");

    let store = setup_store(&config).await?;

    let tools = SightingTools::new(store);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP at `/mcp`.
pub async fn serve_http(config: SightingsConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(addr = %bind_addr, "starting sightings MCP server on HTTP");

    let store = setup_store(&config).await?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(SightingTools::new(store.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
