mod auth;
mod config;
mod content;
mod graph;
mod model;
mod server;
mod service;
mod tools;

use anyhow::Context;
use config::Settings;
use server::SharePointMcp;
use service::SharePointService;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the MCP protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let settings = Settings::from_env()
        .context("Set the SharePoint app registration variables before starting the server")?;
    info!(
        site_id = %settings.credentials.site_id,
        tenant_id = %settings.credentials.tenant_id,
        "starting SharePoint MCP server"
    );

    let service = SharePointService::from_settings(&settings)
        .context("Failed to build HTTP client")?;
    let handler = SharePointMcp { service: Arc::new(service) };

    // Serve MCP on stdio until the client closes stdin
    let service = rmcp::serve_server(handler, rmcp::transport::stdio())
        .await
        .context("Failed to start MCP server")?;

    service.waiting().await?;

    Ok(())
}
