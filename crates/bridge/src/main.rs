//! MCP server bridging tool calls to a PASOE instance's REST interface.

use anyhow::Context as _;
use clap::Parser;
use pasoe_rest::client::RestClient;
use rmcp::ServiceExt as _;
use rmcp::transport::stdio;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod tools;

#[derive(Debug, Parser)]
#[command(
    name = "pasoe-mcp-bridge",
    version,
    about = "MCP server exposing PASOE REST services as tools"
)]
struct Cli {
    /// Path to the bridge settings file
    #[arg(long, env = "PASOE_BRIDGE_CONFIG", default_value = "pasoe-bridge.json")]
    config: PathBuf,

    /// Override the PASOE base URL (e.g. https://localhost:8810)
    #[arg(long, env = "PASOE_BASE_URL")]
    base_url: Option<String>,

    /// Override the PASOE web application name
    #[arg(long, env = "PASOE_WEB_APP")]
    web_app: Option<String>,

    /// Username for basic authentication
    #[arg(long, env = "PASOE_USERNAME")]
    username: Option<String>,

    /// Password for basic authentication
    #[arg(long, env = "PASOE_PASSWORD")]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries MCP protocol frames; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = config::load_settings(&cli.config)
        .with_context(|| format!("load settings from {}", cli.config.display()))?;

    if let Some(base_url) = cli.base_url {
        settings.pasoe.base_url = base_url;
    }
    if let Some(web_app) = cli.web_app {
        settings.pasoe.web_app = web_app;
    }
    if let Some(username) = cli.username {
        settings.pasoe.username = Some(username);
    }
    if let Some(password) = cli.password {
        settings.pasoe.password = Some(password);
    }

    let client = RestClient::new(settings.pasoe).context("build PASOE REST client")?;
    tracing::info!(
        base_url = %client.config().base_url,
        web_app = %client.config().web_app,
        "starting PASOE MCP bridge on stdio"
    );

    let service = tools::PasoeTools::new(client)
        .serve(stdio())
        .await
        .context("serve MCP over stdio")?;
    service.waiting().await.context("MCP session ended abnormally")?;

    Ok(())
}
