//! Toolrun daemon - streaming gateway for prompt-templated AI tools

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use toolrun_server::config::{Config, GatewaySettings};
use toolrun_server::error::Result;
use toolrun_server::gateway::{GatewayServer, ToolGateway};
use toolrun_server::registry::ToolRegistry;
use toolrun_server::upstream::OpenAiCompatibleProvider;

/// Toolrun - run prompt-templated AI tools and stream the output
#[derive(Parser)]
#[command(name = "toolrun")]
#[command(about = "A streaming gateway that runs prompt-templated AI tools")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Override the listen address from the config file
    #[arg(long, short = 'l', global = true)]
    pub listen: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the gateway server (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config, cli.listen).await,
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,toolrun=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config_path: Option<PathBuf>, listen: Option<String>) -> Result<()> {
    tracing::info!("Starting Toolrun daemon");

    let mut config = Config::load(config_path.as_deref())?;
    if let Some(addr) = listen {
        config.server.listen_addr = addr;
    }
    tracing::debug!("Config loaded: {:?}", config.server);

    let settings = GatewaySettings::from_env(&config.upstream)?;
    if settings.api_key.is_none() {
        tracing::warn!(
            "{} is not set; tool runs will fail until an API key is configured",
            config.upstream.api_key_env
        );
    }
    if settings.model_id.is_none() {
        tracing::warn!(
            "No model configured (set upstream.model or {}); tool runs will fail",
            config.upstream.model_env
        );
    }
    tracing::info!("Upstream settings: {:?}", settings);

    let mut registry = ToolRegistry::with_builtin_tools();
    for tool in config.tools {
        registry.insert(tool);
    }
    tracing::info!("Tool registry ready with {} tools", registry.len());

    let provider = OpenAiCompatibleProvider::new(
        &settings.base_url,
        Duration::from_secs(config.upstream.connect_timeout_secs),
    )?;

    let gateway = ToolGateway::new(Arc::new(registry), settings, Arc::new(provider));
    let server = GatewayServer::new(config.server, Arc::new(gateway));
    server.serve().await
}
