use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use toolrun_cli::client::ToolClient;
use toolrun_cli::commands::{RunCommand, ShowCommand, ToolsCommand};
use toolrun_cli::error::ClientResult;
use toolrun_cli::output::OutputFormat;

#[derive(Parser)]
#[command(name = "toolrun-cli")]
#[command(about = "Toolrun CLI - run AI tools through a toolrun gateway")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(
        long,
        short = 'u',
        global = true,
        default_value = "http://127.0.0.1:8787",
        help = "Gateway base URL"
    )]
    pub url: String,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Run a tool and stream its output")]
    Run(RunCommand),

    #[clap(about = "List available tools")]
    Tools(ToolsCommand),

    #[clap(about = "Show a tool's inputs")]
    Show(ShowCommand),
}

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = run().await {
        tracing::debug!("{e}");
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> ClientResult<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let client = ToolClient::new(&cli.url)?;

    match &cli.command {
        Command::Run(cmd) => cmd.execute(&client, format).await,
        Command::Tools(cmd) => cmd.execute(&client, format).await,
        Command::Show(cmd) => cmd.execute(&client, format).await,
    }
}
