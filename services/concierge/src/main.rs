use anyhow::{Context, Result};
use clap::Parser;
use concierge_service::config::Config;
use concierge_service::prompt_loader::Prompts;
use concierge_service::server::{AppState, router};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoLocal;

/// Hotel phone concierge: answers Twilio media streams with a voice agent.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Address to serve on; overrides BIND_ADDRESS.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Directory with system.md and greeting.md; overrides PROMPTS_DIR.
    #[arg(long)]
    prompts_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load application configuration")?;
    let cli = Cli::parse();
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(prompts_dir) = cli.prompts_dir {
        config.prompts_dir = prompts_dir;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    tracing::info!("Configuration loaded successfully. Starting concierge service...");

    // --- 3. Load Prompts ---
    let prompts = Prompts::load_or_default(&config.prompts_dir);

    // --- 4. Serve ---
    let addr = config.bind_address;
    let app = router(AppState::new(config, prompts));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {} (media streams at /ws/twilio)", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
