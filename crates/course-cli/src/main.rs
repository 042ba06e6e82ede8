//! Course Architect server
//!
//! Serves the course wizard API, its WebSocket event stream and the export
//! endpoint for the browser front-end.

mod export;

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use course_orchestrator::{
    create_router_with, AppState, Config, Credential, GeminiBackend, CREDENTIAL_ENV_VAR,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Default bind address.
const DEFAULT_HOST: &str = "127.0.0.1";

/// Course Architect - AI-assisted course design
///
/// Generates a course plan from a topic, objective and audience, lets you
/// revise it, then writes the content of every section.
#[derive(Parser, Debug)]
#[command(name = "course-architect")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: course.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Address to bind the HTTP API server to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port for the HTTP API server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Course Architect starting");
    tracing::debug!(config = ?args.config, "Config file");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads configuration and credentials, then serves until Ctrl+C.
async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    print_config(&config);

    let credential = Credential::from_env().map_err(|e| {
        anyhow::anyhow!(
            "{e}\n\nSuggestion: export {CREDENTIAL_ENV_VAR}=<your Gemini API key> before starting the server"
        )
    })?;

    let backend = Arc::new(GeminiBackend::new(&config.api_base_url, credential));
    let router = create_router_with(AppState::new(config, backend), export::export_routes());

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {e}", args.host))?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("Course Architect API running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received Ctrl+C, shutting down");
    }
}

fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Plan model: {}", config.plan_model);
    println!("  Content model: {}", config.content_model);
    println!("  Chat model: {}", config.chat_model);
    println!("  Content language: {}", config.content_language);
    println!("  API base URL: {}", config.api_base_url);
}
