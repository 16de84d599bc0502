//! threaded-sockets server and route tooling.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;

use threaded_sockets::config::{load_config, ServerConfig};
use threaded_sockets::lifecycle::{signals, startup, Shutdown};
use threaded_sockets::observability::logging;
use threaded_sockets::routing::RouteTable;
use threaded_sockets::demo;

#[derive(Parser)]
#[command(name = "threaded-sockets", version)]
#[command(about = "WebSocket endpoints routed alongside an HTTP app", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo server (default)
    Serve,
    /// Print the HTTP and socket route tables as JSON
    Routes,
    /// Build a URL for an HTTP or socket endpoint
    UrlFor {
        endpoint: String,
        /// Values as KEY=VALUE
        values: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Routes => print_routes(),
        Commands::UrlFor { endpoint, values } => print_url(config, &endpoint, &values),
    }
}

async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging(&config.observability)?;
    tracing::info!("threaded-sockets v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        socket_scheme = %config.url.socket_scheme,
        "Configuration loaded"
    );

    let dispatcher = demo::dispatcher(&config)?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());
    startup::serve(config, dispatcher, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn print_routes() -> Result<(), Box<dyn std::error::Error>> {
    let sockets = demo::sockets()?;
    let http = demo::http_routes()?;

    let routes = json!({
        "http": describe(http.table()),
        "sockets": describe(sockets.url_map()),
    });
    println!("{}", serde_json::to_string_pretty(&routes)?);
    Ok(())
}

fn describe(table: &RouteTable) -> serde_json::Value {
    table
        .rules()
        .map(|rule| {
            json!({
                "pattern": rule.pattern().source(),
                "endpoint": rule.endpoint(),
                "methods": rule
                    .methods()
                    .map(|methods| methods.iter().map(|m| m.to_string()).collect::<Vec<_>>()),
            })
        })
        .collect()
}

fn print_url(
    mut config: ServerConfig,
    endpoint: &str,
    values: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let pairs = values
        .iter()
        .map(|value| {
            value
                .split_once('=')
                .ok_or_else(|| format!("expected KEY=VALUE, got {value:?}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if config.url.server_name.is_none() {
        config.url.server_name = Some(config.listener.bind_address.clone());
    }
    let urls = demo::dispatcher(&config)?
        .url_builder()
        .ok_or("url.server_name is not set")?;

    println!("{}", urls.external_url_for(endpoint, &pairs)?);
    Ok(())
}
