//! HTTP-to-uwsgi gateway binary.
//!
//! Accepts plain HTTP on the configured listener and forwards every request
//! to a uwsgi backend, relaying the backend's response verbatim.

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uwsgi_bridge::{GatewayConfig, GatewayServer};

#[derive(Parser, Debug)]
#[command(name = "uwsgi-bridge", about = "HTTP to uwsgi gateway")]
struct Args {
    /// Path to a TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uwsgi_bridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = match args.config {
        Some(path) => GatewayConfig::load(&path)?,
        None => GatewayConfig::default(),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    GatewayServer::new(config).run(listener).await?;
    Ok(())
}
