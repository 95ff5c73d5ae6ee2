//! SimBridge server binary: HTTP + WebSocket front door onto a
//! [`RunManager`](ufog_bridge::manager::RunManager).

use anyhow::Result;
use clap::Parser;

use ufog_bridge::manager::RunManager;
use ufog_bridge::routes::build_router;

#[derive(Parser, Debug)]
#[command(name = "ufog-bridge")]
#[command(about = "UtilityFog SimBridge streaming server")]
struct Cli {
    /// Port to listen on.
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Host to bind to.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let addr = format!("{}:{}", cli.host, cli.port);

    let manager = RunManager::new();
    let app = build_router(manager);

    tracing::info!(%addr, "starting SimBridge server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
