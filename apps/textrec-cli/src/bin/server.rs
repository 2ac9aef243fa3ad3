use anyhow::{Context, Result};
use clap::Parser;
use textrec_cli::api::{create_router, AppState};
use textrec_cli::init_tracing;
use textrec_core::config::Config;
use tracing::info;

#[derive(Parser)]
#[command(name = "textrec-server", about = "Serve text recommendations over HTTP")]
struct Args {
    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Reload the artifact set when a new build is published
    #[arg(long)]
    hot_reload: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut settings = Config::load()?.serve_settings()?;
    if let Some(v) = args.host { settings.host = v; }
    if let Some(v) = args.port { settings.port = v; }
    if args.hot_reload { settings.hot_reload = true; }

    let addr = format!("{}:{}", settings.host, settings.port);
    info!(models_dir = %settings.models_dir.display(), hot_reload = settings.hot_reload, "Loading artifact set");
    let state = tokio::task::spawn_blocking(move || AppState::load(settings)).await?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    info!(addr = %addr, "textrec-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received shutdown signal");
}
