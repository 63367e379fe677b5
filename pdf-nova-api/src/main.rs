use anyhow::Context;
use clap::Parser;
use pdf_nova::{cleanup_stale_jobs, NovaConfig};
use pdf_nova_api::{app, AppState};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pdf-nova-api")]
#[command(about = "PDF Nova web server", long_about = None)]
#[command(version)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, env = "PDF_NOVA_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Parent directory of the per-request job directories
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Serve the front end from this directory instead of the embedded copy
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Bind any free port when the configured one is taken
    #[arg(long)]
    fallback_port: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_nova=info,pdf_nova_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = NovaConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = args.work_dir {
        config.work_dir = dir;
    }
    if args.static_dir.is_some() {
        config.static_dir = args.static_dir;
    }

    std::fs::create_dir_all(&config.work_dir)
        .with_context(|| format!("creating {}", config.work_dir.display()))?;
    let removed = cleanup_stale_jobs(&config.work_dir);
    if removed > 0 {
        info!(removed, "removed stale job directories");
    }

    let listener = bind(&config, args.fallback_port).await?;
    let addr = listener.local_addr()?;
    info!("PDF Nova listening on http://{addr}");

    axum::serve(listener, app(AppState::new(config)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn bind(config: &NovaConfig, fallback: bool) -> anyhow::Result<TcpListener> {
    let addr = config.bind_addr();
    match TcpListener::bind(&addr).await {
        Ok(listener) => Ok(listener),
        Err(e) if fallback && e.kind() == std::io::ErrorKind::AddrInUse => {
            warn!(%addr, "address in use, picking a free port");
            TcpListener::bind((config.host.as_str(), 0))
                .await
                .context("binding a fallback port")
        }
        Err(e) => Err(e).with_context(|| format!("cannot bind {addr}")),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
