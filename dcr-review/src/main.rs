//! dcr-review - browser-based review of near-duplicate image clusters
//!
//! Loads a clustering manifest (optionally at startup), serves the review
//! UI and its API, and exports the reviewed result as CSV.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dcr_common::config::{ConfigOverrides, ReviewConfig};
use dcr_common::Session;
use dcr_review::api::health::BuildInfo;
use dcr_review::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for dcr-review
#[derive(Parser, Debug)]
#[command(name = "dcr-review")]
#[command(about = "Review near-duplicate image clusters in the browser")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "DCR_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "DCR_BIND")]
    bind: Option<String>,

    /// Config file (default: <config_dir>/dcr/config.toml, or DCR_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base directory for relative image paths
    #[arg(long, env = "DCR_IMAGE_ROOT")]
    image_root: Option<PathBuf>,

    /// Clusters per page
    #[arg(long, env = "DCR_PAGE_SIZE")]
    page_size: Option<usize>,

    /// Log level when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,

    /// Manifest to load at startup
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Prefix joined onto every manifest path (with --csv)
    #[arg(long, requires = "csv")]
    path_prefix: Option<String>,

    /// Open the review page in the default browser
    #[arg(long)]
    open: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        bind_address: args.bind.clone(),
        port: args.port,
        page_size: args.page_size,
        image_root: args.image_root.clone(),
        log_level: args.log_level.clone(),
        open_browser: args.open.then_some(true),
    };
    let config = ReviewConfig::load(args.config.as_deref(), overrides)
        .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("dcr_review={0},dcr_common={0},tower_http=info", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any slow startup work
    let build = BuildInfo::CURRENT;
    info!(
        "Starting dcr-review v{} [{}] built {} ({})",
        build.version, build.git_hash, build.build_timestamp, build.build_profile
    );
    match &config.source {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: defaults"),
    }
    info!("Image root: {}", config.image_root.display());

    let session = match &args.csv {
        Some(csv_path) => {
            let csv = tokio::fs::read_to_string(csv_path)
                .await
                .with_context(|| format!("Failed to read manifest {}", csv_path.display()))?;
            let options = config.session_options();
            let prefix = args.path_prefix.clone();
            let session = tokio::task::spawn_blocking(move || {
                Session::load(&csv, prefix.as_deref(), options)
            })
            .await
            .context("Manifest parser task failed")?
            .with_context(|| format!("Failed to load manifest {}", csv_path.display()))?;
            info!(
                "Preloaded {} ({} clusters)",
                csv_path.display(),
                session.clusters().len()
            );
            session
        }
        None => Session::new(config.session_options()),
    };

    let listen_address = config.listen_address();
    let open_browser = config.open_browser;
    let port = config.port;

    let state = AppState::with_session(session, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_address)
        .await
        .with_context(|| format!("Failed to bind to {}", listen_address))?;
    info!("dcr-review listening on http://{}", listen_address);

    if open_browser {
        open_in_browser(&format!("http://localhost:{}/", port));
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Launch the platform's default browser; failure only logs
fn open_in_browser(url: &str) {
    let mut command = if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start"]);
        c
    } else {
        std::process::Command::new("xdg-open")
    };

    match command.arg(url).spawn() {
        Ok(_) => info!("Opened {} in the default browser", url),
        Err(e) => warn!("Failed to open browser ({}); please open {} manually", e, url),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
