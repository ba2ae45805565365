//! pollchat-server: chat relay server binary.
//!
//! Loads configuration, starts a multi-threaded runtime with the configured
//! number of workers, and serves until SIGINT/SIGTERM.

use clap::Parser;
use pollchat_server::{ChatServer, ServerConfig};
use std::path::PathBuf;
use tracing::{error, info};

/// pollchat-server: polling chat relay
#[derive(Parser, Debug)]
#[command(name = "pollchat-server", version, about = "Polling chat relay server")]
struct Cli {
    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Listen address
    #[arg(long)]
    bind: Option<String>,

    /// Config file path
    #[arg(long, default_value = "~/.pollchat/server.toml")]
    config: String,

    /// Number of runtime worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Close sessions silent for longer than this (milliseconds)
    #[arg(long)]
    keepalive_timeout_ms: Option<u64>,

    /// Do not post "Hello"/"Bye" lines on login and disconnect
    #[arg(long)]
    no_presence: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    use tracing_subscriber::EnvFilter;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    // Load server config (file + CLI overrides)
    let config_path = PathBuf::from(&cli.config);
    let config = match ServerConfig::load(
        Some(&config_path),
        cli.bind.as_deref(),
        cli.port,
        cli.workers,
        cli.keepalive_timeout_ms,
        cli.no_presence,
    ) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.port,
        workers = config.worker_threads,
        "starting pollchat-server"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .thread_name("pollchat-worker")
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start runtime");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(config)) {
        error!(error = %e, "server error");
        std::process::exit(1);
    }
}

async fn serve(config: ServerConfig) -> pollchat_core::ChatResult<()> {
    let server = ChatServer::bind(config).await?;
    let handle = server.handle();

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("received shutdown signal");
        handle.stop();
    });

    server.run().await
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
