//! digestd - Concurrent SHA-256 Digest Server
//!
//! Main entry point: parses CLI flags, starts the named-pipe server, and
//! blocks until SIGINT, at which point it drains the queue and shuts the
//! worker pool down in order.

use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use digestd::config::Cli;
use digestd::diagnostics::LogSink;
use digestd::digest::FileDigest;
use digestd::Server;

fn main() -> anyhow::Result<()> {
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("digestd fatal error:");
        eprintln!("{panic_info}");
        if let Some(location) = panic_info.location() {
            eprintln!(
                "location: {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }
    }));

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    log::info!("═══════════════════════════════════════════════");
    log::info!("  digestd - Concurrent SHA-256 Digest Server");
    log::info!("  Version: {}", digestd::VERSION);
    log::info!("═══════════════════════════════════════════════");

    let cli = Cli::parse();
    let config = cli
        .into_config()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    log::info!(
        "starting with {} workers, request fifo {}",
        config.workers,
        config.request_fifo
    );

    let server = Server::bootstrap(
        &config,
        Arc::new(FileDigest),
        Arc::new(LogSink),
    )?;

    let shutdown_requested = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown_requested);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })?;

    log::info!("ready; waiting for SIGINT to shut down");
    while !shutdown_requested.load(Ordering::SeqCst) {
        std::thread::sleep(std::time::Duration::from_millis(config.idle_poll_interval_ms));
    }

    log::info!("shutdown requested, draining queue");
    server.shutdown();
    log::info!("═══════════════════════════════════════════════");
    log::info!("  digestd shutdown complete");
    log::info!("═══════════════════════════════════════════════");

    Ok(())
}
