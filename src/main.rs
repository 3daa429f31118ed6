pub mod config;
pub mod controller;
pub mod engine;
pub mod mapping;
pub mod output;

use crate::config::AppConfig;
use crate::engine::{build_sink, build_source, LoopSettings, PollLoop};
use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

// Sources and sinks hold OS handles that are not Send, so everything runs on one thread
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup()?;

    let config_path = AppConfig::resolve_path()?;
    AppConfig::ensure_default_config(&config_path).await?;
    let config = AppConfig::load(&config_path).await?;
    setup_logging_env(&config.log_level);
    info!("Using config file {}", config_path.display());

    let layout = config
        .validate()
        .map_err(|e| eyre!("Invalid config {}: {}", config_path.display(), e))?;

    let source = build_source(&config).map_err(|e| eyre!("Failed to open controller: {}", e))?;
    let sink = build_sink(&config).map_err(|e| eyre!("Failed to open input sink: {}", e))?;
    let poll_loop = PollLoop::create(source, sink, layout, LoopSettings::from_config(&config))
        .map_err(|e| eyre!("Failed to create poll loop: {}", e))?;

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), shutdown));

    let poll_loop = poll_loop.run_until_cancelled(token).await;

    let stats = poll_loop.stats();
    info!(
        "Poll loop stopped after {} cycles: {} batches, {} events, {} failed injections",
        stats.cycles, stats.batches_dispatched, stats.events_dispatched, stats.injection_failures
    );
    if stats.injection_failures > 0 {
        warn!("Some key events never reached the host");
    }

    Ok(())
}

/// Cancels `token` once `signal` fires. A listener that fails to install leaves the token
/// alone so the loop keeps running.
async fn cancel_on_signal<F>(signal: F, token: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Ctrl-C received, shutting down");
            token.cancel();
        }
        Err(e) => error!("Failed to listen for Ctrl-C, stop the process another way: {}", e),
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    Ok(())
}

fn setup_logging_env(log_level: &str) {
    let level = Level::from_str(log_level).unwrap_or(Level::INFO);
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_cancels_the_token() {
        let token = CancellationToken::new();
        cancel_on_signal(std::future::ready(Ok(())), token.clone()).await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn failed_listener_keeps_the_loop_running() {
        let token = CancellationToken::new();
        let signal = std::future::ready(Err(std::io::Error::other("no signal handler")));
        cancel_on_signal(signal, token.clone()).await;
        assert!(!token.is_cancelled());
    }
}
