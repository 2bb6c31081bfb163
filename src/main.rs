//! http-echo
//!
//! A configurable HTTP test endpoint built with Tokio, Hyper and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                    HTTP ECHO                      │
//!                         │                                                   │
//!     Client Request      │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!     ────────────────────┼─▶│   net   │──▶│   http   │──▶│     echo     │   │
//!                         │  │listener │   │  server  │   │   resolver   │   │
//!                         │  │tls/take-│   │ handler  │   │latency/codes │   │
//!                         │  │  over   │   └────┬─────┘   └──────────────┘   │
//!                         │  └────▲────┘        │                             │
//!                         │       │             ├──▶ proxy ──────────────────┼──▶ Upstream
//!     Client Response     │       │             │                             │
//!     ◀───────────────────┼───────┴─────────────┴─ response | close | raw    │
//!                         │                                                   │
//!                         │  config · lifecycle · observability · resilience  │
//!                         └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use http_echo::config::loader;
use http_echo::config::watcher::ConfigWatcher;
use http_echo::config::Cli;
use http_echo::lifecycle::{shutdown_signal, Shutdown};
use http_echo::net::listener::Listener;
use http_echo::observability::logging;
use http_echo::EchoServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = loader::load(&cli)?;

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "http-echo starting");
    tracing::info!(
        address = %config.listener.bind_address(),
        tls = config.listener.tls.is_some(),
        code = %config.response.code,
        delay_ms = config.response.delay_ms,
        jitter_ms = config.response.jitter_ms,
        proxy = ?config.proxy.target,
        override_mode = ?config.response.override_mode,
        "Configuration loaded"
    );

    let listener = Listener::bind(&config.listener).await?;
    println!("Listening on: {}", listener.local_addr()?);

    let server = EchoServer::new(config.clone())?;
    let settings = server.settings();

    // Keep the watcher alive for the life of the process.
    let _watcher = match (&cli.config, config.watch) {
        (Some(path), true) => {
            let (watcher, mut updates) = ConfigWatcher::new(path, cli.clone());
            let handle = watcher.run()?;
            tokio::spawn(async move {
                while let Some(new_config) = updates.recv().await {
                    let body = match loader::load_body(&new_config.response) {
                        Ok(body) => body,
                        Err(e) => {
                            tracing::error!(error = %e, "Reload rejected");
                            continue;
                        }
                    };
                    if let Err(e) = settings.reload(&new_config, body) {
                        tracing::error!(error = %e, "Reload rejected");
                    }
                }
            });
            Some(handle)
        }
        (None, true) => {
            tracing::warn!("--watch has no effect without --config");
            None
        }
        _ => None,
    };

    let shutdown = Shutdown::new();
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        result = &mut server_task => {
            result??;
            return Ok(());
        }
        _ = shutdown_signal() => {
            shutdown.trigger();
        }
    }

    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
