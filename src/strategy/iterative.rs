//! Iterative concurrency strategy (§4.2).
//!
//! A single task accepts and serves one connection at a time to completion.
//! `BARRIER` is never acquired in this mode — that is the intended semantics,
//! not an oversight (§9) — so `max_clients` has no effect here beyond the
//! one-time warning below.
use crate::config::ServerConfig;
use crate::dispatch::serve_connection;
use crate::resources::Resources;
use crate::server::listener::accept_client;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Runs the iterative accept loop until an interrupt signal arrives.
pub async fn run(listener: TcpListener, config: Arc<ServerConfig>, resources: Arc<Resources>) {
    if resources.max_clients > 1 {
        warn!("server_mode = iterative ignores max_clients > 1");
    }

    info!("Running in iterative mode");
    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            accepted = accept_client(&listener) => {
                match accepted {
                    Ok((mut stream, _addr)) => {
                        serve_connection(&mut stream, &config).await;
                    }
                    Err(_) => continue,
                }
            }
        }
    }

    resources.shutdown().await;
}
