//! Reactive (task-per-connection, bounded) concurrency strategy (§4.2).
//!
//! Each accepted connection becomes a value moved directly into a freshly
//! spawned task; there is no shared dispatch slot to protect with `ACCEPT`,
//! since `tokio::spawn` hands the task its own owned connection and handler
//! reference without any intermediate shared state (§9 re-architecture hint).
use crate::config::ServerConfig;
use crate::dispatch::serve_connection;
use crate::resources::{ConnectionGuard, Resources};
use crate::server::listener::accept_client;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub async fn run(listener: TcpListener, config: Arc<ServerConfig>, resources: Arc<Resources>) {
    info!("Running in reactive mode, max_clients = {}", resources.max_clients);
    let listener = Arc::new(listener);

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            permit = resources.acquire_barrier() => {
                let listener = Arc::clone(&listener);
                let config = Arc::clone(&config);
                let resources_for_accept = Arc::clone(&resources);
                let resources_for_spawn = Arc::clone(&resources);

                // Accept must race the interrupt too: once a permit is held,
                // waiting on `accept_client` alone would leave ctrl-c unheard
                // for as long as no client connects.
                let accepted = tokio::select! {
                    biased;
                    _ = tokio::signal::ctrl_c() => {
                        drop(permit);
                        break;
                    }
                    accepted = accept_client(&listener) => accepted,
                };
                let (stream, _addr) = match accepted {
                    Ok(pair) => pair,
                    Err(_) => {
                        drop(permit);
                        continue;
                    }
                };

                // The worker waits for `registered_rx` before doing anything
                // else, so its `ConnectionGuard` cannot be dropped — and
                // deregister spawned — until `register` below has already run.
                let (registered_tx, registered_rx) = tokio::sync::oneshot::channel();
                let handle = tokio::spawn(async move {
                    let mut stream = stream;
                    let _ = registered_rx.await;
                    let _guard = ConnectionGuard::new(
                        resources_for_spawn,
                        tokio::task::id(),
                        permit,
                    );
                    serve_connection(&mut stream, &config).await;
                });
                resources_for_accept.register(handle).await;
                let _ = registered_tx.send(());
            }
        }
    }

    resources.shutdown().await;
}
