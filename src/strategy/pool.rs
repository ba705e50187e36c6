//! Pool concurrency strategy (§4.2): a fixed set of workers compete for `accept`.
use crate::config::ServerConfig;
use crate::dispatch::serve_connection;
use crate::resources::Resources;
use crate::server::listener::accept_client;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Spawns exactly `resources.max_clients` workers up front, then waits for
/// the interrupt signal.
pub async fn run(listener: TcpListener, config: Arc<ServerConfig>, resources: Arc<Resources>) {
    info!("Running in pool mode with {} workers", resources.max_clients);
    let listener = Arc::new(listener);

    for _ in 0..resources.max_clients {
        let listener = Arc::clone(&listener);
        let config = Arc::clone(&config);
        let worker_resources = Arc::clone(&resources);
        let handle = tokio::spawn(worker_loop(listener, config, Arc::clone(&worker_resources)));
        resources.register(handle).await;
    }

    tokio::signal::ctrl_c().await.ok();
    resources.shutdown().await;
}

/// §4.2 Pool worker: acquire `ACCEPT`, accept, release `ACCEPT`, serve, repeat.
async fn worker_loop(listener: Arc<TcpListener>, config: Arc<ServerConfig>, resources: Arc<Resources>) {
    loop {
        let accepted = resources
            .serialize_accept(|| accept_client(&listener))
            .await;

        let Ok((mut stream, _addr)) = accepted else {
            continue;
        };

        serve_connection(&mut stream, &config).await;
    }
}
