//! Process bootstrap (§4.12): config load → logger init → resource pack init
//! → listener open → strategy-specific dispatch, in that order. Any failure
//! before the listener opens is a fatal startup error.
use anyhow::Context;
use clap::Parser;
use rdc2_web::config::{Cli, ServerConfig, ServerMode};
use rdc2_web::resources::Resources;
use rdc2_web::server::listener::open_server_socket;
use rdc2_web::strategy::{iterative, pool, reactive};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ServerConfig::load(&cli).context("loading server configuration")?;

    let _log_guard =
        rdc2_web::logging::init(&config.logger_path).context("initializing logging")?;

    info!(
        root = %config.server_root.display(),
        port = config.listen_port,
        mode = %config.server_mode,
        "Starting server"
    );

    let resources = Resources::new(config.max_clients);

    let listener = match open_server_socket(config.listen_port).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to open listen socket: {e}");
            return Err(e).context("opening listen socket");
        }
    };

    let config = Arc::new(config);
    match config.server_mode {
        ServerMode::Iterative => iterative::run(listener, config, resources).await,
        ServerMode::Reactive => reactive::run(listener, config, resources).await,
        ServerMode::Pool => pool::run(listener, config, resources).await,
    }

    Ok(())
}
