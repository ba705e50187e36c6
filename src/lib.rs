//! rdc2_web - a concurrent HTTP/1.1 web server with CGI subprocess execution
//!
//! Serves static files and server-side scripts (`.php` via `/bin/php`, `.py` via
//! `/bin/python3 -u`) under a configured document root, dispatching each accepted
//! connection through one of three selectable concurrency strategies.
//!
//! # Concurrency strategies
//!
//! - [`strategy::iterative`] - a single task accepts and serves connections one at a time.
//! - [`strategy::reactive`] - bounded thread(task)-per-connection, admission-controlled
//!   by a counting semaphore (see [`resources::Resources`]).
//! - [`strategy::pool`] - a fixed number of workers compete for `accept`.
//!
//! All three share the same per-connection handler: [`dispatch::serve_connection`].
//!
//! # Quick start
//!
//! ```no_run
//! use clap::Parser;
//! use rdc2_web::config::{Cli, ServerConfig};
//! use rdc2_web::resources::Resources;
//! use rdc2_web::server::listener::open_server_socket;
//! use rdc2_web::strategy;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Arc::new(ServerConfig::load(&Cli::parse())?);
//! let resources = Resources::new(config.max_clients);
//! let listener = open_server_socket(config.listen_port).await?;
//! strategy::iterative::run(listener, config, resources).await;
//! # Ok(())
//! # }
//! ```
//!
//! This is the library half of the crate; [`main`](../src/rdc2_web/main.rs.html) wires
//! configuration, logging, and the chosen strategy together into a runnable binary.

pub mod cgi;
pub mod config;
pub mod errors;
pub mod logging;
pub mod resources;
pub mod static_file;

pub(crate) mod http {
    pub mod request;
    pub mod response;
    pub mod types;
}

pub mod dispatch;

pub mod server {
    pub mod listener;
}

pub mod strategy {
    pub mod iterative;
    pub mod pool;
    pub mod reactive;
}

pub use crate::{
    config::{ServerConfig, ServerMode},
    errors::ErrorKind,
    http::{
        request::RequestLine,
        types::{Method, StatusCode},
    },
};

#[doc(hidden)]
#[cfg(test)]
pub(crate) mod tools {
    use std::str::from_utf8;

    #[inline]
    pub(crate) fn str_op(value: &[u8]) -> &str {
        from_utf8(value).unwrap()
    }
}
