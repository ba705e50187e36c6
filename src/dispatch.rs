//! Per-connection dispatcher (§4.3 step 7, §4.4-§4.6).
//!
//! Ties the header reader, method dispatch, static file responder, and CGI
//! coordinator together into the single `handle(conn) -> ()` function every
//! concurrency strategy (§4.2) calls.
use crate::cgi;
use crate::config::ServerConfig;
use crate::errors::ErrorKind;
use crate::http::request::{read_header_section, HeaderReadOutcome, RequestLine};
use crate::http::response::{send_http_response, write_all_loop};
use crate::http::types::{Method, StatusCode};
use crate::server::listener::CONNECTION_RECV_TIMEOUT;
use crate::static_file;
use std::path::Path;
use tokio::net::TcpStream;
use tracing::warn;

/// Reads and dispatches exactly one request on `stream`, then returns. Every
/// exit path — static file, CGI, OPTIONS, or an error response — closes the
/// connection; there is no keep-alive (§1 Non-goals).
pub async fn serve_connection(stream: &mut TcpStream, config: &ServerConfig) {
    match read_header_section(stream, CONNECTION_RECV_TIMEOUT).await {
        HeaderReadOutcome::SilentClose => {}
        HeaderReadOutcome::RespondAndClose(kind) => {
            respond_error(stream, kind).await;
        }
        HeaderReadOutcome::Dispatch(request_line) => {
            if let Err(kind) = dispatch(stream, config, &request_line).await {
                respond_error(stream, kind).await;
            }
        }
    }
}

async fn respond_error(stream: &mut TcpStream, kind: ErrorKind) {
    if let Some(rendered) = kind.as_http() {
        if let Err(e) = write_all_loop(stream, rendered).await {
            warn!("Failed to write error response: {e}");
        }
    }
}

async fn dispatch(
    stream: &mut TcpStream,
    config: &ServerConfig,
    request: &RequestLine,
) -> Result<(), ErrorKind> {
    match request.method {
        Method::Get => handle_get(stream, config, &request.path).await,
        Method::Post => handle_post(stream, config, &request.path).await,
        Method::Options => handle_options(stream, config, &request.path).await,
        Method::Other => Err(ErrorKind::NotImplemented),
    }
}

/// §4.4: resolve, try as a script, else serve the file from disk.
async fn handle_get(
    stream: &mut TcpStream,
    config: &ServerConfig,
    request_path: &str,
) -> Result<(), ErrorKind> {
    let resolved = static_file::resolve_path(&config.server_root, request_path)?;
    let resolved_str = resolved.to_string_lossy().into_owned();

    if let Some(invocation) = cgi::parse_script_args(&resolved_str) {
        let output = cgi::run_get(&invocation).await?;
        return send_http_response(stream, StatusCode::Ok, "text/plain", &output).await;
    }

    // Not a script: the original discards the query string as a side effect of
    // `parse_script_args`' `strtok(path, "?")` before `stat`-ing the path, so a
    // static request carrying one (e.g. `/style.css?v=2`) still serves the
    // bare file rather than 404ing on the literal joined path.
    let static_path = match resolved_str.split_once('?') {
        Some((path, _query)) => Path::new(path).to_path_buf(),
        None => resolved,
    };
    let opened = static_file::open_for_read(&static_path).await?;
    let headers = static_file::render_headers(&opened, &config.server_signature);
    write_all_loop(stream, headers.as_bytes()).await?;
    static_file::stream_chunks(opened.file, stream).await
}

/// §4.5: POST is only meaningful against a script; anything else is `501`.
async fn handle_post(
    stream: &mut TcpStream,
    config: &ServerConfig,
    request_path: &str,
) -> Result<(), ErrorKind> {
    let resolved = static_file::resolve_path(&config.server_root, request_path)?;
    let resolved_str = resolved.to_string_lossy().into_owned();

    let Some(invocation) = cgi::parse_script_args(&resolved_str) else {
        return Err(ErrorKind::NotImplemented);
    };

    let output = cgi::run_post(&invocation, stream).await?;
    send_http_response(stream, StatusCode::Ok, "text/plain", &output).await
}

/// §4.6: `OPTIONS *` reports the server-wide method set; otherwise the target
/// must exist, and the reported `Allow` set depends on whether it is a
/// script.
async fn handle_options(
    stream: &mut TcpStream,
    config: &ServerConfig,
    request_path: &str,
) -> Result<(), ErrorKind> {
    if request_path == "*" {
        return send_options(stream, "GET,POST,OPTIONS").await;
    }

    let resolved = static_file::resolve_path(&config.server_root, request_path)?;
    tokio::fs::metadata(&resolved)
        .await
        .map_err(|_| ErrorKind::NotFound)?;

    let is_script = cgi::parse_script_args(&resolved.to_string_lossy()).is_some();
    let allow = if is_script { "GET,POST,OPTIONS" } else { "GET,OPTIONS" };
    send_options(stream, allow).await
}

async fn send_options(stream: &mut TcpStream, allow: &str) -> Result<(), ErrorKind> {
    let header = format!(
        "HTTP/1.1 200 OK\r\nAllow: {allow}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    );
    write_all_loop(stream, header.as_bytes()).await
}
