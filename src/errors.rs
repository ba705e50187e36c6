//! Error kinds and their HTTP rendering.
//!
//! Mirrors the disposition table in the specification (§7): per-connection errors
//! either render a canned HTTP response or cause the connection to close silently
//! after a log line; they never propagate past the connection that produced them.
use std::{error, fmt, io};

/// Per-connection error taxonomy. `BadRequest`/`NotFound`/`NotImplemented`/`InternalError`
/// render a response via [`ErrorKind::as_http`]; `ClientAborted`/`ClientTimeout` close the
/// connection without writing anything back.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    NotImplemented,
    InternalError,
    ClientAborted,
    ClientTimeout,
}

macro_rules! http_errors {
    ($($name:ident: $status_code:expr, $len:literal => $body:literal; )*) => {
        /// Renders this error as a complete `HTTP/1.1` response, matching the fixed
        /// reason-phrase table and the `<h1>...</h1>` bodies of the original responder.
        pub const fn as_http(&self) -> Option<&'static [u8]> {
            match self { $(
                Self::$name => Some(concat!(
                    "HTTP/1.1 ", $status_code, "\r\n",
                    "Content-Type: text/html\r\n",
                    "Content-Length: ", $len, "\r\n",
                    "Connection: close\r\n",
                    "\r\n",
                    $body,
                ).as_bytes()),
            )* _ => None }
        }
    };
}

impl ErrorKind {
    http_errors! {
        BadRequest: "400 Bad Request", "26" => "<h1>400 Bad Request</h1>";
        NotFound: "404 Not Found", "22" => "<h1>404 Not Found</h1>";
        NotImplemented: "501 Not Implemented", "28" => "<h1>501 Not Implemented</h1>";
        InternalError: "500 Internal Server Error", "35" => "<h1>500 Internal Server Error</h1>";
    }
}

impl error::Error for ErrorKind {}
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<io::Error> for ErrorKind {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe => ErrorKind::ClientAborted,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::ClientTimeout,
            _ => ErrorKind::InternalError,
        }
    }
}

/// Startup-only failures: these are never rendered as an HTTP response, only logged
/// and surfaced to `main` as a nonzero exit.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("configuration invalid: {0}")]
    ConfigInvalid(String),

    #[error("failed to open listen socket: {0}")]
    SocketOpenFailed(#[source] io::Error),

    #[error("failed to initialize server resources: {0}")]
    ResourceInitFailed(String),

    #[error("failed to initialize logging: {0}")]
    LoggingInitFailed(String),
}
