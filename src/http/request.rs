//! HTTP request reader & dispatcher (§4.3).
//!
//! The request line and every header line are read one byte at a time with a
//! two-state "saw CR" flag. This is deliberate and MUST be preserved (§9): a
//! buffered or `memchr`-scanned line reader could read past the blank line that
//! terminates the headers and swallow the first bytes of a POST body, which the
//! CGI POST sub-protocol (§4.8.2) needs to stream untouched straight from the
//! socket.
use crate::errors::ErrorKind;
use crate::http::types::Method;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// Maximum size of the request line buffer, §3/§8 boundary tests.
pub const LINE_BUF_MAX: usize = 4096;
const METHOD_MAX: usize = 7;
const PATH_MAX: usize = 255;
const PROTOCOL_MAX: usize = 15;

/// The parsed first line of an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub path: String,
    pub protocol: String,
}

/// Outcome of reading one CRLF-terminated line byte at a time.
#[derive(Debug, PartialEq, Eq)]
enum LineOutcome {
    /// Raw bytes up to and including the terminating CRLF.
    Line(Vec<u8>),
    /// Peer closed the connection before any byte was read.
    EofEmpty,
    /// Peer closed the connection after at least one byte was read.
    EofPartial,
    /// `max_len` was reached without seeing a CRLF.
    TooLong,
}

async fn read_crlf_line(
    stream: &mut TcpStream,
    max_len: usize,
    timeout: Duration,
) -> Result<LineOutcome, ErrorKind> {
    let mut buf = Vec::with_capacity(64.min(max_len));
    let mut saw_cr = false;
    let mut byte = [0u8; 1];

    loop {
        let n = match tokio::time::timeout(timeout, stream.read(&mut byte)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(ErrorKind::from(e)),
            Err(_elapsed) => return Err(ErrorKind::ClientTimeout),
        };

        if n == 0 {
            return Ok(if buf.is_empty() {
                LineOutcome::EofEmpty
            } else {
                LineOutcome::EofPartial
            });
        }

        let b = byte[0];
        buf.push(b);

        if saw_cr {
            if b == b'\n' {
                return Ok(LineOutcome::Line(buf));
            }
            saw_cr = false;
        }
        if b == b'\r' {
            saw_cr = true;
        }

        // A CR landing exactly on the limit still deserves one more byte to
        // see whether it completes the line; only give up once the buffer is
        // full AND we are not one byte away from a terminator.
        if buf.len() >= max_len && !saw_cr {
            return Ok(LineOutcome::TooLong);
        }
    }
}

fn strip_trailing_crlf(raw: &[u8]) -> &[u8] {
    raw.strip_suffix(b"\r\n").unwrap_or(raw)
}

fn parse_request_line(raw: &[u8]) -> Option<RequestLine> {
    let content = strip_trailing_crlf(raw);
    let text = std::str::from_utf8(content).ok()?;
    let mut tokens = text.split_whitespace();
    let method = tokens.next()?;
    let path = tokens.next()?;
    let protocol = tokens.next()?;
    if method.len() > METHOD_MAX || path.len() > PATH_MAX || protocol.len() > PROTOCOL_MAX {
        return None;
    }
    Some(RequestLine {
        method: Method::from_token(method),
        path: path.to_string(),
        protocol: protocol.to_string(),
    })
}

/// What the caller should do after attempting to read a request's header section.
pub enum HeaderReadOutcome {
    /// A well-formed request line was read and the headers consumed to the blank
    /// line; dispatch to the method handler.
    Dispatch(RequestLine),
    /// Nothing was read, or the client timed out: close without writing anything.
    SilentClose,
    /// Render this error and close.
    RespondAndClose(ErrorKind),
}

/// Reads the request line, then consumes header lines up to the blank line that
/// terminates them, per §4.3 steps 1-6. Never reads the body.
pub async fn read_header_section(
    stream: &mut TcpStream,
    recv_timeout: Duration,
) -> HeaderReadOutcome {
    let line = match read_crlf_line(stream, LINE_BUF_MAX, recv_timeout).await {
        Ok(LineOutcome::Line(raw)) => raw,
        Ok(LineOutcome::EofEmpty) => return HeaderReadOutcome::SilentClose,
        Ok(LineOutcome::EofPartial) => return HeaderReadOutcome::RespondAndClose(ErrorKind::BadRequest),
        Ok(LineOutcome::TooLong) => return HeaderReadOutcome::RespondAndClose(ErrorKind::BadRequest),
        Err(ErrorKind::ClientTimeout) => return HeaderReadOutcome::SilentClose,
        Err(_) => return HeaderReadOutcome::RespondAndClose(ErrorKind::InternalError),
    };

    let Some(request_line) = parse_request_line(&line) else {
        return HeaderReadOutcome::RespondAndClose(ErrorKind::BadRequest);
    };

    loop {
        match read_crlf_line(stream, LINE_BUF_MAX, recv_timeout).await {
            Ok(LineOutcome::Line(raw)) => {
                if raw == b"\r\n" {
                    break;
                }
            }
            Ok(LineOutcome::EofEmpty) => return HeaderReadOutcome::SilentClose,
            Ok(LineOutcome::EofPartial) => {
                return HeaderReadOutcome::RespondAndClose(ErrorKind::BadRequest)
            }
            Ok(LineOutcome::TooLong) => {
                return HeaderReadOutcome::RespondAndClose(ErrorKind::BadRequest)
            }
            Err(ErrorKind::ClientTimeout) => return HeaderReadOutcome::SilentClose,
            Err(_) => return HeaderReadOutcome::RespondAndClose(ErrorKind::InternalError),
        }
    }

    HeaderReadOutcome::Dispatch(request_line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (server, client)
    }

    #[test]
    fn parses_basic_request_line() {
        let rl = parse_request_line(b"GET /index.html HTTP/1.1\r\n").unwrap();
        assert_eq!(rl.method, Method::Get);
        assert_eq!(rl.path, "/index.html");
        assert_eq!(rl.protocol, "HTTP/1.1");
    }

    #[test]
    fn rejects_too_few_tokens() {
        assert!(parse_request_line(b"GET\r\n").is_none());
    }

    #[test]
    fn rejects_oversized_path() {
        let long_path = "/".to_string() + &"a".repeat(300);
        let line = format!("GET {long_path} HTTP/1.1\r\n");
        assert!(parse_request_line(line.as_bytes()).is_none());
    }

    #[tokio::test]
    async fn reads_full_request_headers() {
        let (mut server, mut client) = connected_pair().await;
        client
            .write_all(b"GET /a.html HTTP/1.1\r\nHost: x\r\n\r\n")
            .await
            .unwrap();

        let outcome = read_header_section(&mut server, Duration::from_secs(1)).await;
        match outcome {
            HeaderReadOutcome::Dispatch(rl) => {
                assert_eq!(rl.method, Method::Get);
                assert_eq!(rl.path, "/a.html");
            }
            _ => panic!("expected dispatch"),
        }
    }

    #[tokio::test]
    async fn empty_connection_closes_silently() {
        let (mut server, client) = connected_pair().await;
        drop(client);
        let outcome = read_header_section(&mut server, Duration::from_secs(1)).await;
        assert!(matches!(outcome, HeaderReadOutcome::SilentClose));
    }

    #[tokio::test]
    async fn partial_line_then_close_is_bad_request() {
        let (mut server, mut client) = connected_pair().await;
        client.write_all(b"GET /x").await.unwrap();
        drop(client);
        let outcome = read_header_section(&mut server, Duration::from_secs(1)).await;
        assert!(matches!(
            outcome,
            HeaderReadOutcome::RespondAndClose(ErrorKind::BadRequest)
        ));
    }

    #[tokio::test]
    async fn cr_landing_exactly_on_the_limit_still_completes() {
        let (mut server, mut client) = connected_pair().await;
        // `max_len` content bytes, where the very last one is the CR, with the
        // terminating LF arriving one byte later. A too-long check that fires
        // the instant the buffer reaches `max_len` would reject this even
        // though the line is about to complete.
        let max_len = 16;
        let mut line = "x".repeat(max_len - 1).into_bytes();
        line.push(b'\r');
        line.push(b'\n');
        client.write_all(&line).await.unwrap();

        let outcome = read_crlf_line(&mut server, max_len, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome, LineOutcome::Line(line));
    }

    #[tokio::test]
    async fn line_without_terminator_is_too_long() {
        let (mut server, mut client) = connected_pair().await;
        let max_len = 16;
        client.write_all("x".repeat(max_len).as_bytes()).await.unwrap();
        drop(client);

        let outcome = read_crlf_line(&mut server, max_len, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome, LineOutcome::TooLong);
    }

    #[tokio::test]
    async fn does_not_consume_body_bytes() {
        let (mut server, mut client) = connected_pair().await;
        client
            .write_all(b"POST /s.php HTTP/1.1\r\nContent-Length: 3\r\n\r\na=1")
            .await
            .unwrap();

        let outcome = read_header_section(&mut server, Duration::from_secs(1)).await;
        assert!(matches!(outcome, HeaderReadOutcome::Dispatch(_)));

        let mut rest = [0u8; 3];
        server.read_exact(&mut rest).await.unwrap();
        assert_eq!(&rest, b"a=1");
    }
}
