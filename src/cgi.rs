//! CGI subprocess coordinator (§4.7, §4.8).
//!
//! Builds the interpreter argv from a resolved path, then runs the GET or POST
//! sub-protocol: spawn the interpreter with piped stdio, optionally stream a
//! decoded request body into its stdin, collect its stdout, and reap it.
use crate::errors::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::warn;

/// Receive timeout applied to the client socket while streaming a POST body
/// into the CGI child, per §4.8.2. Restored to the connection's normal
/// timeout by the caller once streaming ends.
pub const POST_BODY_TIMEOUT: Duration = Duration::from_secs(3);

const READ_CHUNK: usize = 4096;

/// The argv this server would hand to `exec`, as an owned list. No explicit
/// null sentinel is needed: `Vec<String>`'s own length is the terminator, and
/// its `Drop` frees everything on every exit path, including cancellation.
#[derive(Debug, PartialEq, Eq)]
pub struct ScriptInvocation {
    pub interpreter: String,
    pub args: Vec<String>,
}

/// Splits `joined_path` on the first `?`, identifies the interpreter from the
/// script extension, and appends positional, URL-decoded query values.
/// Returns `None` if the path is not a recognized script, per §4.7 step 4.
pub fn parse_script_args(joined_path: &str) -> Option<ScriptInvocation> {
    let (script_path, query) = match joined_path.split_once('?') {
        Some((s, q)) => (s, Some(q)),
        None => (joined_path, None),
    };

    let mut args = if script_path.contains(".php") {
        vec!["/bin/php".to_string(), script_path.to_string()]
    } else if script_path.contains(".py") {
        vec![
            "/bin/python3".to_string(),
            "-u".to_string(),
            script_path.to_string(),
        ]
    } else {
        return None;
    };

    let interpreter = args[0].clone();

    if let Some(query) = query {
        for value in query_values(query) {
            args.push(value);
        }
    }

    Some(ScriptInvocation { interpreter, args })
}

/// Extracts just the values of a `k1=v1&k2=v2` query string, URL-decoded.
/// Keys are discarded by design (§4.7 step 5, §9: preserved for test parity).
fn query_values(query: &str) -> Vec<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(_key, value)| decode_query_value(value))
        .collect()
}

/// `+` → space, `%HH` → the byte with hex value `HH` (uppercase hex, two
/// digits required; any other `%` sequence is left untouched).
pub fn decode_query_value(raw: &str) -> String {
    String::from_utf8_lossy(&decode_query_value_bytes(raw.as_bytes())).into_owned()
}

fn is_hex(b: u8) -> bool {
    b.is_ascii_hexdigit()
}

fn hex_val(b: u8) -> u8 {
    (b as char).to_digit(16).unwrap_or(0) as u8
}

/// Spawns `invocation` with piped stdin/stdout/stderr. The closure captures
/// nothing from the caller's connection or resource state, so the child
/// inherits no parent socket, semaphore, or table reference across `exec` —
/// the sanitation step §4.8.1 step 2c calls for.
fn spawn_interpreter(invocation: &ScriptInvocation) -> std::io::Result<Child> {
    Command::new(&invocation.interpreter)
        .args(&invocation.args[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
}

/// Reads the child's stdout to EOF in 4096-byte chunks and waits for it to
/// exit, per §4.8.1 steps 3b-3c.
async fn collect_output(mut child: Child) -> Result<Vec<u8>, ErrorKind> {
    let mut stdout = child.stdout.take().expect("stdout was piped");
    let mut output = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = stdout
            .read(&mut chunk)
            .await
            .map_err(ErrorKind::from)?;
        if n == 0 {
            break;
        }
        output.extend_from_slice(&chunk[..n]);
    }
    drop(stdout);
    child.wait().await.map_err(ErrorKind::from)?;
    Ok(output)
}

/// GET sub-protocol (§4.8.1): no request body, just collect stdout.
pub async fn run_get(invocation: &ScriptInvocation) -> Result<Vec<u8>, ErrorKind> {
    let mut child = spawn_interpreter(invocation).map_err(|e| {
        warn!("Failed to spawn CGI interpreter {}: {e}", invocation.interpreter);
        ErrorKind::InternalError
    })?;
    drop(child.stdin.take());
    collect_output(child).await
}

/// POST sub-protocol (§4.8.2): streams a decoded request body from the client
/// socket into the child's stdin, applying a 3-second receive timeout that
/// does not honor `Content-Length` — preserved as a conscious simplification.
pub async fn run_post(
    invocation: &ScriptInvocation,
    client: &mut TcpStream,
) -> Result<Vec<u8>, ErrorKind> {
    let mut child = spawn_interpreter(invocation).map_err(|e| {
        warn!("Failed to spawn CGI interpreter {}: {e}", invocation.interpreter);
        ErrorKind::InternalError
    })?;
    let mut stdin = child.stdin.take().expect("stdin was piped");

    if let Err(e) = stream_decoded_body(client, &mut stdin).await {
        warn!("Error streaming request body to CGI child: {e}");
    }
    drop(stdin);

    collect_output(child).await
}

/// Reads `key=value&key=value` pairs byte-by-byte from `client` under a
/// 3-second timeout. Each value's raw bytes are buffered until its terminating
/// `&` (or EOF/timeout), then decoded with the same rules as
/// [`decode_query_value`] and written to `sink`, per §4.8.2 step 2.
async fn stream_decoded_body(
    client: &mut TcpStream,
    sink: &mut tokio::process::ChildStdin,
) -> Result<(), ErrorKind> {
    #[derive(PartialEq, Eq)]
    enum State {
        Key,
        Value,
    }

    let mut state = State::Key;
    let mut value_buf: Vec<u8> = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        let n = match tokio::time::timeout(POST_BODY_TIMEOUT, client.read(&mut byte)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(ErrorKind::from(e)),
            Err(_elapsed) => break,
        };
        if n == 0 {
            break;
        }

        let b = byte[0];
        match state {
            State::Key if b == b'=' => state = State::Value,
            State::Key => {}
            State::Value if b == b'&' => {
                write_or_abort(sink, decode_query_value_bytes(&value_buf).as_slice()).await?;
                value_buf.clear();
                state = State::Key;
            }
            State::Value => value_buf.push(b),
        }
    }

    if !value_buf.is_empty() {
        write_or_abort(sink, decode_query_value_bytes(&value_buf).as_slice()).await?;
    }
    Ok(())
}

/// Byte-buffer variant of [`decode_query_value`], used once a value's raw
/// bytes have been fully buffered.
fn decode_query_value_bytes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < raw.len() && is_hex(raw[i + 1]) && is_hex(raw[i + 2]) => {
                out.push((hex_val(raw[i + 1]) << 4) | hex_val(raw[i + 2]));
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

async fn write_or_abort(
    sink: &mut tokio::process::ChildStdin,
    bytes: &[u8],
) -> Result<(), ErrorKind> {
    match sink.write_all(bytes).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            warn!("CGI child closed stdin before the full body was streamed.");
            Err(ErrorKind::ClientAborted)
        }
        Err(e) => Err(ErrorKind::from(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn php_script_with_no_query() {
        let inv = parse_script_args("/srv/www/hello.php").unwrap();
        assert_eq!(inv.interpreter, "/bin/php");
        assert_eq!(inv.args, vec!["/bin/php", "/srv/www/hello.php"]);
    }

    #[test]
    fn python_script_gets_unbuffered_flag() {
        let inv = parse_script_args("/srv/www/echo.py").unwrap();
        assert_eq!(
            inv.args,
            vec!["/bin/python3", "-u", "/srv/www/echo.py"]
        );
    }

    #[test]
    fn non_script_path_returns_none() {
        assert!(parse_script_args("/srv/www/index.html").is_none());
    }

    #[test]
    fn query_values_are_decoded_and_keys_discarded() {
        let inv = parse_script_args("/srv/www/echo.py?x=hello%20world&y=a+b").unwrap();
        assert_eq!(
            &inv.args[3..],
            &["hello world".to_string(), "a b".to_string()]
        );
    }

    #[test]
    fn decode_query_value_handles_plus_and_percent() {
        assert_eq!(decode_query_value("a+b%205"), "a b 5");
    }

    #[test]
    fn decode_query_value_leaves_bad_escape_untouched() {
        assert_eq!(decode_query_value("50%"), "50%");
    }
}
