//! Static file responder (§4.4) and path resolution shared with the CGI and
//! OPTIONS handlers.
use crate::errors::ErrorKind;
use crate::http::response::{rfc1123_date, write_all_loop};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// Platform path length limit used for the §3 boundary check. Linux's
/// `PATH_MAX` is 4096; this implementation uses the same bound regardless of
/// target OS for predictable, testable behavior.
const PATH_MAX: usize = 4096;

const READ_CHUNK: usize = 4096;

/// Resolves `request_path` against `server_root`, per §4.4 step 1 / §6. `/`
/// substitutes `index.html`; any path containing `..` or exceeding the
/// platform path limit is rejected with `BadRequest`.
pub fn resolve_path(server_root: &Path, request_path: &str) -> Result<PathBuf, ErrorKind> {
    if request_path.contains("..") {
        return Err(ErrorKind::BadRequest);
    }

    let relative = if request_path == "/" {
        "index.html"
    } else {
        request_path.trim_start_matches('/')
    };

    let joined = server_root.join(relative);
    if joined.as_os_str().len() >= PATH_MAX {
        return Err(ErrorKind::BadRequest);
    }
    Ok(joined)
}

/// First-substring-match extension table from §4.4. Falls back to
/// `text/plain`.
pub fn content_type_for(path: &Path) -> &'static str {
    let path_str = path.to_string_lossy();
    const TABLE: &[(&str, &str)] = &[
        (".html", "text/html"),
        (".htm", "text/html"),
        (".gif", "image/gif"),
        (".jpeg", "image/jpeg"),
        (".jpg", "image/jpeg"),
        (".mpeg", "video/mpeg"),
        (".mpg", "video/mpeg"),
        (".doc", "application/msword"),
        (".docx", "application/msword"),
        (".pdf", "application/pdf"),
    ];
    for (ext, mime) in TABLE {
        if path_str.contains(ext) {
            return mime;
        }
    }
    "text/plain"
}

/// A resolved static file ready to be streamed: its content type, size, and
/// `Last-Modified` timestamp, plus an open handle positioned at byte 0.
pub struct OpenedFile {
    pub file: File,
    pub content_type: &'static str,
    pub len: u64,
    pub last_modified: SystemTime,
}

/// `stat` + open, per §4.4 steps 3-4. A missing file is `NotFound`; any other
/// open/metadata failure is `InternalError`.
pub async fn open_for_read(path: &Path) -> Result<OpenedFile, ErrorKind> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ErrorKind::NotFound
        } else {
            ErrorKind::InternalError
        }
    })?;
    let file = File::open(path).await.map_err(|_| ErrorKind::InternalError)?;
    Ok(OpenedFile {
        file,
        content_type: content_type_for(path),
        len: metadata.len(),
        last_modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
    })
}

/// Renders the response headers for a static file GET, per §4.4 step 4:
/// `Date`, `Server`, `Last-Modified`, `Content-Length`, `Connection: close`,
/// `Content-Type`.
pub fn render_headers(opened: &OpenedFile, server_signature: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Date: {}\r\n\
         Server: {server_signature}\r\n\
         Last-Modified: {}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         Content-Type: {}\r\n\
         \r\n",
        rfc1123_date(SystemTime::now()),
        rfc1123_date(opened.last_modified),
        opened.len,
        opened.content_type,
    )
}

/// Streams `file` to `stream` in 4096-byte chunks, per §4.4 step 5, looping
/// each chunk's write via [`write_all_loop`] to handle short writes.
pub async fn stream_chunks(mut file: File, stream: &mut TcpStream) -> Result<(), ErrorKind> {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf).await.map_err(|_| ErrorKind::InternalError)?;
        if n == 0 {
            return Ok(());
        }
        write_all_loop(stream, &buf[..n]).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_maps_to_index() {
        let resolved = resolve_path(Path::new("/srv/www"), "/").unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/www/index.html"));
    }

    #[test]
    fn traversal_is_rejected() {
        assert_eq!(
            resolve_path(Path::new("/srv/www"), "/../etc/passwd"),
            Err(ErrorKind::BadRequest)
        );
    }

    #[test]
    fn ordinary_path_joins_cleanly() {
        let resolved = resolve_path(Path::new("/srv/www"), "/a/b.html").unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/www/a/b.html"));
    }

    #[test]
    fn content_type_first_match_wins() {
        assert_eq!(content_type_for(Path::new("/x/page.html")), "text/html");
        assert_eq!(content_type_for(Path::new("/x/report.pdf")), "application/pdf");
        assert_eq!(content_type_for(Path::new("/x/data.bin")), "text/plain");
    }

    #[tokio::test]
    async fn open_missing_file_is_not_found() {
        let result = open_for_read(Path::new("/nonexistent/path/x.html")).await;
        assert_eq!(result.err(), Some(ErrorKind::NotFound));
    }
}
