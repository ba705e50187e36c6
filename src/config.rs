//! Configuration provider (§4.10, §1.1).
//!
//! Reads a `server.conf` file located next to the running executable (or at an
//! explicit path), in the line-oriented `key = value` format of the original tool:
//! `#`-prefixed lines and blank lines are ignored, and only the first
//! whitespace-delimited word of a value is kept.
use crate::errors::BootstrapError;
use clap::Parser as ClapParser;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

/// The concurrency discipline the server runs under, selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    Iterative,
    Reactive,
    Pool,
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServerMode::Iterative => "iterative",
            ServerMode::Reactive => "reactive",
            ServerMode::Pool => "pool",
        })
    }
}

/// Command-line overrides layered on top of `server.conf`.
#[derive(Debug, ClapParser)]
#[command(name = "rdc2_web", about = "Concurrent HTTP/1.1 server with CGI support")]
pub struct Cli {
    /// Path to `server.conf`; defaults to the directory containing the executable.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Overrides `server_root` from the config file.
    #[arg(long)]
    pub root: Option<PathBuf>,
}

/// Fully resolved, immutable server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_root: PathBuf,
    pub server_signature: String,
    pub logger_path: PathBuf,
    pub max_clients: usize,
    pub listen_port: u16,
    pub server_mode: ServerMode,
}

impl ServerConfig {
    /// Loads configuration from `explicit_path` if given, else `server.conf` next to
    /// the current executable, applying CLI overrides on top. Fails if mandatory
    /// fields (`server_root`, `server_signature`, `logger_path`) are absent.
    pub fn load(cli: &Cli) -> Result<Self, BootstrapError> {
        let config_path = match &cli.config {
            Some(p) => p.clone(),
            None => default_config_path()?,
        };
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let contents = fs::read_to_string(&config_path).map_err(|e| {
            BootstrapError::ConfigInvalid(format!(
                "unable to read {}: {e}",
                config_path.display()
            ))
        })?;

        let mut server_root: Option<String> = None;
        let mut server_signature: Option<String> = None;
        let mut logger_path: Option<String> = None;
        let mut listen_port: u16 = 8080;
        let mut max_clients: usize = 1;
        let mut server_mode = ServerMode::Iterative;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            // Only the first whitespace-delimited word of the value is kept,
            // matching the original's `remove_spaces`.
            let Some(value) = value.trim().split_whitespace().next() else {
                continue;
            };

            if key.eq_ignore_ascii_case("server_root") {
                server_root = Some(value.to_string());
            } else if key.eq_ignore_ascii_case("server_signature") {
                server_signature = Some(value.to_string());
            } else if key.eq_ignore_ascii_case("logger_path") {
                logger_path = Some(value.to_string());
            } else if key.eq_ignore_ascii_case("listen_port") {
                listen_port = value.parse().unwrap_or(listen_port);
            } else if key.eq_ignore_ascii_case("max_clients") {
                max_clients = value.parse().unwrap_or(max_clients);
            } else if key.eq_ignore_ascii_case("server_mode") {
                server_mode = if value.eq_ignore_ascii_case("pool") {
                    ServerMode::Pool
                } else if value.eq_ignore_ascii_case("reactive") {
                    ServerMode::Reactive
                } else {
                    ServerMode::Iterative
                };
            }
        }

        let server_root = server_root.ok_or_else(|| {
            BootstrapError::ConfigInvalid("missing mandatory key server_root".into())
        })?;
        let server_signature = server_signature.ok_or_else(|| {
            BootstrapError::ConfigInvalid("missing mandatory key server_signature".into())
        })?;
        let logger_path = logger_path.ok_or_else(|| {
            BootstrapError::ConfigInvalid("missing mandatory key logger_path".into())
        })?;

        let mut server_root = config_dir.join(server_root);
        if let Some(root_override) = &cli.root {
            server_root = root_override.clone();
        }

        Ok(ServerConfig {
            server_root,
            server_signature,
            logger_path: config_dir.join(logger_path),
            max_clients: max_clients.max(1),
            listen_port,
            server_mode,
        })
    }
}

fn default_config_path() -> Result<PathBuf, BootstrapError> {
    let exe = std::env::current_exe().map_err(|e| {
        BootstrapError::ConfigInvalid(format!("unable to locate current executable: {e}"))
    })?;
    let dir = exe
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(dir.join("server.conf"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_conf(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("server.conf");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_full_config() {
        let dir = tempdir();
        let path = write_conf(
            dir.path(),
            "# a comment\n\
             server_root = www\n\
             server_signature = rdc2_web/0.1\n\
             logger_path = server.log\n\
             listen_port = 9090\n\
             max_clients = 4\n\
             server_mode = pool\n",
        );
        let cli = Cli {
            config: Some(path),
            root: None,
        };
        let cfg = ServerConfig::load(&cli).unwrap();
        assert_eq!(cfg.server_root, dir.path().join("www"));
        assert_eq!(cfg.server_signature, "rdc2_web/0.1");
        assert_eq!(cfg.listen_port, 9090);
        assert_eq!(cfg.max_clients, 4);
        assert_eq!(cfg.server_mode, ServerMode::Pool);
    }

    #[test]
    fn missing_mandatory_key_fails() {
        let dir = tempdir();
        let path = write_conf(dir.path(), "listen_port = 80\n");
        let cli = Cli {
            config: Some(path),
            root: None,
        };
        assert!(ServerConfig::load(&cli).is_err());
    }

    #[test]
    fn value_keeps_only_first_word() {
        let dir = tempdir();
        let path = write_conf(
            dir.path(),
            "server_root = www extra words\n\
             server_signature = sig\n\
             logger_path = log\n",
        );
        let cli = Cli {
            config: Some(path),
            root: None,
        };
        let cfg = ServerConfig::load(&cli).unwrap();
        assert_eq!(cfg.server_root, dir.path().join("www"));
    }

    #[test]
    fn cli_root_override_wins() {
        let dir = tempdir();
        let path = write_conf(
            dir.path(),
            "server_root = www\nserver_signature = sig\nlogger_path = log\n",
        );
        let cli = Cli {
            config: Some(path),
            root: Some(PathBuf::from("/override")),
        };
        let cfg = ServerConfig::load(&cli).unwrap();
        assert_eq!(cfg.server_root, PathBuf::from("/override"));
    }

    /// Minimal self-cleaning temp dir, avoiding a `tempfile` dependency the
    /// teacher's stack does not otherwise need.
    fn tempdir() -> TempDir {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!("rdc2_web_test_{nanos}_{:?}", std::thread::current().id()));
        fs::create_dir_all(&path).unwrap();
        TempDir(path)
    }

    struct TempDir(PathBuf);
    impl TempDir {
        fn path(&self) -> &Path {
            &self.0
        }
    }
    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }
}
