use crate::ProteusError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The smallest read buffer hyper accepts.
const MIN_BUFFER_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// Server and engine configuration.
///
/// Every field has a default, so a configuration file only names what it
/// changes:
///
/// ```rust
/// let config = proteus::ServerConfig::from_toml_str(r#"
///     address = "0.0.0.0:8080"
///     http2 = false
/// "#).unwrap();
/// assert_eq!(config.address, "0.0.0.0:8080");
/// assert_eq!(config.backlog, 10_000);
/// ```
pub struct ServerConfig {
    /// The address to listen on.
    pub address: String,
    /// Size of the blocking pool used for file I/O, such as spooling
    /// uploads.
    pub io_threads: usize,
    /// Number of worker threads running handlers.
    pub worker_threads: usize,
    /// Whether HTTP/2 (prior knowledge) is accepted next to HTTP/1.1.
    pub http2: bool,
    /// The TCP accept backlog.
    pub backlog: u32,
    /// The per-connection read buffer size, in bytes.  Raised to 8 KiB if
    /// set lower.
    pub buffer_size: usize,
    /// The largest request body read, in bytes.
    pub max_request_size: u64,
    /// Whether an optional body that fails to decode is a 400, rather than
    /// absent.
    pub strict_optional_bodies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism().map_or(1, usize::from);

        ServerConfig {
            address: "127.0.0.1:8090".to_owned(),
            io_threads: cpus,
            worker_threads: cpus * 2,
            http2: true,
            backlog: 10_000,
            buffer_size: 16 * 1024,
            max_request_size: 10 * 1024 * 1024,
            strict_optional_bodies: false,
        }
    }
}

impl ServerConfig {
    /// Parses a configuration from TOML.
    ///
    /// # Errors
    /// Fails if the document is not valid TOML, or names an unknown field.
    pub fn from_toml_str(source: &str) -> Result<Self, ProteusError> {
        toml::from_str(source).map_err(ProteusError::Config)
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    /// Fails if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProteusError> {
        let path = path.as_ref();
        log::debug!("loading configuration from {}", path.display());
        let source = std::fs::read_to_string(path).map_err(ProteusError::Io)?;
        Self::from_toml_str(&source)
    }

    /// The read buffer size handed to the engine.
    pub fn effective_buffer_size(&self) -> usize {
        self.buffer_size.max(MIN_BUFFER_SIZE)
    }

    /// Builds the multi-threaded runtime the server runs on.
    ///
    /// # Errors
    /// Fails if the runtime could not be started.
    pub fn runtime(&self) -> Result<tokio::runtime::Runtime, ProteusError> {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.worker_threads.max(1))
            .max_blocking_threads(self.io_threads.max(1))
            .thread_name("proteus-worker")
            .enable_all()
            .build()
            .map_err(ProteusError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address, "127.0.0.1:8090");
        assert_eq!(config.worker_threads, config.io_threads * 2);
        assert!(config.http2);
        assert_eq!(config.buffer_size, 16384);
        assert!(!config.strict_optional_bodies);
    }

    #[test]
    fn partial_document() {
        let config = ServerConfig::from_toml_str(
            r#"
            worker_threads = 3
            strict_optional_bodies = true
            buffer_size = 1024
            "#,
        )
        .unwrap();
        assert_eq!(config.worker_threads, 3);
        assert!(config.strict_optional_bodies);
        assert_eq!(config.effective_buffer_size(), 8192);
        assert_eq!(config.max_request_size, 10 * 1024 * 1024);
    }

    #[test]
    fn unknown_field() {
        assert!(matches!(
            ServerConfig::from_toml_str("port = 80"),
            Err(ProteusError::Config(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"address = \"0.0.0.0:9000\"\n").unwrap();
        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.address, "0.0.0.0:9000");
    }
}
