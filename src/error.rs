//! Error types for cfgwatch.

/// Result type alias for cfgwatch operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading, decoding, or watching configuration.
///
/// Synchronous operations (`load_file`, `decode`, the initial fetch inside
/// `watch`) return these directly. Failures inside the background polling
/// loop are logged and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A local file could not be opened or read.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// File or remote content is not valid JSON/YAML, or its root is not a mapping.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// The stored tree does not fit the requested destination type.
    #[error("Failed to decode configuration: {0}")]
    DecodeError(String),

    /// The remote provider could not be reached or refused the read.
    #[error("Remote provider error: {0}")]
    ConnectionError(String),

    /// `watch` was called on an instance that already has a running watcher.
    #[error("A remote watcher is already running on this configuration")]
    AlreadyWatching,

    /// Attempted to use a feature that is not enabled.
    #[error("Feature not enabled: {0}")]
    FeatureNotEnabled(&'static str),

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    /// Whether this error came from talking to a remote provider.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionError(_))
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
