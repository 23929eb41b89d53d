//! Process-wide default configuration instance.
//!
//! Convenience for programs that only ever need one configuration. The
//! instance is built on first use and lives until the process exits, so a
//! watcher started here keeps polling until [`stop`] is called.
//!
//! Not suitable for tests that need isolation: every caller shares the same
//! snapshot. Create a [`Configuration`] directly instead.
//!
//! # Examples
//!
//! ```rust,no_run
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct AppConfig {
//!     port: u16,
//! }
//!
//! # fn example() -> cfgwatch::error::Result<()> {
//! let app: AppConfig = cfgwatch::global::load_file_and_decode("config.yaml")?;
//! # Ok(())
//! # }
//! ```

use crate::core::Configuration;
use crate::error::Result;
use crate::notify::UpdateSignal;
use crate::sources::RemoteOptions;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::LazyLock;

static DEFAULT: LazyLock<Configuration> = LazyLock::new(Configuration::new);

/// The shared default instance.
pub fn default_instance() -> &'static Configuration {
    &DEFAULT
}

/// [`Configuration::decode`] on the default instance.
pub fn decode<T: DeserializeOwned>() -> Result<T> {
    DEFAULT.decode()
}

/// [`Configuration::decode_into`] on the default instance.
pub fn decode_into<T: DeserializeOwned>(dest: &mut T) -> Result<()> {
    DEFAULT.decode_into(dest)
}

/// [`Configuration::load_file`] on the default instance.
pub fn load_file(path: impl AsRef<Path>) -> Result<()> {
    DEFAULT.load_file(path)
}

/// [`Configuration::load_file_and_decode`] on the default instance.
pub fn load_file_and_decode<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    DEFAULT.load_file_and_decode(path)
}

/// [`Configuration::load_file_and_decode_into`] on the default instance.
pub fn load_file_and_decode_into<T: DeserializeOwned>(
    path: impl AsRef<Path>,
    dest: &mut T,
) -> Result<()> {
    DEFAULT.load_file_and_decode_into(path, dest)
}

/// [`Configuration::watch`] on the default instance.
pub async fn watch(options: &RemoteOptions) -> Result<UpdateSignal> {
    DEFAULT.watch(options).await
}

/// [`Configuration::stop`] on the default instance.
pub async fn stop() {
    DEFAULT.stop().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        address: String,
        port: u16,
    }

    // The only test touching the shared instance, so no cross-test interference
    #[test]
    fn test_free_functions_share_default_instance() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfg.json");
        fs::write(&path, r#"{"Address":"localhost","Port":80}"#).unwrap();

        load_file(&path).unwrap();
        let cfg: TestConfig = decode().unwrap();
        assert_eq!(cfg.address, "localhost");
        assert_eq!(cfg.port, 80);

        let cfg: TestConfig = default_instance().decode().unwrap();
        assert_eq!(cfg.port, 80);
        assert!(std::ptr::eq(default_instance(), default_instance()));
    }
}
