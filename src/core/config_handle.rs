//! The main configuration handle.

use crate::core::binder::Binder;
use crate::core::{ConfigType, Snapshot, SourceStore};
use crate::error::{ConfigError, Result};
use crate::notify::{RemoteWatcher, UpdateSignal};
use crate::sources::{FileSource, RemoteOptions, RemoteProvider};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A configuration instance: one snapshot store plus at most one remote watcher.
///
/// Load a file or start watching a remote key, then decode the current
/// snapshot into your own types as often as you like. Clones share the same
/// store and watcher. When the last clone is dropped, any running watcher is
/// cancelled.
///
/// # Examples
///
/// ```rust,no_run
/// use cfgwatch::prelude::*;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct AppConfig {
///     address: String,
///     port: u16,
/// }
///
/// # async fn example() -> Result<()> {
/// let config = Configuration::new();
/// let app: AppConfig = config.load_file_and_decode("config.json")?;
///
/// let mut rx = config
///     .watch(&RemoteOptions::new(ProviderKind::Consul, "127.0.0.1:8500", "app/config"))
///     .await?;
/// while let Some(()) = rx.recv().await {
///     let app: AppConfig = config.decode()?;
///     println!("Now listening on {}:{}", app.address, app.port);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Configuration {
    inner: Arc<Inner>,
}

struct Inner {
    /// Shared with the polling task, which must not keep `Inner` alive
    store: Arc<SourceStore>,
    watcher: Mutex<Option<RemoteWatcher>>,
}

impl Configuration {
    /// Create an empty configuration instance.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Arc::new(SourceStore::new()),
                watcher: Mutex::new(None),
            }),
        }
    }

    /// Get the current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.store.load()
    }

    /// Format of the current snapshot.
    pub fn config_type(&self) -> ConfigType {
        self.inner.store.load().format
    }

    /// Read a JSON or YAML file into this instance.
    ///
    /// The format comes from the extension (`.json`, `.yaml`, `.yml`;
    /// anything else is read as JSON). On error the previous snapshot is
    /// kept as it was.
    ///
    /// # Errors
    ///
    /// - `ConfigError::IoError` if the file cannot be opened or read
    /// - `ConfigError::ParseError` if the content is malformed
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let source = FileSource::new(path.as_ref());
        let snapshot = source.load()?;
        self.inner.store.replace(snapshot);

        debug!(source = %source.name(), format = %source.format(), "Configuration file loaded");
        Ok(())
    }

    /// Decode the current snapshot into `T`.
    ///
    /// Keys match field names exactly or, failing that, ignoring ASCII case.
    /// Before anything has been loaded the snapshot is an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DecodeError` if the snapshot does not fit `T`.
    pub fn decode<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let snapshot = self.inner.store.load();
        decode_snapshot(&snapshot)
    }

    /// Decode the current snapshot into an existing destination.
    ///
    /// `dest` is only overwritten on success. A caller that ignores the
    /// error keeps whatever `dest` held before, often its default value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DecodeError` if the snapshot does not fit `T`.
    pub fn decode_into<T>(&self, dest: &mut T) -> Result<()>
    where
        T: DeserializeOwned,
    {
        *dest = self.decode()?;
        Ok(())
    }

    /// Load a file, then decode it into `T`.
    ///
    /// # Errors
    ///
    /// Returns the `load_file` error unchanged if loading fails, in which
    /// case no decode is attempted.
    pub fn load_file_and_decode<T>(&self, path: impl AsRef<Path>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.load_file(path)?;
        self.decode()
    }

    /// Load a file, then decode it into an existing destination.
    pub fn load_file_and_decode_into<T>(&self, path: impl AsRef<Path>, dest: &mut T) -> Result<()>
    where
        T: DeserializeOwned,
    {
        self.load_file(path)?;
        self.decode_into(dest)
    }

    /// Fetch configuration from a remote store and keep polling it.
    ///
    /// Connects the stock provider for `options.provider`, performs one
    /// fetch, and only then starts the background poller. The returned
    /// channel gets a signal after each successful poll; call
    /// [`decode`](Self::decode) when it fires.
    ///
    /// # Errors
    ///
    /// - `ConfigError::AlreadyWatching` if this instance is already watching
    /// - `ConfigError::ConnectionError` if the initial fetch fails
    /// - `ConfigError::ParseError` if the remote value is malformed
    ///
    /// On error nothing runs in the background.
    pub async fn watch(&self, options: &RemoteOptions) -> Result<UpdateSignal> {
        let provider = options.provider.connect(&options.endpoint)?;
        self.watch_with_provider(options, provider).await
    }

    /// Like [`watch`](Self::watch), with a caller-supplied provider.
    ///
    /// `options.provider` and `options.endpoint` are informational here; the
    /// given provider is used for every fetch.
    pub async fn watch_with_provider(
        &self,
        options: &RemoteOptions,
        provider: Arc<dyn RemoteProvider>,
    ) -> Result<UpdateSignal> {
        let mut slot = self.inner.watcher.lock().await;
        if slot.as_ref().is_some_and(RemoteWatcher::is_running) {
            return Err(ConfigError::AlreadyWatching);
        }

        let (watcher, rx) = RemoteWatcher::start(
            Arc::clone(&self.inner.store),
            provider,
            options.path.clone(),
            options.config_type,
            options.poll,
        )
        .await?;
        *slot = Some(watcher);
        Ok(rx)
    }

    /// Whether a remote watcher is currently polling.
    pub async fn is_watching(&self) -> bool {
        self.inner
            .watcher
            .lock()
            .await
            .as_ref()
            .is_some_and(RemoteWatcher::is_running)
    }

    /// Stop the remote watcher, if any, and wait for it to exit.
    ///
    /// The last snapshot stays in place and can still be decoded. The update
    /// channel closes.
    pub async fn stop(&self) {
        let watcher = self.inner.watcher.lock().await.take();
        if let Some(watcher) = watcher {
            watcher.stop().await;
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a value directly from a snapshot, with the same matching rules as
/// [`Configuration::decode`].
pub fn decode_snapshot<'de, T>(snapshot: &'de Snapshot) -> Result<T>
where
    T: Deserialize<'de>,
{
    T::deserialize(Binder::new(&snapshot.tree)).map_err(|e| ConfigError::DecodeError(e.to_string()))
}
