//! Background polling of a remote provider.

use crate::core::{ConfigType, Snapshot, SourceStore};
use crate::error::{ConfigError, Result};
use crate::sources::RemoteProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Capacity of the update signal channel.
///
/// One pending signal is enough: a signal only means "decode again", and a
/// decode always reads the latest snapshot.
pub const SIGNAL_CAPACITY: usize = 1;

/// Receiving end of the update signals emitted after each successful poll.
///
/// Signals are coalesced: if the previous one has not been received yet, a
/// new one is dropped. The channel closes when the watcher stops.
pub type UpdateSignal = mpsc::Receiver<()>;

/// How often to poll and when to give up.
///
/// # Examples
///
/// ```rust
/// use cfgwatch::notify::PollPolicy;
/// use std::time::Duration;
///
/// let policy = PollPolicy::default()
///     .with_interval(Duration::from_secs(30))
///     .with_max_consecutive_failures(10);
/// assert_eq!(policy.max_consecutive_failures, Some(10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Fixed delay between fetches.
    #[serde(rename = "interval_ms", with = "millis", default = "default_interval")]
    pub interval: Duration,
    /// Stop polling after this many failed fetches in a row.
    ///
    /// `None` retries forever. When the limit is hit the watcher exits and
    /// the update channel closes, which is how a consumer tells a broken
    /// remote apart from a transient blip.
    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,
}

fn default_interval() -> Duration {
    PollPolicy::DEFAULT_INTERVAL
}

impl PollPolicy {
    /// Default delay between fetches.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    /// Set the delay between fetches.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Give up after `max` consecutive failed fetches.
    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = Some(max);
        self
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            max_consecutive_failures: None,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Fetch and parse the remote document into a snapshot.
pub(crate) async fn fetch_snapshot(
    provider: &dyn RemoteProvider,
    path: &str,
    format: ConfigType,
) -> Result<Snapshot> {
    let bytes = provider.fetch(path).await?;
    let tree = format.parse(&bytes)?;
    Ok(Snapshot::new(tree, format))
}

/// A running poller that keeps a [`SourceStore`] in sync with a remote key.
///
/// Created by [`RemoteWatcher::start`], which does one synchronous fetch
/// before spawning anything. Dropping the watcher cancels the background
/// task; [`RemoteWatcher::stop`] also waits for it to finish.
///
/// # Examples
///
/// ```rust,no_run
/// use cfgwatch::core::{ConfigType, SourceStore};
/// use cfgwatch::notify::{PollPolicy, RemoteWatcher};
/// use cfgwatch::sources::ProviderKind;
/// use std::sync::Arc;
///
/// # async fn example() -> cfgwatch::error::Result<()> {
/// let store = Arc::new(SourceStore::new());
/// let provider = ProviderKind::Consul.connect("127.0.0.1:8500")?;
/// let (watcher, mut rx) = RemoteWatcher::start(
///     Arc::clone(&store),
///     provider,
///     "my_config_path",
///     ConfigType::Json,
///     PollPolicy::default(),
/// )
/// .await?;
///
/// while let Some(()) = rx.recv().await {
///     println!("Remote value refreshed: {}", store.load().tree);
/// }
/// watcher.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct RemoteWatcher {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    policy: PollPolicy,
}

impl RemoteWatcher {
    /// Fetch once into `store`, then start polling in the background.
    ///
    /// # Errors
    ///
    /// Returns the initial fetch or parse error unchanged, or
    /// `ConfigError::Other` for a zero poll interval. Nothing is spawned on
    /// error.
    pub async fn start(
        store: Arc<SourceStore>,
        provider: Arc<dyn RemoteProvider>,
        path: impl Into<String>,
        format: ConfigType,
        policy: PollPolicy,
    ) -> Result<(Self, UpdateSignal)> {
        if policy.interval.is_zero() {
            return Err(ConfigError::Other(
                "Poll interval must be greater than zero".to_string(),
            ));
        }

        let path = path.into();
        let snapshot = fetch_snapshot(provider.as_ref(), &path, format).await?;
        store.replace(snapshot);

        info!(
            provider = %provider.name(),
            path = %path,
            format = %format,
            interval_ms = policy.interval.as_millis() as u64,
            "Remote configuration loaded, watching for changes"
        );

        let (tx, rx) = mpsc::channel(SIGNAL_CAPACITY);
        let token = CancellationToken::new();
        let poller = Poller {
            store,
            provider,
            path,
            format,
            policy,
            tx,
        };
        let task = tokio::spawn(poller.run(token.clone()));

        Ok((
            Self {
                token,
                task: Some(task),
                policy,
            },
            rx,
        ))
    }

    /// Whether the background task is still polling.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Get the polling policy for this watcher.
    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Ask the background task to stop without waiting for it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Stop polling and wait for the background task to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Remote watcher task ended abnormally");
            }
        }
    }
}

impl Drop for RemoteWatcher {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

struct Poller {
    store: Arc<SourceStore>,
    provider: Arc<dyn RemoteProvider>,
    path: String,
    format: ConfigType,
    policy: PollPolicy,
    tx: mpsc::Sender<()>,
}

impl Poller {
    async fn run(self, token: CancellationToken) {
        let provider = self.provider.name();
        let mut failures: u32 = 0;
        let mut receiver_gone = false;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = sleep(self.policy.interval) => {}
            }

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = fetch_snapshot(self.provider.as_ref(), &self.path, self.format) => result,
            };

            match result {
                Ok(snapshot) => {
                    failures = 0;
                    self.store.replace(snapshot);
                    debug!(provider = %provider, path = %self.path, "Remote configuration refreshed");

                    match self.tx.try_send(()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(())) => {
                            debug!(path = %self.path, "Update signal already pending, coalescing");
                        }
                        Err(TrySendError::Closed(())) => {
                            // Keep polling: decode still reads the fresh snapshot
                            if !receiver_gone {
                                debug!(path = %self.path, "Update receiver dropped");
                                receiver_gone = true;
                            }
                        }
                    }
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    warn!(
                        provider = %provider,
                        path = %self.path,
                        error = %e,
                        consecutive_failures = failures,
                        "Failed to refresh remote configuration, keeping previous value"
                    );

                    if self
                        .policy
                        .max_consecutive_failures
                        .is_some_and(|max| failures >= max)
                    {
                        error!(
                            provider = %provider,
                            path = %self.path,
                            consecutive_failures = failures,
                            "Giving up on remote configuration"
                        );
                        break;
                    }
                }
            }
        }

        info!(provider = %provider, path = %self.path, "Remote watcher stopped");
    }
}
