//! Remote key/value configuration sources (etcd, Consul).

use crate::core::ConfigType;
use crate::error::{ConfigError, Result};
use crate::notify::PollPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A remote store that can hand back the raw bytes stored under a path.
///
/// Implement this to plug in another store or a test double; the watcher
/// only ever calls [`fetch`](RemoteProvider::fetch).
#[async_trait]
pub trait RemoteProvider: Send + Sync {
    /// Fetch the full value stored at `path`.
    ///
    /// # Errors
    ///
    /// Should return `ConfigError::ConnectionError` when the store cannot be
    /// reached or the key does not exist.
    async fn fetch(&self, path: &str) -> Result<Vec<u8>>;

    /// Get a human-readable name for this provider (for logging/debugging).
    fn name(&self) -> String;
}

/// Kinds of remote store with a stock provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// etcd, through its v3 JSON gateway.
    Etcd,
    /// Consul KV.
    Consul,
}

impl ProviderKind {
    /// The lowercase tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Etcd => "etcd",
            ProviderKind::Consul => "consul",
        }
    }

    /// Build the stock HTTP provider for this kind.
    ///
    /// Endpoints without a scheme are treated as `http://`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::FeatureNotEnabled` without the `remote` feature,
    /// or `ConfigError::ConnectionError` if the HTTP client cannot be built.
    pub fn connect(&self, endpoint: &str) -> Result<Arc<dyn RemoteProvider>> {
        #[cfg(feature = "remote")]
        {
            let client = http::client()?;
            let base = http::base_url(endpoint);
            let provider: Arc<dyn RemoteProvider> = match self {
                ProviderKind::Etcd => Arc::new(EtcdProvider { base, client }),
                ProviderKind::Consul => Arc::new(ConsulProvider { base, client }),
            };
            Ok(provider)
        }

        #[cfg(not(feature = "remote"))]
        {
            let _ = endpoint;
            Err(ConfigError::FeatureNotEnabled("remote"))
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "etcd" => Ok(ProviderKind::Etcd),
            "consul" => Ok(ProviderKind::Consul),
            other => Err(ConfigError::Other(format!(
                "Unsupported remote provider: {}. Supported: etcd, consul",
                other
            ))),
        }
    }
}

/// Where to watch and how to read what is found there.
///
/// # Examples
///
/// ```rust
/// use cfgwatch::sources::{ProviderKind, RemoteOptions};
/// use cfgwatch::core::ConfigType;
///
/// let options = RemoteOptions::new(ProviderKind::Consul, "127.0.0.1:8500", "my_config_path")
///     .with_config_type(ConfigType::Json);
/// assert_eq!(options.poll.interval.as_secs(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteOptions {
    /// Which kind of store to talk to.
    pub provider: ProviderKind,
    /// Store address, e.g. `127.0.0.1:8500`.
    pub endpoint: String,
    /// Key holding the configuration document.
    pub path: String,
    /// Format of the stored document.
    #[serde(default)]
    pub config_type: ConfigType,
    /// Polling interval and failure policy.
    #[serde(default)]
    pub poll: PollPolicy,
}

impl RemoteOptions {
    /// Options with JSON content and the default poll policy.
    pub fn new(provider: ProviderKind, endpoint: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            provider,
            endpoint: endpoint.into(),
            path: path.into(),
            config_type: ConfigType::default(),
            poll: PollPolicy::default(),
        }
    }

    /// Set the content format of the stored document.
    pub fn with_config_type(mut self, config_type: ConfigType) -> Self {
        self.config_type = config_type;
        self
    }

    /// Set the polling policy.
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }
}

#[cfg(feature = "remote")]
mod http {
    use crate::error::{ConfigError, Result};
    use reqwest::{Client, Response};
    use std::time::Duration;

    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    pub(super) fn client() -> Result<Client> {
        Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::ConnectionError(format!("Failed to create HTTP client: {}", e)))
    }

    pub(super) fn base_url(endpoint: &str) -> String {
        let endpoint = endpoint.trim_end_matches('/');
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("http://{}", endpoint)
        }
    }

    pub(super) fn check_status(response: Response, path: &str) -> Result<Response> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ConfigError::ConnectionError(format!(
                "Key not found: {}",
                path
            )));
        }
        if !status.is_success() {
            return Err(ConfigError::ConnectionError(format!(
                "Request failed with status {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }
        Ok(response)
    }

    pub(super) fn request_failed(e: reqwest::Error) -> ConfigError {
        ConfigError::ConnectionError(format!("HTTP request failed: {}", e))
    }
}

/// Consul KV provider: `GET {endpoint}/v1/kv/{path}?raw`.
#[cfg(feature = "remote")]
pub struct ConsulProvider {
    base: String,
    client: reqwest::Client,
}

#[cfg(feature = "remote")]
impl ConsulProvider {
    /// Create a provider for the agent at `endpoint`.
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            base: http::base_url(endpoint),
            client: http::client()?,
        })
    }

    /// `{base}/v1/kv/{path}?raw`, with each key segment percent-encoded.
    fn url(&self, path: &str) -> Result<reqwest::Url> {
        let invalid = || ConfigError::ConnectionError(format!("Invalid Consul endpoint: {}", self.base));

        let mut url = reqwest::Url::parse(&self.base).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["v1", "kv"])
            .extend(path.trim_start_matches('/').split('/'));
        url.set_query(Some("raw"));
        Ok(url)
    }
}

#[cfg(feature = "remote")]
#[async_trait]
impl RemoteProvider for ConsulProvider {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.url(path)?)
            .send()
            .await
            .map_err(http::request_failed)?;
        let response = http::check_status(response, path)?;

        let body = response.bytes().await.map_err(http::request_failed)?;
        Ok(body.to_vec())
    }

    fn name(&self) -> String {
        format!("consul:{}", self.base)
    }
}

/// etcd provider using the v3 JSON gateway: `POST {endpoint}/v3/kv/range`.
///
/// Keys and values travel base64-encoded.
#[cfg(feature = "remote")]
pub struct EtcdProvider {
    base: String,
    client: reqwest::Client,
}

#[cfg(feature = "remote")]
#[derive(Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<KeyValue>,
}

#[cfg(feature = "remote")]
#[derive(Deserialize)]
struct KeyValue {
    #[serde(default)]
    value: String,
}

#[cfg(feature = "remote")]
impl EtcdProvider {
    /// Create a provider for the etcd member at `endpoint`.
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            base: http::base_url(endpoint),
            client: http::client()?,
        })
    }

    fn decode_range(body: RangeResponse, path: &str) -> Result<Vec<u8>> {
        use base64::Engine;
        use base64::engine::general_purpose::STANDARD;

        let kv = body
            .kvs
            .into_iter()
            .next()
            .ok_or_else(|| ConfigError::ConnectionError(format!("Key not found: {}", path)))?;
        STANDARD
            .decode(kv.value)
            .map_err(|e| ConfigError::ParseError(format!("Invalid base64 value from etcd: {}", e)))
    }
}

#[cfg(feature = "remote")]
#[async_trait]
impl RemoteProvider for EtcdProvider {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        use base64::Engine;
        use base64::engine::general_purpose::STANDARD;

        let request = serde_json::json!({ "key": STANDARD.encode(path) });
        let response = self
            .client
            .post(format!("{}/v3/kv/range", self.base))
            .json(&request)
            .send()
            .await
            .map_err(http::request_failed)?;
        let response = http::check_status(response, path)?;

        let body: RangeResponse = response.json().await.map_err(|e| {
            ConfigError::ConnectionError(format!("Unexpected etcd response: {}", e))
        })?;
        Self::decode_range(body, path)
    }

    fn name(&self) -> String {
        format!("etcd:{}", self.base)
    }
}
