//! # cfgwatch
//!
//! Load JSON/YAML configuration from a file or from etcd/Consul, decode it
//! into your own types, and keep remote configuration fresh in the background.
//!
//! ## Overview
//!
//! - Files: format picked from the extension (`.json`, `.yaml`, `.yml`, JSON otherwise)
//! - Remote: one synchronous fetch, then a cancellable poller on a fixed interval
//! - Decoding: serde-based, field names matched ignoring ASCII case
//! - Atomic snapshots: readers see either the old or the new document, never a mix
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cfgwatch::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct AppConfig {
//!     address: String,
//!     port: u16,
//! }
//!
//! # async fn example() -> cfgwatch::error::Result<()> {
//! let config = Configuration::new();
//!
//! let options = RemoteOptions::new(ProviderKind::Etcd, "127.0.0.1:2379", "/app/config")
//!     .with_config_type(ConfigType::Yaml);
//! let mut updates = config.watch(&options).await?;
//!
//! let mut app: AppConfig = config.decode()?;
//! while let Some(()) = updates.recv().await {
//!     // A failed decode keeps the previous value in `app`
//!     if let Err(e) = config.decode_into(&mut app) {
//!         eprintln!("Ignoring bad remote config: {}", e);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `remote` (default): stock HTTP providers for etcd and Consul

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod global;
pub mod notify;
pub mod sources;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{ConfigType, Configuration};
    pub use crate::error::{ConfigError, Result};
    pub use crate::notify::{PollPolicy, UpdateSignal};
    pub use crate::sources::{ProviderKind, RemoteOptions, RemoteProvider};
}
