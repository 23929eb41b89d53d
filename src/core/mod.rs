//! Core configuration management types.

mod binder;
mod config_handle;
mod format;
mod store;

pub use config_handle::{Configuration, decode_snapshot};
pub use format::ConfigType;
pub use store::{Snapshot, SourceStore};
