//! Configuration source implementations.

mod file;
mod remote;

pub use file::FileSource;
pub use remote::{ProviderKind, RemoteOptions, RemoteProvider};

#[cfg(feature = "remote")]
pub use remote::{ConsulProvider, EtcdProvider};
