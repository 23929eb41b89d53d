//! Remote change polling and update signals.
//!
//! A [`RemoteWatcher`] re-fetches a remote key on a fixed interval, swaps the
//! result into the shared store, and pings an [`UpdateSignal`] channel so the
//! consumer knows to decode again.

pub mod watcher;

pub use watcher::{PollPolicy, RemoteWatcher, SIGNAL_CAPACITY, UpdateSignal};
