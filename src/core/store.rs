//! The shared snapshot store written by loaders and read by decoders.

use crate::core::ConfigType;
use arc_swap::ArcSwap;
use serde_json::Value;
use std::sync::Arc;

/// One fully-loaded configuration document together with the format it was
/// parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Parsed value tree; always a mapping at the root.
    pub tree: Value,
    /// Format the tree was parsed from.
    pub format: ConfigType,
}

impl Snapshot {
    /// Create a snapshot from an already-parsed tree.
    pub fn new(tree: Value, format: ConfigType) -> Self {
        Self { tree, format }
    }

    /// An empty mapping, the state before anything has been loaded.
    pub fn empty() -> Self {
        Self::new(Value::Object(Default::default()), ConfigType::default())
    }
}

/// Holds the current snapshot and swaps it atomically.
///
/// Tree and format tag live in the same `Arc`, so a reader can never pair a
/// new tree with an old tag. Writers replace the whole snapshot; there are no
/// partial updates.
#[derive(Debug)]
pub struct SourceStore {
    current: ArcSwap<Snapshot>,
}

impl SourceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::empty()),
        }
    }

    /// Get the current snapshot. Lock-free; never blocks writers.
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Replace the current snapshot.
    pub fn replace(&self, snapshot: Snapshot) {
        self.current.store(Arc::new(snapshot));
    }
}

impl Default for SourceStore {
    fn default() -> Self {
        Self::new()
    }
}
