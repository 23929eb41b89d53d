//! File-based configuration source.

use crate::core::{ConfigType, Snapshot};
use crate::error::Result;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// File-based configuration source.
///
/// Reads a JSON or YAML file, picking the format from the extension
/// (unknown or missing extensions are read as JSON).
///
/// # Examples
///
/// ```rust,no_run
/// use cfgwatch::sources::FileSource;
///
/// # fn example() -> cfgwatch::error::Result<()> {
/// let snapshot = FileSource::new("config/app.yaml").load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    format: ConfigType,
}

impl FileSource {
    /// Create a new file source with automatic format detection.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = ConfigType::from_path(&path);
        Self { path, format }
    }

    /// Path this source reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format detected for this file.
    pub fn format(&self) -> ConfigType {
        self.format
    }

    /// Read and parse the file into a snapshot.
    ///
    /// # Errors
    ///
    /// - `ConfigError::IoError` if the file cannot be opened or read
    /// - `ConfigError::ParseError` if the content is malformed
    pub fn load(&self) -> Result<Snapshot> {
        let mut contents = Vec::new();
        // The handle is closed when `file` drops, on every return path
        let mut file = File::open(&self.path)?;
        file.read_to_end(&mut contents)?;
        drop(file);

        let tree = self.format.parse(&contents)?;
        Ok(Snapshot::new(tree, self.format))
    }

    /// Human-readable name for logging.
    pub fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
