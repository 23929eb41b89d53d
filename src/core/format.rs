//! Configuration content formats and extension-based detection.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Format of a configuration document.
///
/// Files pick their format from the extension; remote values carry an
/// explicit tag since a key/value path has no extension to go by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    /// JSON, also the fallback for unknown extensions.
    #[default]
    Json,
    /// YAML (`.yaml` or `.yml`).
    Yaml,
}

impl ConfigType {
    /// Detect the format from a file path's extension.
    ///
    /// - `.json` -> JSON
    /// - `.yaml`, `.yml` -> YAML
    /// - anything else, or no extension -> JSON
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cfgwatch::core::ConfigType;
    ///
    /// assert_eq!(ConfigType::from_path("app.yml"), ConfigType::Yaml);
    /// assert_eq!(ConfigType::from_path("app.conf"), ConfigType::Json);
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => ConfigType::Yaml,
            _ => ConfigType::Json,
        }
    }

    /// The lowercase tag for this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigType::Json => "json",
            ConfigType::Yaml => "yaml",
        }
    }

    /// Parse raw bytes in this format into a value tree.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` if the content is malformed or the
    /// document root is not a mapping.
    pub fn parse(&self, bytes: &[u8]) -> Result<Value> {
        let value: Value = match self {
            ConfigType::Json => serde_json::from_slice(bytes)?,
            ConfigType::Yaml => {
                let mut yaml: serde_yaml::Value = serde_yaml::from_slice(bytes)?;
                // Resolve `<<: *anchor` merge keys before leaving YAML
                yaml.apply_merge()?;
                serde_json::to_value(yaml)?
            }
        };

        match value {
            Value::Object(_) => Ok(value),
            // An empty YAML document parses to null
            Value::Null => Ok(Value::Object(Default::default())),
            other => Err(ConfigError::ParseError(format!(
                "Expected a mapping at the document root, found {}",
                kind_name(&other)
            ))),
        }
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}

impl fmt::Display for ConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ConfigType::Json),
            "yaml" | "yml" => Ok(ConfigType::Yaml),
            other => Err(ConfigError::Other(format!(
                "Unsupported config type: {}. Supported: json, yaml",
                other
            ))),
        }
    }
}
