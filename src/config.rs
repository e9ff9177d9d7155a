//! Uploader configuration.
//!
//! Loaded from a JSON file; every key is optional:
//!
//! ```json
//! {
//!   "endpoint": "https://crashes.example.com/breakpad",
//!   "dump_dir": "/var/lib/mygame/dumps",
//!   "product_name": "com.example.mygame",
//!   "version": "42",
//!   "device": "Acme,X1",
//!   "optional": { "level": "forest-3" },
//!   "extra_files": { "log": "/var/lib/mygame/last.log" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No upload endpoint configured")]
    MissingEndpoint,

    #[error("Invalid upload endpoint {0:?}: expected an http or https URL")]
    InvalidEndpoint(String),
}

/// Configuration for the crash handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    /// URL the report is POSTed to
    pub endpoint: String,
    /// Directory Breakpad writes minidumps into
    pub dump_dir: PathBuf,
    /// Application name, sent as `product_name`
    pub product_name: String,
    /// Application version, sent as `version`
    pub version: Option<String>,
    /// Device description, sent as `device` after sanitizing
    pub device: String,
    /// Extra JSON parameters, sent as the `optional` field
    pub optional: Option<Map<String, Value>>,
    /// Additional files to attach, keyed by form field name
    pub extra_files: BTreeMap<String, PathBuf>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            dump_dir: PathBuf::from("."),
            product_name: "Unknown".into(),
            version: None,
            device: default_device(),
            optional: None,
            extra_files: BTreeMap::new(),
        }
    }
}

impl UploaderConfig {
    /// Reads a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Checks that the endpoint is an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        match Url::parse(&self.endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            _ => Err(ConfigError::InvalidEndpoint(self.endpoint.clone())),
        }
    }

    /// Resolves a dump name against [`dump_dir`](Self::dump_dir).
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve_dump(&self, dump: &str) -> PathBuf {
        let path = Path::new(dump);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dump_dir.join(path)
        }
    }
}

/// `<os>,<arch>` of the running process, e.g. `linux,x86_64`.
pub fn default_device() -> String {
    format!("{},{}", std::env::consts::OS, std::env::consts::ARCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_fill_missing_keys() {
        let config: UploaderConfig =
            serde_json::from_str(r#"{"endpoint":"http://localhost/breakpad"}"#).unwrap();

        assert_eq!(config.endpoint, "http://localhost/breakpad");
        assert_eq!(config.product_name, "Unknown");
        assert_eq!(config.dump_dir, PathBuf::from("."));
        assert!(config.version.is_none());
        assert!(config.extra_files.is_empty());
    }

    #[test]
    fn load_reads_json_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("uploader.json");
        std::fs::write(
            &path,
            r#"{
                "endpoint": "https://crashes.example.com/breakpad",
                "product_name": "com.example.game",
                "version": "42",
                "optional": {"level": 3},
                "extra_files": {"log": "/tmp/game.log"}
            }"#,
        )
        .unwrap();

        let config = UploaderConfig::load(&path).unwrap();
        assert_eq!(config.version.as_deref(), Some("42"));
        assert_eq!(config.optional.unwrap()["level"], 3);
        assert_eq!(config.extra_files["log"], PathBuf::from("/tmp/game.log"));
    }

    #[test]
    fn load_rejects_non_object_optional() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("uploader.json");
        std::fs::write(&path, r#"{"optional": [1, 2]}"#).unwrap();

        assert!(matches!(
            UploaderConfig::load(&path),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn validate_requires_http_endpoint() {
        let mut config = UploaderConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingEndpoint)));

        config.endpoint = "ftp://example.com/upload".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidEndpoint(_))));

        config.endpoint = "not a url".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidEndpoint(_))));

        config.endpoint = "http://example.com/breakpad.php".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn resolve_dump_joins_relative_names() {
        let config = UploaderConfig {
            dump_dir: PathBuf::from("/data/files"),
            ..Default::default()
        };

        assert_eq!(
            config.resolve_dump("abc.dmp"),
            PathBuf::from("/data/files/abc.dmp")
        );
        assert_eq!(
            config.resolve_dump("/elsewhere/abc.dmp"),
            PathBuf::from("/elsewhere/abc.dmp")
        );
    }
}
