//! Client configuration via `strata-remote.toml`
//!
//! Every field has a default matching the server's defaults, so an empty
//! file (or no file at all) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use strata_remote_core::{Error, Result, DEFAULT_FETCH_SIZE, SERVER_CACHED_OBJECTS};

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "strata-remote.toml";

/// Smallest usable cache window. With a window of 1 a statement id is stale
/// as soon as it is allocated, so every channel visit would re-prepare.
pub const MIN_SERVER_CACHED_OBJECTS: u32 = 2;

/// Client configuration.
///
/// # Example
///
/// ```toml
/// # Rows per round trip for non-scrollable queries on a single server
/// fetch_size = 100
///
/// # Object ids the server retains; statements older than this are re-prepared
/// server_cached_objects = 64
///
/// # Initial autocommit mode
/// auto_commit = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Rows per batch for non-scrollable queries on a non-clustered session.
    #[serde(default = "default_fetch_size")]
    pub fetch_size: u32,
    /// Size of the server's object cache window.
    #[serde(default = "default_server_cached_objects")]
    pub server_cached_objects: u32,
    /// Autocommit mode the session starts in.
    #[serde(default = "default_auto_commit")]
    pub auto_commit: bool,
}

fn default_fetch_size() -> u32 {
    DEFAULT_FETCH_SIZE
}

fn default_server_cached_objects() -> u32 {
    SERVER_CACHED_OBJECTS
}

fn default_auto_commit() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            fetch_size: default_fetch_size(),
            server_cached_objects: default_server_cached_objects(),
            auto_commit: default_auto_commit(),
        }
    }
}

impl ClientConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Strata remote client configuration
#
# Rows transferred per round trip for non-scrollable queries.
# Clustered sessions and scrollable cursors always fetch everything at once.
fetch_size = 100

# Number of object ids the server keeps cached. Must not exceed the
# server's own setting, or stale statement ids will be reused.
server_cached_objects = 64

# Autocommit mode for new sessions.
auto_commit = true
"#
    }

    /// Parse config from TOML text and validate it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text cannot be parsed or a value is invalid.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse client config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.fetch_size == 0 {
            return Err(Error::Config("fetch_size must be at least 1".to_string()));
        }
        if self.server_cached_objects < MIN_SERVER_CACHED_OBJECTS {
            return Err(Error::Config(format!(
                "server_cached_objects must be at least {}",
                MIN_SERVER_CACHED_OBJECTS
            )));
        }
        Ok(())
    }

    /// Fetch size as sent on the wire.
    pub fn wire_fetch_size(&self) -> i32 {
        i32::try_from(self.fetch_size).unwrap_or(i32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_toml_parses_to_default() {
        let parsed = ClientConfig::from_toml_str(ClientConfig::default_toml()).unwrap();
        assert_eq!(parsed, ClientConfig::default());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let parsed = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(parsed.fetch_size, DEFAULT_FETCH_SIZE);
        assert_eq!(parsed.server_cached_objects, SERVER_CACHED_OBJECTS);
        assert!(parsed.auto_commit);
    }

    #[test]
    fn test_partial_override() {
        let parsed = ClientConfig::from_toml_str("fetch_size = 7\nauto_commit = false").unwrap();
        assert_eq!(parsed.fetch_size, 7);
        assert!(!parsed.auto_commit);
        assert_eq!(parsed.server_cached_objects, SERVER_CACHED_OBJECTS);
    }

    #[test]
    fn test_zero_fetch_size_rejected() {
        let err = ClientConfig::from_toml_str("fetch_size = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_cache_window_below_two_rejected() {
        for window in [0, 1] {
            let err = ClientConfig::from_toml_str(&format!("server_cached_objects = {window}"))
                .unwrap_err();
            assert!(err.to_string().contains("server_cached_objects must be at least 2"));
        }
        assert!(ClientConfig::from_toml_str("server_cached_objects = 2").is_ok());
    }

    #[test]
    fn test_garbage_rejected() {
        let err = ClientConfig::from_toml_str("fetch_size = \"lots\"").unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "server_cached_objects = 16").unwrap();
        let parsed = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(parsed.server_cached_objects, 16);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::from_file(&dir.path().join(CONFIG_FILE_NAME)).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
