//! Configuration loading for the marketplace client.
//!
//! Settings come from, in increasing precedence:
//! - Built-in defaults
//! - A TOML file (`--config FILE`, or `config.toml` in the XDG config dir)
//! - Environment overrides (`DOJO_API_BASE_URL`, `DOJO_INSTALL_ROOT`)
//!
//! The API key is never read from the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::marketplace::{InstallPaths, MarketplaceError};

/// Environment variable overriding [`MarketplaceConfig::api_base_url`].
pub const ENV_API_BASE_URL: &str = "DOJO_API_BASE_URL";

/// Environment variable overriding [`MarketplaceConfig::install_root`].
pub const ENV_INSTALL_ROOT: &str = "DOJO_INSTALL_ROOT";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Marketplace client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketplaceConfig {
    /// Base URL of the marketplace API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Directory holding `skills/`, `plugins/` and `tools/`.
    /// Defaults to `~/.claude`.
    #[serde(default)]
    pub install_root: Option<PathBuf>,

    /// Timeout for each catalog request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for an archive download, in seconds.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://api.dojocoding.io".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_download_timeout_secs() -> u64 {
    300
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            install_root: None,
            request_timeout_secs: default_request_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

impl MarketplaceConfig {
    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: MarketplaceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Default config file location (`<XDG config dir>/config.toml`).
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("io", "dojocoding", "dojo-marketplace")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Resolve the effective configuration.
    ///
    /// An explicit path must exist. Without one, the default path is used if
    /// present, otherwise built-in defaults. Environment overrides are
    /// applied last.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::load(path)?,
                None => Self::default(),
            },
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(root) = lookup(ENV_INSTALL_ROOT).filter(|v| !v.trim().is_empty()) {
            self.install_root = Some(PathBuf::from(root.trim()));
        }
    }

    /// Validate the configuration (pure function).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::ValidationError(format!(
                "api_base_url must be an http(s) URL, got '{}'",
                self.api_base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.download_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "download_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(root) = &self.install_root
            && !root.is_absolute()
        {
            return Err(ConfigError::ValidationError(format!(
                "install_root must be an absolute path, got {}",
                root.display()
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Install directory layout for this configuration.
    pub fn install_paths(&self) -> Result<InstallPaths, MarketplaceError> {
        match &self.install_root {
            Some(root) => Ok(InstallPaths::new(root.clone())),
            None => InstallPaths::from_home(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_empty_uses_defaults() {
        match MarketplaceConfig::parse("") {
            Ok(config) => assert_eq!(config, MarketplaceConfig::default()),
            Err(e) => panic!("Should parse empty config: {e}"),
        }
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
api_base_url = "https://marketplace.example.com"
install_root = "/opt/claude"
request_timeout_secs = 10
download_timeout_secs = 60
        "#;

        match MarketplaceConfig::parse(toml) {
            Ok(config) => {
                assert_eq!(config.api_base_url, "https://marketplace.example.com");
                assert_eq!(config.install_root, Some(PathBuf::from("/opt/claude")));
                assert_eq!(config.request_timeout(), Duration::from_secs(10));
                assert_eq!(config.download_timeout(), Duration::from_secs(60));
            }
            Err(e) => panic!("Should parse config: {e}"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            "api_base_url = \"ftp://example.com\"",
            "request_timeout_secs = 0",
            "download_timeout_secs = 0",
            "install_root = \"relative/dir\"",
        ];
        for toml in bad {
            assert!(
                matches!(
                    MarketplaceConfig::parse(toml),
                    Err(ConfigError::ValidationError(_))
                ),
                "{toml} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_invalid_toml() {
        assert!(matches!(
            MarketplaceConfig::parse("api_base_url = [[["),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_BASE_URL, "http://localhost:8080"),
            (ENV_INSTALL_ROOT, "/tmp/claude-test"),
        ]);
        let mut config = MarketplaceConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.install_root, Some(PathBuf::from("/tmp/claude-test")));
    }

    #[test]
    fn test_env_overrides_ignore_blank_values() {
        let mut config = MarketplaceConfig::default();
        config.apply_env_overrides(|_| Some("   ".to_string()));
        assert_eq!(config, MarketplaceConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let temp = match tempfile::TempDir::new() {
            Ok(dir) => dir,
            Err(e) => panic!("Failed to create temp dir: {e}"),
        };
        let path = temp.path().join("config.toml");
        if let Err(e) = std::fs::write(&path, "request_timeout_secs = 5\n") {
            panic!("Failed to write config: {e}");
        }

        match MarketplaceConfig::load(&path) {
            Ok(config) => assert_eq!(config.request_timeout_secs, 5),
            Err(e) => panic!("Should load config: {e}"),
        }
    }

    #[test]
    fn test_resolve_requires_explicit_file_to_exist() {
        let result = MarketplaceConfig::resolve(Some(Path::new("/nonexistent/dojo.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_install_paths_from_configured_root() {
        let config = MarketplaceConfig {
            install_root: Some(PathBuf::from("/opt/claude")),
            ..MarketplaceConfig::default()
        };
        match config.install_paths() {
            Ok(paths) => assert_eq!(paths.root(), Path::new("/opt/claude")),
            Err(e) => panic!("Should build install paths: {e}"),
        }
    }
}
