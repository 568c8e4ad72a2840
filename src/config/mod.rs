//! Application Configuration
//!
//! User settings stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::tabs::links::DEFAULT_SEARCH_URL;
use crate::tabs::lookup::DEFAULT_CATALOG_URL;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Tab lookup endpoints
    pub lookup: LookupConfig,
}

/// General application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Id of the profile selected on last run. Session state, not a
    /// database column; a stale id simply means no active profile.
    pub active_profile: Option<String>,
}

/// Endpoints for tab search and catalog lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Tab catalog JSON endpoint
    pub catalog_url: String,
    /// Tab search endpoint the derived links point at
    pub search_url: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();
        assert!(config.general.active_profile.is_none());
        assert_eq!(config.lookup.catalog_url, DEFAULT_CATALOG_URL);
        assert_eq!(config.lookup.search_url, DEFAULT_SEARCH_URL);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config.general.active_profile = Some("abc-123".to_string());

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.general.active_profile, Some("abc-123".to_string()));
        assert_eq!(parsed.lookup.catalog_url, config.lookup.catalog_url);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig = toml::from_str("[general]\n").unwrap();
        assert_eq!(parsed.lookup.search_url, DEFAULT_SEARCH_URL);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.general.active_profile = Some("profile-1".to_string());

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded.general.active_profile, Some("profile-1".to_string()));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
