use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::panels::PanelWidths;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5050";
pub const DEFAULT_LANGUAGE: &str = "pl";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub panel_widths: Option<PanelWidths>,
    #[serde(default)]
    pub log_level: Option<String>,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            server_url: None,
            language: default_language(),
            panel_widths: None,
            log_level: None,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Missing file means defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Server URL: flag, then `DOCKFRA_URL`, then this config, then the default
    pub fn server_url<'a>(&'a self, flag: Option<&'a str>, env: Option<&'a str>) -> String {
        let given = |url: Option<&'a str>| url.filter(|url| !url.trim().is_empty());
        given(flag)
            .or_else(|| given(env))
            .or_else(|| given(self.server_url.as_deref()))
            .unwrap_or(DEFAULT_SERVER_URL)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("dockfra").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.language, "pl");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            language: "en".to_string(),
            panel_widths: Some(PanelWidths {
                chat: 40,
                processes: 30,
                logs: 90,
            }),
            ..Config::new()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"server_url":"http://wizard:5050/"}"#).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.language, "pl");
        assert_eq!(config.server_url(None, None), "http://wizard:5050");
    }

    #[test]
    fn test_url_precedence() {
        let config = Config {
            server_url: Some("http://config:1".to_string()),
            ..Config::new()
        };
        assert_eq!(
            config.server_url(Some("http://flag:1"), Some("http://env:1")),
            "http://flag:1"
        );
        assert_eq!(config.server_url(None, Some("http://env:1")), "http://env:1");
        assert_eq!(config.server_url(None, None), "http://config:1");
        assert_eq!(Config::new().server_url(None, None), DEFAULT_SERVER_URL);
        assert_eq!(config.server_url(Some(""), Some("http://env:1")), "http://env:1");
        assert_eq!(config.server_url(Some(" "), Some("")), "http://config:1");
    }
}
