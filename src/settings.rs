use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CbocError, Result};

pub const DEFAULT_DIVISIONS: &[&str] = &["33", "51", "56", "60"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_district")]
    pub district: String,
    #[serde(default = "default_divisions")]
    pub divisions: Vec<String>,
    #[serde(default)]
    pub delaware_username: Option<String>,
    #[serde(default)]
    pub dsc_username: Option<String>,
    #[serde(default)]
    pub erp_username: Option<String>,
}

fn default_district() -> String {
    "Christina".to_string()
}

fn default_divisions() -> Vec<String> {
    DEFAULT_DIVISIONS.iter().map(|d| d.to_string()).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            district: default_district(),
            divisions: default_divisions(),
            delaware_username: None,
            dsc_username: None,
            erp_username: None,
        }
    }
}

impl Settings {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_path().join("cboc.db")
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("cboc")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("cboc")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("ignoring unreadable settings file {}: {e}", path.display());
                Settings::default()
            }
        }
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| CbocError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.district, "Christina");
        assert_eq!(s.divisions, vec!["33", "51", "56", "60"]);
        assert!(s.database_path().ends_with("cboc.db"));
        assert!(s.delaware_username.is_none());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/cboc", "delaware_username": "jane@example.org"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.district, "Christina");
        assert_eq!(s.divisions.len(), 4);
        assert_eq!(s.delaware_username.as_deref(), Some("jane@example.org"));
        assert_eq!(s.database_path(), PathBuf::from("/tmp/cboc/cboc.db"));
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/srv/cboc".to_string(),
            district: "Red Clay".to_string(),
            divisions: vec!["33".to_string()],
            ..Settings::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();
        let loaded: Settings =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.district, "Red Clay");
        assert_eq!(loaded.divisions, vec!["33"]);
    }
}
