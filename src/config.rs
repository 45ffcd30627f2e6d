//! Connection configuration, loaded from `config.toml`.
//!
//! Consumed only to construct the transport; the filtering logic never
//! looks at it.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Config {
    /// The CalDAV collection URL, e.g.
    /// `https://nc.domain.org/remote.php/dav/calendars/user_name/`.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Display name or href of the calendar to use. Unset picks the
    /// first discovered one.
    pub calendar: Option<String>,
    /// Skip TLS certificate verification (self-signed test servers).
    #[serde(default)]
    pub allow_insecure_certs: bool,
}

impl Config {
    /// Path of the config file, creating the directory if needed.
    /// `DAVTODO_CONFIG_DIR` overrides the platform location, which keeps
    /// tests away from a real user config.
    pub fn path() -> Option<PathBuf> {
        if let Ok(dir) = env::var("DAVTODO_CONFIG_DIR") {
            let path = PathBuf::from(dir);
            if !path.exists() {
                let _ = fs::create_dir_all(&path);
            }
            return Some(path.join("config.toml"));
        }

        if let Some(proj) = ProjectDirs::from("de", "tagirijus", "davtodo") {
            let config_dir = proj.config_dir();
            if !config_dir.exists() {
                let _ = fs::create_dir_all(config_dir);
            }
            return Some(config_dir.join("config.toml"));
        }
        None
    }

    pub fn load() -> Result<Self> {
        let path = Self::path().context("no config directory available")?;
        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).context("parsing config.toml")
    }

    /// Write the configuration, creating the file when missing so a
    /// fresh install has something to edit.
    pub fn save(&self) -> Result<()> {
        let path = Self::path().context("no config directory available")?;
        let content = toml::to_string_pretty(self).context("serializing config")?;
        fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: Config = toml::from_str("url = \"https://example.org/dav/\"").unwrap();
        assert_eq!(config.url, "https://example.org/dav/");
        assert!(config.username.is_empty());
        assert!(config.calendar.is_none());
        assert!(!config.allow_insecure_certs);
    }

    #[test]
    fn roundtrips_through_toml() {
        let config = Config {
            url: "https://example.org/dav/".to_string(),
            username: "user_name".to_string(),
            password: "secret".to_string(),
            calendar: Some("calendar_name".to_string()),
            allow_insecure_certs: true,
        };
        let serialized = toml::to_string_pretty(&config).unwrap();
        let reloaded: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(reloaded.username, "user_name");
        assert_eq!(reloaded.calendar.as_deref(), Some("calendar_name"));
        assert!(reloaded.allow_insecure_certs);
    }
}
