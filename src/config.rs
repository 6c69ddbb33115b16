//! Application configuration management.
//!
//! Configuration is read from `~/.config/fetecache/config.json` when
//! present, then overridden by `FETECACHE_*` environment variables (a
//! `.env` file is loaded at startup). Defaults point at the club's hosted
//! backend so a fresh checkout runs without a config file.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::StoreConfig;
use crate::notify::NotifyConfig;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "fetecache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the managed store project
    pub store_url: String,
    /// Publishable key for the store and the notify function
    pub store_anon_key: String,
    /// Notify function URL; derived from `store_url` when unset
    pub notify_url: Option<String>,
    /// Origin of the public registration site, for the offline mirror
    pub site_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: "https://dgudohauvnnlzeynfskt.supabase.co".to_string(),
            store_anon_key: String::new(),
            notify_url: None,
            site_url: "https://nspt-tassin.fr".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Ok(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)?;
                serde_json::from_str(&contents)?
            }
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("FETECACHE_STORE_URL") {
            self.store_url = url;
        }
        if let Ok(key) = std::env::var("FETECACHE_ANON_KEY") {
            self.store_anon_key = key;
        }
        if let Ok(url) = std::env::var("FETECACHE_NOTIFY_URL") {
            self.notify_url = Some(url);
        }
        if let Ok(url) = std::env::var("FETECACHE_SITE_URL") {
            self.site_url = url;
        }
    }

    /// Notify function URL, defaulting to the store's function host
    pub fn notify_url(&self) -> String {
        self.notify_url.clone().unwrap_or_else(|| {
            format!(
                "{}/functions/v1/notify",
                self.store_url.trim_end_matches('/')
            )
        })
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            base_url: self.store_url.clone(),
            anon_key: self.store_anon_key.clone(),
        }
    }

    pub fn notify_config(&self) -> NotifyConfig {
        NotifyConfig {
            endpoint_url: self.notify_url(),
            token: self.store_anon_key.clone(),
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the asset mirror and log files
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir =
            dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_url_derived_from_store() {
        let config = Config {
            store_url: "https://example.supabase.co/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.notify_url(),
            "https://example.supabase.co/functions/v1/notify"
        );
    }

    #[test]
    fn test_explicit_notify_url_wins() {
        let config = Config {
            notify_url: Some("https://notify.example.com".to_string()),
            ..Default::default()
        };
        assert_eq!(config.notify_url(), "https://notify.example.com");
    }

    #[test]
    fn test_partial_config_file_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"store_anon_key":"abc"}"#).expect("config should parse");
        assert_eq!(config.store_anon_key, "abc");
        assert!(!config.store_url.is_empty());
    }
}
