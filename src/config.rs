use std::path::PathBuf;
use std::time::Duration;

use bookkeep_core::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};

/// Client and development server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// API base URL (default: "http://localhost:8080/api")
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Initial page size of list views (default: 10)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Delay before a search-as-you-type query is sent (default: 300)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Development server bind address (default: "0.0.0.0")
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Development server port (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_debounce_ms() -> u64 {
    crate::debounce::DEFAULT_DELAY.as_millis() as u64
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
            debounce_ms: default_debounce_ms(),
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub bind: Option<String>,
    pub port: Option<u16>,
}

impl Config {
    /// Load configuration from file, environment, and CLI arguments
    pub fn load(config_path: Option<&PathBuf>, cli: &Overrides) -> anyhow::Result<Self> {
        // Start with default config
        let mut config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            // Try default config file
            if let Ok(content) = std::fs::read_to_string("bookkeep.toml") {
                toml::from_str(&content)?
            } else {
                Config::default()
            }
        };

        // Override with environment variables
        config.apply_env(|key| std::env::var(key).ok());

        // Override with CLI arguments
        if let Some(base_url) = &cli.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(bind) = &cli.bind {
            config.bind = bind.clone();
        }
        if let Some(port) = cli.port {
            config.port = port;
        }

        if !bookkeep_core::is_allowed_page_size(config.page_size) {
            anyhow::bail!(
                "page_size {} is not one of {:?}",
                config.page_size,
                bookkeep_core::PAGE_SIZES
            );
        }

        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = var("BOOKKEEP_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(Ok(secs)) = var("BOOKKEEP_TIMEOUT_SECS").map(|v| v.parse()) {
            self.timeout_secs = secs;
        }
        if let Some(Ok(size)) = var("BOOKKEEP_PAGE_SIZE").map(|v| v.parse()) {
            self.page_size = size;
        }
        if let Some(Ok(ms)) = var("BOOKKEEP_DEBOUNCE_MS").map(|v| v.parse()) {
            self.debounce_ms = ms;
        }
        if let Some(bind) = var("BOOKKEEP_BIND") {
            self.bind = bind;
        }
        if let Some(Ok(port)) = var("BOOKKEEP_PORT").map(|v| v.parse()) {
            self.port = port;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_uses_defaults() {
        let config: Config = toml::from_str("port = 9090\npage_size = 20\n").unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.page_size, 20);
        assert_eq!(config.base_url, "http://localhost:8080/api");
        assert_eq!(config.debounce(), Duration::from_millis(300));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("BOOKKEEP_BASE_URL", "http://books.internal/api"),
            ("BOOKKEEP_PORT", "not-a-port"),
            ("BOOKKEEP_DEBOUNCE_MS", "150"),
        ]);
        let mut config = Config::default();

        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.base_url, "http://books.internal/api");
        assert_eq!(config.port, 8080);
        assert_eq!(config.debounce_ms, 150);
    }

    #[test]
    fn cli_wins_and_page_size_is_checked() {
        let dir = std::env::temp_dir().join(format!("bookkeep-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bookkeep.toml");

        std::fs::write(&path, "port = 9000\n").unwrap();
        let cli = Overrides {
            port: Some(9100),
            ..Default::default()
        };
        let config = Config::load(Some(&path), &cli).unwrap();
        assert_eq!(config.port, 9100);

        std::fs::write(&path, "page_size = 15\n").unwrap();
        assert!(Config::load(Some(&path), &Overrides::default()).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
