use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::clients::{inpa, telegram};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub inpa: InpaConfig,

    pub telegram: TelegramConfig,

    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            inpa: InpaConfig::default(),
            telegram: TelegramConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Timeout in seconds applied to every outbound HTTP request.
    pub request_timeout_seconds: u64,

    /// Number of tokio worker threads (default: 2).
    /// Set to 0 to use the number of CPU cores.
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/bandarr.db".to_string(),
            log_level: "info".to_string(),
            request_timeout_seconds: 30,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InpaConfig {
    pub base_url: String,
}

impl Default for InpaConfig {
    fn default() -> Self {
        Self {
            base_url: inpa::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_url: String,

    /// Bot token. Overridable with the BANDARR_TELEGRAM_TOKEN environment
    /// variable so the secret can stay out of the config file.
    pub bot_token: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: telegram::DEFAULT_API_URL.to_string(),
            bot_token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    pub poll_interval_minutes: u32,

    /// Cron expression; when set it takes precedence over the interval.
    pub cron_expression: Option<String>,

    /// Pause between users inside one cycle.
    pub user_delay_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_minutes: 30,
            cron_expression: None,
            user_delay_seconds: 0,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default().with_env_overrides())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var("BANDARR_TELEGRAM_TOKEN") {
            self.telegram.bot_token = token;
        }
        self
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("bandarr").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".bandarr").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduler.enabled
            && self.scheduler.poll_interval_minutes == 0
            && self.scheduler.cron_expression.is_none()
        {
            anyhow::bail!("Poll interval cannot be 0 without a cron expression");
        }

        if self.general.request_timeout_seconds == 0 {
            anyhow::bail!("Request timeout cannot be 0");
        }

        if self.inpa.base_url.is_empty() {
            anyhow::bail!("inPA base URL cannot be empty");
        }

        Ok(())
    }

    /// The daemon cannot notify anyone without a bot token. Commands that
    /// never touch Telegram skip this check.
    pub fn require_telegram_token(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!(
                "Missing Telegram bot token: set telegram.bot_token in config.toml \
                 or the BANDARR_TELEGRAM_TOKEN environment variable"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scheduler.poll_interval_minutes, 30);
        assert_eq!(config.general.request_timeout_seconds, 30);
        assert!(config.inpa.base_url.starts_with("https://portale.inpa.gov.it"));
        assert!(config.telegram.bot_token.is_empty());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[inpa]"));
        assert!(toml_str.contains("[telegram]"));
        assert!(toml_str.contains("[scheduler]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [scheduler]
            poll_interval_minutes = 15
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.scheduler.poll_interval_minutes, 15);

        assert_eq!(config.telegram.api_url, "https://api.telegram.org");
    }

    #[test]
    fn zero_interval_without_cron_is_rejected() {
        let mut config = Config::default();
        config.scheduler.poll_interval_minutes = 0;
        assert!(config.validate().is_err());

        config.scheduler.cron_expression = Some("0 0 */2 * * *".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_token_fails_the_telegram_check_only() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.require_telegram_token().is_err());
    }
}
