use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{ConfigError, FileFormat};
use secrecy::SecretString;
use serde::Deserialize;

use crate::utils;

const CONFIG: &str = include_str!("../.config/config.json5");

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub _data_dir: PathBuf,
    #[serde(default)]
    pub _config_dir: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default, flatten)]
    pub config: AppConfig,
    pub api_url: String,
    pub socket_url: String,
    pub page_limit: u32,
    pub token_refresh_lead_secs: u64,
    pub max_reconnect_attempts: u32,
    pub reconnect_backoff_ms: u64,
    /// Long-lived credential exchanged for access tokens
    #[serde(default)]
    pub refresh_token: Option<SecretString>,
}

impl Config {
    /// Load the configuration from the user's config directory, layered over the
    /// bundled defaults and `DREAMSYNC_*` environment variables.
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_from(&utils::get_config_dir())
    }

    pub fn load_from(config_dir: &Path) -> Result<Self, ConfigError> {
        let data_dir = utils::get_data_dir();
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(CONFIG, FileFormat::Json5))
            .set_default("_data_dir", data_dir.display().to_string())?
            .set_default("_config_dir", config_dir.display().to_string())?;

        let config_files = [
            ("config.json5", FileFormat::Json5),
            ("config.json", FileFormat::Json),
            ("config.yaml", FileFormat::Yaml),
            ("config.toml", FileFormat::Toml),
            ("config.ini", FileFormat::Ini),
        ];
        let mut found_config = false;
        for (file, format) in &config_files {
            builder = builder.add_source(
                config::File::from(config_dir.join(file))
                    .format(*format)
                    .required(false),
            );
            if config_dir.join(file).exists() {
                found_config = true
            }
        }
        if !found_config {
            tracing::info!(
                "No configuration file found in {}, using defaults",
                config_dir.display()
            );
        }

        builder = builder.add_source(config::Environment::with_prefix(
            utils::paths::PROJECT_NAME.as_str(),
        ));

        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a JSON5 document layered over the bundled defaults
    pub fn from_json5(overrides: &str) -> Result<Self, ConfigError> {
        let cfg: Self = config::Config::builder()
            .add_source(config::File::from_str(CONFIG, FileFormat::Json5))
            .add_source(config::File::from_str(overrides, FileFormat::Json5))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.page_limit == 0 {
            return Err(ConfigError::Message(String::from(
                "page_limit must be greater than zero",
            )));
        }
        if self.api_url.is_empty() {
            return Err(ConfigError::NotFound(String::from("api_url")));
        }
        Ok(())
    }

    pub fn token_refresh_lead(&self) -> Duration {
        Duration::from_secs(self.token_refresh_lead_secs)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let cfg = Config::load_from(Path::new("/nonexistent/dreamsync")).expect("defaults load");
        assert_eq!(cfg.page_limit, 10);
        assert_eq!(cfg.token_refresh_lead(), Duration::from_secs(60));
        assert_eq!(cfg.max_reconnect_attempts, 3);
        assert_eq!(cfg.reconnect_backoff(), Duration::from_millis(500));
        assert!(cfg.refresh_token.is_none());
    }

    #[test]
    fn test_overrides() {
        let cfg = Config::from_json5(r#"{ "page_limit": 25, "refresh_token": "abc" }"#)
            .expect("overrides load");
        assert_eq!(cfg.page_limit, 25);
        assert_eq!(cfg.socket_url, "ws://localhost:5000/socket");
        assert!(cfg.refresh_token.is_some());
    }

    #[test]
    fn test_zero_page_limit_rejected() {
        let err = Config::from_json5(r#"{ "page_limit": 0 }"#).expect_err("invalid limit");
        assert!(err.to_string().contains("page_limit"));
    }
}
