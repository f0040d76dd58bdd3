use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid provider: {0}. Must be one of: openai, anthropic")]
    InvalidProvider(String),

    #[error("Invalid timeout_secs: 0. Must be at least 1")]
    InvalidTimeout,

    #[error("Invalid temperature: {0}. Must be between 0.0 and 2.0")]
    InvalidTemperature(f32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must not exceed max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Crew directory cannot be empty")]
    EmptyCrewDir,

    #[error("Invalid port: 0")]
    InvalidPort,
}

const VALID_PROVIDERS: [&str; 2] = ["openai", "anthropic"];

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .hypnobot/config.yaml (project config)
    /// 3. .hypnobot/local.yaml (local overrides, optional)
    /// 4. Environment variables (HYPNOBOT_* prefix, `__` separates nested keys)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".hypnobot/config.yaml"))
            .merge(Yaml::file(".hypnobot/local.yaml"))
            .merge(Env::prefixed("HYPNOBOT_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if !VALID_PROVIDERS.contains(&config.backend.provider.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidProvider(config.backend.provider.clone()));
        }

        if config.backend.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        if !(0.0..=2.0).contains(&config.backend.default_temperature) {
            return Err(ConfigError::InvalidTemperature(
                config.backend.default_temperature,
            ));
        }

        if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        if config.pipeline.crew_dir.trim().is_empty() {
            return Err(ConfigError::EmptyCrewDir);
        }

        if config.server.port == 0 {
            return Err(ConfigError::InvalidPort);
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
        assert_eq!(config.backend.provider, "openai");
        assert_eq!(config.backend.default_model, "gpt-4");
        assert!((config.backend.default_temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.pipeline.gate_task.as_deref(), Some("categorization_task"));
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
logging:
  level: debug
  format: json
backend:
  provider: anthropic
  default_model: claude-3-5-sonnet-20241022
  timeout_secs: 30
pipeline:
  crew_dir: /etc/hypnobot/crew
  review_task: safety_check_task
retry:
  max_retries: 2
server:
  port: 9090
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.backend.provider, "anthropic");
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.backend.anthropic_version, "2023-06-01");
        assert_eq!(config.pipeline.crew_dir, "/etc/hypnobot/crew");
        assert_eq!(config.pipeline.review_task.as_deref(), Some("safety_check_task"));
        assert_eq!(config.pipeline.gate_task.as_deref(), Some("categorization_task"));
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.initial_backoff_ms, 1000);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogFormat(format) => assert_eq!(format, "xml"),
            other => panic!("Expected InvalidLogFormat error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = Config::default();
        config.backend.provider = "llamafile".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidProvider(_))
        ));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.backend.timeout_secs = 0;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTimeout)
        ));
    }

    #[test]
    fn test_validate_temperature_range() {
        let mut config = Config::default();
        config.backend.default_temperature = 3.5;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidTemperature(_))
        ));
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 30000;
        config.retry.max_backoff_ms = 10000;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(30000, 10000))
        ));
    }

    #[test]
    fn test_validate_empty_crew_dir() {
        let mut config = Config::default();
        config.pipeline.crew_dir = "  ".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyCrewDir)
        ));
    }

    #[test]
    fn test_validate_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPort)
        ));
    }

    #[test]
    fn test_env_override() {
        temp_env::with_vars(
            [
                ("HYPNOBOT_SERVER__PORT", Some("9001")),
                ("HYPNOBOT_LOGGING__LEVEL", Some("debug")),
                ("HYPNOBOT_BACKEND__DEFAULT_MODEL", Some("gpt-4o")),
            ],
            || {
                let config = ConfigLoader::load().expect("Config should load");
                assert_eq!(config.server.port, 9001);
                assert_eq!(config.logging.level, "debug");
                assert_eq!(config.backend.default_model, "gpt-4o");
            },
        );
    }

    #[test]
    fn test_env_override_is_validated() {
        temp_env::with_var("HYPNOBOT_LOGGING__FORMAT", Some("xml"), || {
            assert!(ConfigLoader::load().is_err());
        });
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "backend:\n  provider: anthropic\n  timeout_secs: 5").unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.backend.provider, "anthropic");
        assert_eq!(config.backend.timeout_secs, 5);
        assert_eq!(config.backend.default_max_tokens, 1024);
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "server:\n  port: 8100\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "server:\n  port: 8200\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.server.port, 8200, "Override should win");
        assert_eq!(
            config.logging.level, "debug",
            "Override should win for nested fields"
        );
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
    }
}
