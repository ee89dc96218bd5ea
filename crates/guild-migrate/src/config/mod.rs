//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::retry::RetryPolicy;

/// Overrides `source.token`.
pub const ENV_DISCORD_TOKEN: &str = "GUILD_MIGRATE_DISCORD_TOKEN";
/// Overrides `stoat.token` when a `stoat` section is present.
pub const ENV_STOAT_TOKEN: &str = "GUILD_MIGRATE_STOAT_TOKEN";
/// Overrides `matrix.token` when a `matrix` section is present.
pub const ENV_MATRIX_TOKEN: &str = "GUILD_MIGRATE_MATRIX_TOKEN";

impl Config {
    /// Load configuration from a YAML file, applying environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Replace tokens with values from `lookup` (normally the environment).
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get(ENV_DISCORD_TOKEN) {
            debug!("source.token taken from {}", ENV_DISCORD_TOKEN);
            self.source.token = token;
        }
        if let (Some(stoat), Some(token)) = (self.stoat.as_mut(), get(ENV_STOAT_TOKEN)) {
            debug!("stoat.token taken from {}", ENV_STOAT_TOKEN);
            stoat.token = token;
        }
        if let (Some(matrix), Some(token)) = (self.matrix.as_mut(), get(ENV_MATRIX_TOKEN)) {
            debug!("matrix.token taken from {}", ENV_MATRIX_TOKEN);
            matrix.token = token;
        }
    }

    /// Source settings, checked for what a live read needs.
    pub fn require_source(&self) -> Result<&SourceConfig> {
        if self.source.token.is_empty() {
            return Err(MigrateError::Config(format!(
                "source.token is required (or set {})",
                ENV_DISCORD_TOKEN
            )));
        }
        if self.source.guild_id.is_empty() {
            return Err(MigrateError::Config("source.guild_id is required".into()));
        }
        Ok(&self.source)
    }

    pub fn require_stoat(&self) -> Result<&StoatConfig> {
        self.stoat.as_ref().ok_or_else(|| {
            MigrateError::Config("a 'stoat' section is required to migrate to Stoat".into())
        })
    }

    pub fn require_matrix(&self) -> Result<&MatrixConfig> {
        self.matrix.as_ref().ok_or_else(|| {
            MigrateError::Config("a 'matrix' section is required to migrate to Matrix".into())
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.migration.retry_policy()
    }
}

impl MigrationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL: &str = r#"
source:
  token: discord-token
  guild_id: "1234"
stoat:
  token: stoat-token
  server_id: 01HSERVER
matrix:
  homeserver: https://matrix.example.org
  token: matrix-token
migration:
  max_attempts: 3
  base_delay_ms: 100
"#;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = Config::from_yaml("source:\n  token: t\n  guild_id: '1'\n").unwrap();
        assert_eq!(config.source.r#type, "discord");
        assert_eq!(config.source.api_url, "https://discord.com/api/v10");
        assert!(config.stoat.is_none());
        assert_eq!(config.migration, MigrationConfig::default());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_yaml(FULL).unwrap();
        assert_eq!(config.require_stoat().unwrap().api_url, "https://stoat.chat/api");
        assert_eq!(
            config.require_matrix().unwrap().homeserver,
            "https://matrix.example.org"
        );
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.source.guild_id, "1234");
    }

    #[test]
    fn test_require_source_needs_token_and_guild() {
        let config = Config::default();
        let err = config.require_source().unwrap_err();
        assert!(err.to_string().contains(ENV_DISCORD_TOKEN));

        let mut config = Config::default();
        config.source.token = "t".into();
        assert!(config.require_source().is_err());
        config.source.guild_id = "1".into();
        assert!(config.require_source().is_ok());
    }

    #[test]
    fn test_env_overrides_only_touch_present_sections() {
        let mut config = Config::from_yaml("stoat:\n  token: file\n  server_id: s\n").unwrap();
        let env: HashMap<&str, &str> = [
            (ENV_DISCORD_TOKEN, "from-env"),
            (ENV_STOAT_TOKEN, "stoat-env"),
            (ENV_MATRIX_TOKEN, "matrix-env"),
        ]
        .into_iter()
        .collect();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.source.token, "from-env");
        assert_eq!(config.stoat.as_ref().unwrap().token, "stoat-env");
        assert!(config.matrix.is_none());
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let mut config = Config::default();
        config.source.token = "file".into();
        config.apply_overrides(|_| Some("  ".to_string()));
        assert_eq!(config.source.token, "file");
    }
}
