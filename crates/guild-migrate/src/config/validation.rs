//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
///
/// Source credentials are not required here: a run that replays a saved
/// snapshot never talks to the source. See [`Config::require_source`].
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.r#type != "discord" {
        return Err(MigrateError::Config(format!(
            "source.type must be 'discord', got '{}'",
            config.source.r#type
        )));
    }
    check_url("source.api_url", &config.source.api_url)?;

    // Destination validation
    if let Some(ref stoat) = config.stoat {
        if stoat.token.is_empty() {
            return Err(MigrateError::Config("stoat.token is required".into()));
        }
        if stoat.server_id.is_empty() {
            return Err(MigrateError::Config("stoat.server_id is required".into()));
        }
        check_url("stoat.api_url", &stoat.api_url)?;
    }

    if let Some(ref matrix) = config.matrix {
        if matrix.token.is_empty() {
            return Err(MigrateError::Config("matrix.token is required".into()));
        }
        check_url("matrix.homeserver", &matrix.homeserver)?;
    }

    // Migration config validation
    if config.migration.max_attempts == 0 {
        return Err(MigrateError::Config(
            "migration.max_attempts must be at least 1".into(),
        ));
    }
    if config.migration.base_delay_ms > config.migration.max_delay_ms {
        return Err(MigrateError::Config(
            "migration.base_delay_ms cannot exceed migration.max_delay_ms".into(),
        ));
    }
    if config.migration.request_timeout_secs == 0 {
        return Err(MigrateError::Config(
            "migration.request_timeout_secs must be at least 1".into(),
        ));
    }

    Ok(())
}

fn check_url(field: &str, value: &str) -> Result<()> {
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(())
    } else {
        Err(MigrateError::Config(format!(
            "{} must be an http(s) URL, got '{}'",
            field, value
        )))
    }
}
