//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source server configuration (Discord).
    #[serde(default)]
    pub source: SourceConfig,

    /// Stoat destination. Required only when migrating to Stoat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stoat: Option<StoatConfig>,

    /// Matrix destination. Required only when migrating to Matrix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<MatrixConfig>,

    /// Retry and timeout behaviour.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source server (Discord) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Platform type (always "discord" for now).
    #[serde(default = "default_discord")]
    pub r#type: String,

    /// Bot token.
    #[serde(default)]
    pub token: String,

    /// Id of the guild to read.
    #[serde(default)]
    pub guild_id: String,

    /// REST API base URL (default: "https://discord.com/api/v10").
    #[serde(default = "default_discord_api_url")]
    pub api_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            r#type: default_discord(),
            token: String::new(),
            guild_id: String::new(),
            api_url: default_discord_api_url(),
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("type", &self.r#type)
            .field("token", &redacted(&self.token))
            .field("guild_id", &self.guild_id)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Stoat destination configuration.
///
/// Bots cannot create Stoat servers, so the destination is an existing server
/// the bot has been invited to.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoatConfig {
    /// Bot token (sent as `x-bot-token`).
    pub token: String,

    /// Id of the existing destination server.
    pub server_id: String,

    /// REST API base URL (default: "https://stoat.chat/api").
    #[serde(default = "default_stoat_api_url")]
    pub api_url: String,
}

impl fmt::Debug for StoatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoatConfig")
            .field("token", &redacted(&self.token))
            .field("server_id", &self.server_id)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Matrix destination configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    /// Homeserver base URL, e.g. "https://matrix.example.org".
    pub homeserver: String,

    /// Access token of the account that will own the space.
    pub token: String,
}

impl fmt::Debug for MatrixConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatrixConfig")
            .field("homeserver", &self.homeserver)
            .field("token", &redacted(&self.token))
            .finish()
    }
}

/// Retry and timeout behaviour shared by the reader and every adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Total calls per request, including the first (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first retryable failure (default: 500).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap for the computed backoff delay (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Per-request timeout (default: 10).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "[REDACTED]"
    }
}

fn default_discord() -> String {
    "discord".to_string()
}

fn default_discord_api_url() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_stoat_api_url() -> String {
    "https://stoat.chat/api".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_request_timeout_secs() -> u64 {
    10
}
