//! Discord guild reader (REST API v10).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::snapshot::{CategorySpec, ChannelKind, ChannelSpec, Rgb, RoleSpec, ServerSnapshot};
use crate::core::traits::SnapshotReader;
use crate::error::{MigrateError, Result};
use crate::http::{RateLimitHint, RestClient, RetryAfterUnit};
use crate::permissions::PermissionBitset;
use crate::retry::RetryPolicy;

pub const PLATFORM: &str = "discord";

const CDN_URL: &str = "https://cdn.discordapp.com";
const RATE_LIMIT: RateLimitHint = RateLimitHint::new("retry_after", RetryAfterUnit::Seconds);

const TYPE_TEXT: u8 = 0;
const TYPE_VOICE: u8 = 2;
const TYPE_CATEGORY: u8 = 4;
const TYPE_ANNOUNCEMENT: u8 = 5;
const TYPE_STAGE: u8 = 13;
const TYPE_FORUM: u8 = 15;

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordGuild {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordRole {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub position: i64,
    /// Decimal string, as the API sends it.
    #[serde(default)]
    pub permissions: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordChannel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

enum Mapped {
    Category,
    Channel(ChannelKind),
    Skipped,
}

fn map_type(kind: u8) -> Mapped {
    match kind {
        TYPE_CATEGORY => Mapped::Category,
        TYPE_TEXT | TYPE_ANNOUNCEMENT | TYPE_FORUM => Mapped::Channel(ChannelKind::Text),
        TYPE_VOICE | TYPE_STAGE => Mapped::Channel(ChannelKind::Voice),
        _ => Mapped::Skipped,
    }
}

fn clamp_position(position: i64) -> u32 {
    position.clamp(0, u32::MAX as i64) as u32
}

/// CDN URL of a guild icon; animated icons (`a_` prefix) are GIFs.
pub fn icon_url(guild_id: &str, hash: &str) -> String {
    let ext = if hash.starts_with("a_") { "gif" } else { "png" };
    format!("{}/icons/{}/{}.{}", CDN_URL, guild_id, hash, ext)
}

/// Assemble a snapshot from raw API objects.
///
/// - the `@everyone` role (id equal to the guild id) is skipped
/// - role precedence follows Discord position, highest first
/// - categories and channels are sorted by position
/// - channel types without a counterpart (threads, DMs...) are skipped
pub fn build_snapshot(
    guild_id: &str,
    guild: DiscordGuild,
    roles: Vec<DiscordRole>,
    channels: Vec<DiscordChannel>,
) -> ServerSnapshot {
    let mut snapshot = ServerSnapshot::new(guild.name);
    snapshot.icon = guild
        .icon
        .as_deref()
        .filter(|h| !h.is_empty())
        .map(|h| icon_url(guild_id, h));
    snapshot.description = guild.description.filter(|d| !d.is_empty());

    let mut roles: Vec<DiscordRole> = roles
        .into_iter()
        .filter(|r| r.id != guild_id && r.name != "@everyone")
        .collect();
    roles.sort_by(|a, b| b.position.cmp(&a.position));
    snapshot.roles = roles
        .into_iter()
        .enumerate()
        .map(|(rank, r)| {
            let bits = r.permissions.parse::<u64>().unwrap_or_else(|_| {
                warn!("role '{}' has unreadable permissions '{}'", r.name, r.permissions);
                0
            });
            RoleSpec {
                source_id: r.id,
                name: r.name,
                color: (r.color != 0).then(|| Rgb::from_u32(r.color)),
                permission_bits: PermissionBitset(bits),
                position: rank as u32,
            }
        })
        .collect();

    for channel in channels {
        let name = channel.name.unwrap_or_default();
        let position = clamp_position(channel.position);
        match map_type(channel.kind) {
            Mapped::Category => snapshot.categories.push(CategorySpec {
                source_id: channel.id,
                name,
                position,
            }),
            Mapped::Channel(kind) => snapshot.channels.push(ChannelSpec {
                source_id: channel.id,
                name,
                kind,
                topic: channel.topic.filter(|t| !t.is_empty()),
                category_source_id: channel.parent_id,
                position,
            }),
            Mapped::Skipped => {}
        }
    }
    snapshot.categories.sort_by_key(|c| c.position);
    snapshot.channels.sort_by_key(|c| c.position);

    snapshot
}

/// Reads one guild with a bot token.
pub struct DiscordReader {
    client: RestClient,
    guild_id: String,
    retry: RetryPolicy,
}

impl DiscordReader {
    pub fn new(client: RestClient, guild_id: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            guild_id: guild_id.into(),
            retry,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let source = config.require_source()?;
        let client = RestClient::new(
            PLATFORM,
            &source.api_url,
            config.migration.request_timeout(),
            RATE_LIMIT,
        )
        .with_header("Authorization", format!("Bot {}", source.token));
        Ok(Self::new(client, source.guild_id.clone(), config.retry_policy()))
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let client = &self.client;
        let value = self
            .retry
            .run(path, move || client.get(path))
            .await
            .map_err(MigrateError::source_read)?;
        serde_json::from_value(value)
            .map_err(|e| MigrateError::source_read(format!("unexpected response for {}: {}", path, e)))
    }
}

#[async_trait]
impl SnapshotReader for DiscordReader {
    async fn read_snapshot(&self) -> Result<ServerSnapshot> {
        info!("Reading Discord guild {}", self.guild_id);

        let guild: DiscordGuild = self.fetch(&format!("/guilds/{}", self.guild_id)).await?;
        let roles: Vec<DiscordRole> = self
            .fetch(&format!("/guilds/{}/roles", self.guild_id))
            .await?;
        let channels: Vec<DiscordChannel> = self
            .fetch(&format!("/guilds/{}/channels", self.guild_id))
            .await?;

        let snapshot = build_snapshot(&self.guild_id, guild, roles, channels);
        info!("Read {}", snapshot.summary());
        Ok(snapshot)
    }

    fn platform(&self) -> &str {
        PLATFORM
    }
}
