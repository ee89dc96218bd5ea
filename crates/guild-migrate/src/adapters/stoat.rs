//! Stoat (stoat.chat, formerly Revolt) destination.
//!
//! Stoat bots cannot create servers, so the destination is an existing server
//! the bot was invited to: `create_server` renames it and returns its id.
//! Categories are not API objects on Stoat; they are a list stored on the
//! server. They are buffered under locally generated ids and written in one
//! `PATCH` from [`finish`](PlatformAdapter::finish).

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::{MigrationConfig, StoatConfig};
use crate::core::snapshot::{ChannelKind, Rgb};
use crate::core::traits::{Created, PlatformAdapter};
use crate::error::{AdapterError, AdapterResult, Result};
use crate::http::{id_field, Method, RateLimitHint, RestClient, RetryAfterUnit};
use crate::permissions::stoat::stoat_table;
use crate::permissions::{CapabilityTable, DestinationPermissionSet};
use crate::retry::RetryPolicy;

use super::follow_up;

pub const PLATFORM: &str = "stoat";

const RATE_LIMIT: RateLimitHint = RateLimitHint::new("retry_after", RetryAfterUnit::Milliseconds);

/// A category waiting to be written to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedCategory {
    pub id: String,
    pub title: String,
    pub position: u32,
    pub channels: Vec<String>,
}

pub struct StoatAdapter {
    client: RestClient,
    server_id: String,
    retry: RetryPolicy,
    categories: Mutex<Vec<BufferedCategory>>,
}

impl StoatAdapter {
    pub fn new(client: RestClient, server_id: impl Into<String>) -> Self {
        Self {
            client,
            server_id: server_id.into(),
            retry: RetryPolicy::default(),
            categories: Mutex::new(Vec::new()),
        }
    }

    /// Policy for the colour and permission requests sent after a role is
    /// created.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn from_config(config: &StoatConfig, migration: &MigrationConfig) -> Result<Self> {
        let client = RestClient::new(
            PLATFORM,
            &config.api_url,
            migration.request_timeout(),
            RATE_LIMIT,
        )
        .with_header("x-bot-token", config.token.clone());
        Ok(Self::new(client, config.server_id.clone()).with_retry_policy(migration.retry_policy()))
    }

    /// Snapshot of the buffered layout.
    pub fn buffered_categories(&self) -> Vec<BufferedCategory> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<BufferedCategory>> {
        self.categories.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Body for `PATCH /servers/{id}` that renames the server.
pub fn server_patch(name: &str, description: Option<&str>) -> Value {
    let mut body = json!({ "name": name });
    if let Some(description) = description.filter(|d| !d.is_empty()) {
        body["description"] = json!(description);
    }
    body
}

pub fn channel_body(kind: ChannelKind, name: &str, topic: Option<&str>) -> Value {
    let kind = match kind {
        ChannelKind::Text => "Text",
        ChannelKind::Voice => "Voice",
    };
    let mut body = json!({ "name": name, "type": kind });
    if let Some(topic) = topic.filter(|t| !t.is_empty()) {
        body["description"] = json!(topic);
    }
    body
}

/// Body for `PATCH /servers/{id}` that writes the category list, ordered by
/// position (ties keep creation order).
pub fn category_layout(categories: &[BufferedCategory]) -> Value {
    let mut ordered: Vec<&BufferedCategory> = categories.iter().collect();
    ordered.sort_by_key(|c| c.position);
    let list: Vec<Value> = ordered
        .into_iter()
        .map(|c| json!({ "id": c.id, "title": c.title, "channels": c.channels }))
        .collect();
    json!({ "categories": list })
}

#[async_trait]
impl PlatformAdapter for StoatAdapter {
    fn platform(&self) -> &str {
        PLATFORM
    }

    fn capability_table(&self) -> CapabilityTable {
        stoat_table()
    }

    async fn create_server(
        &self,
        name: &str,
        icon: Option<&str>,
        description: Option<&str>,
    ) -> AdapterResult<String> {
        if let Some(icon) = icon {
            info!("Server icon is not uploaded, set it manually: {}", icon);
        }
        self.client
            .patch(
                &format!("/servers/{}", self.server_id),
                server_patch(name, description),
            )
            .await?;
        info!("Stoat server {} renamed to '{}'", self.server_id, name);
        Ok(self.server_id.clone())
    }

    async fn create_role(
        &self,
        server_id: &str,
        name: &str,
        color: Option<Rgb>,
        permissions: &DestinationPermissionSet,
        position: u32,
    ) -> AdapterResult<Created> {
        let created = self
            .client
            .post(
                &format!("/servers/{}/roles", server_id),
                json!({ "name": name, "rank": position }),
            )
            .await?;
        let role_id = id_field(&created, &["id", "_id"], "stoat create role")?;
        let mut problems = Vec::new();

        if let Some(color) = color {
            let problem = follow_up(
                &self.client,
                &self.retry,
                &format!("role '{}' colour", name),
                Method::Patch,
                &format!("/servers/{}/roles/{}", server_id, role_id),
                json!({ "colour": color.to_hex() }),
            )
            .await?;
            problems.extend(problem);
        }

        if !permissions.is_empty() {
            let problem = follow_up(
                &self.client,
                &self.retry,
                &format!("role '{}' permissions", name),
                Method::Put,
                &format!("/servers/{}/permissions/{}", server_id, role_id),
                json!({ "permissions": { "allow": permissions.bits, "deny": 0 } }),
            )
            .await?;
            problems.extend(problem);
        }

        debug!("role '{}' created as {}", name, role_id);
        Ok(Created::new(role_id).with_problems(problems))
    }

    async fn create_category(
        &self,
        _server_id: &str,
        name: &str,
        position: u32,
    ) -> AdapterResult<Created> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.lock().push(BufferedCategory {
            id: id.clone(),
            title: name.to_string(),
            position,
            channels: Vec::new(),
        });
        debug!("category '{}' buffered as {}", name, id);
        Ok(Created::new(id))
    }

    async fn create_channel(
        &self,
        server_id: &str,
        kind: ChannelKind,
        name: &str,
        topic: Option<&str>,
        category_id: Option<&str>,
        _position: u32,
    ) -> AdapterResult<Created> {
        if let Some(category_id) = category_id {
            if !self.lock().iter().any(|c| c.id == category_id) {
                return Err(AdapterError::contract_violation(format!(
                    "unknown category id '{}'",
                    category_id
                )));
            }
        }

        let created = self
            .client
            .post(
                &format!("/servers/{}/channels", server_id),
                channel_body(kind, name, topic),
            )
            .await?;
        let channel_id = id_field(&created, &["_id", "id"], "stoat create channel")?;

        if let Some(category_id) = category_id {
            if let Some(category) = self.lock().iter_mut().find(|c| c.id == category_id) {
                category.channels.push(channel_id.clone());
            }
        }

        Ok(Created::new(channel_id))
    }

    async fn finish(&self, server_id: &str) -> AdapterResult<()> {
        let categories = self.buffered_categories();
        if categories.is_empty() {
            return Ok(());
        }
        self.client
            .patch(&format!("/servers/{}", server_id), category_layout(&categories))
            .await?;
        info!("{} categories applied to Stoat server {}", categories.len(), server_id);
        Ok(())
    }
}
