//! Matrix destination (client-server API v3).
//!
//! | source   | Matrix                                   |
//! |----------|------------------------------------------|
//! | server   | private space (`m.space`)                |
//! | category | sub-space linked with `m.space.child`    |
//! | channel  | private room, `m.voice` type for voice   |
//! | role     | power level (100 / 50 / 0), report only  |
//!
//! Matrix has no role objects. Each role's mapped level is buffered and
//! logged from [`finish`](PlatformAdapter::finish) so it can be assigned to
//! users by hand.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::{MatrixConfig, MigrationConfig};
use crate::core::snapshot::{ChannelKind, Rgb};
use crate::core::traits::{Created, PlatformAdapter};
use crate::error::{AdapterError, AdapterResult, Result};
use crate::http::{id_field, Method, RateLimitHint, RestClient, RetryAfterUnit};
use crate::permissions::matrix::{self, level_label, matrix_table, power_level};
use crate::permissions::{CapabilityTable, DestinationPermissionSet};
use crate::retry::RetryPolicy;

use super::follow_up;

pub const PLATFORM: &str = "matrix";

const CLIENT_API: &str = "/_matrix/client/v3";
const RATE_LIMIT: RateLimitHint =
    RateLimitHint::new("retry_after_ms", RetryAfterUnit::Milliseconds);

#[derive(Debug, Default)]
struct State {
    user_id: Option<String>,
    spaces: HashSet<String>,
    role_levels: Vec<(String, i64)>,
}

pub struct MatrixAdapter {
    client: RestClient,
    via: String,
    retry: RetryPolicy,
    state: Mutex<State>,
}

impl MatrixAdapter {
    pub fn new(client: RestClient, homeserver: &str) -> Self {
        Self {
            client,
            via: server_name(homeserver),
            retry: RetryPolicy::default(),
            state: Mutex::new(State::default()),
        }
    }

    /// Policy for the `m.space.child` links sent after a room exists.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn from_config(config: &MatrixConfig, migration: &MigrationConfig) -> Result<Self> {
        let base = format!("{}{}", config.homeserver.trim_end_matches('/'), CLIENT_API);
        let client = RestClient::new(PLATFORM, &base, migration.request_timeout(), RATE_LIMIT)
            .with_header("Authorization", format!("Bearer {}", config.token));
        Ok(Self::new(client, &config.homeserver).with_retry_policy(migration.retry_policy()))
    }

    /// Role name → power level, in creation order.
    pub fn role_levels(&self) -> Vec<(String, i64)> {
        self.lock().role_levels.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Matrix id of the token's owner, fetched once.
    async fn user_id(&self) -> AdapterResult<String> {
        let cached = self.lock().user_id.clone();
        if let Some(user_id) = cached {
            return Ok(user_id);
        }

        let whoami = self.client.get("/account/whoami").await.map_err(|e| {
            if e.is_retryable() {
                e
            } else {
                AdapterError::fatal(format!("access token check failed: {}", e))
            }
        })?;
        let user_id =
            id_field(&whoami, &["user_id"], "matrix whoami").map_err(AdapterError::into_fatal)?;

        info!("Authenticated to Matrix as {}", user_id);
        self.lock().user_id = Some(user_id.clone());
        Ok(user_id)
    }

    async fn create_room(&self, body: Value, what: &str) -> AdapterResult<String> {
        let created = self.client.post("/createRoom", body).await?;
        id_field(&created, &["room_id"], what)
    }

    /// Make `child` part of `space`. The child already exists, so only
    /// fatal errors propagate; a link still failing after retries comes back
    /// as the reason the child is left detached.
    async fn link(
        &self,
        space: &str,
        child: &str,
        position: u32,
    ) -> AdapterResult<Option<String>> {
        follow_up(
            &self.client,
            &self.retry,
            &format!("link {} into {}", child, space),
            Method::Put,
            &format!("/rooms/{}/state/m.space.child/{}", space, child),
            space_child(&self.via, position),
        )
        .await
    }

    fn placed(id: String, link: Option<String>) -> Created {
        match link {
            Some(reason) => Created::new(id).detached(reason),
            None => Created::new(id),
        }
    }
}

/// Host (and port) part of a homeserver URL, used as the `via` server.
pub fn server_name(homeserver: &str) -> String {
    let without_scheme = homeserver
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(homeserver);
    without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .to_string()
}

/// Power levels applied to every space and room created. The caller keeps
/// level 100 so state events stay writable after `state_default` is raised.
pub fn power_levels(user_id: &str) -> Value {
    json!({
        "ban": matrix::MODERATOR,
        "kick": matrix::MODERATOR,
        "redact": matrix::MODERATOR,
        "invite": matrix::USER,
        "events_default": matrix::USER,
        "state_default": matrix::MODERATOR,
        "users_default": matrix::USER,
        "events": {
            "m.room.name": matrix::MODERATOR,
            "m.room.avatar": matrix::MODERATOR,
            "m.room.topic": matrix::MODERATOR,
            "m.room.power_levels": matrix::ADMIN,
            "m.room.history_visibility": matrix::ADMIN,
        },
        "users": { user_id: matrix::ADMIN },
    })
}

pub fn space_body(name: &str, topic: Option<&str>, user_id: &str) -> Value {
    let mut body = json!({
        "name": name,
        "creation_content": { "type": "m.space" },
        "visibility": "private",
        "preset": "private_chat",
        "initial_state": [
            { "type": "m.room.power_levels", "state_key": "", "content": power_levels(user_id) }
        ],
    });
    if let Some(topic) = topic.filter(|t| !t.is_empty()) {
        body["topic"] = json!(topic);
    }
    body
}

pub fn room_body(kind: ChannelKind, name: &str, topic: Option<&str>, user_id: &str) -> Value {
    let mut body = json!({
        "name": name,
        "visibility": "private",
        "preset": "private_chat",
        "initial_state": [
            { "type": "m.room.power_levels", "state_key": "", "content": power_levels(user_id) }
        ],
    });
    if let Some(topic) = topic.filter(|t| !t.is_empty()) {
        body["topic"] = json!(topic);
    }
    if kind == ChannelKind::Voice {
        body["creation_content"] = json!({ "type": "m.voice" });
    }
    body
}

/// `m.space.child` content. `order` sorts lexicographically, so the position
/// is zero padded.
pub fn space_child(via: &str, position: u32) -> Value {
    json!({ "via": [via], "order": format!("{:08}", position) })
}

#[async_trait]
impl PlatformAdapter for MatrixAdapter {
    fn platform(&self) -> &str {
        PLATFORM
    }

    fn capability_table(&self) -> CapabilityTable {
        matrix_table()
    }

    async fn create_server(
        &self,
        name: &str,
        icon: Option<&str>,
        description: Option<&str>,
    ) -> AdapterResult<String> {
        let user_id = self.user_id().await?;
        if let Some(icon) = icon {
            info!("Space avatar is not uploaded, set it manually: {}", icon);
        }

        let space_id = self
            .create_room(space_body(name, description, &user_id), "matrix create space")
            .await?;
        self.lock().spaces.insert(space_id.clone());
        info!("Matrix space created: {}", space_id);
        Ok(space_id)
    }

    async fn create_role(
        &self,
        _server_id: &str,
        name: &str,
        _color: Option<Rgb>,
        permissions: &DestinationPermissionSet,
        _position: u32,
    ) -> AdapterResult<Created> {
        let level = power_level(permissions);
        let mut state = self.lock();
        state.role_levels.push((name.to_string(), level));
        let id = format!("power-level/{}/{}", level, state.role_levels.len());
        debug!("role '{}' -> power level {} ({})", name, level, level_label(level));
        Ok(Created::new(id))
    }

    async fn create_category(
        &self,
        server_id: &str,
        name: &str,
        position: u32,
    ) -> AdapterResult<Created> {
        let user_id = self.user_id().await?;
        let space_id = self
            .create_room(space_body(name, None, &user_id), "matrix create sub-space")
            .await?;
        self.lock().spaces.insert(space_id.clone());
        let link = self.link(server_id, &space_id, position).await?;
        Ok(Self::placed(space_id, link))
    }

    async fn create_channel(
        &self,
        server_id: &str,
        kind: ChannelKind,
        name: &str,
        topic: Option<&str>,
        category_id: Option<&str>,
        position: u32,
    ) -> AdapterResult<Created> {
        if let Some(category_id) = category_id {
            if category_id == server_id || !self.lock().spaces.contains(category_id) {
                return Err(AdapterError::contract_violation(format!(
                    "unknown category id '{}'",
                    category_id
                )));
            }
        }

        let user_id = self.user_id().await?;
        let room_id = self
            .create_room(room_body(kind, name, topic, &user_id), "matrix create room")
            .await?;
        let link = self
            .link(category_id.unwrap_or(server_id), &room_id, position)
            .await?;
        Ok(Self::placed(room_id, link))
    }

    async fn finish(&self, server_id: &str) -> AdapterResult<()> {
        info!(
            "Matrix space: {} (matrix:roomid/{})",
            server_id,
            server_id.trim_start_matches('!')
        );

        let mut levels = self.role_levels();
        if levels.is_empty() {
            return Ok(());
        }
        levels.sort_by(|a, b| b.1.cmp(&a.1));
        info!("Role to power level mapping, assign these to users manually:");
        for (name, level) in levels {
            info!("  {:>3} ({}) <- {}", level, level_label(level), name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::{CategorySpec, ChannelSpec, ServerSnapshot};
    use crate::permissions::{map, PermissionBitset};
    use crate::test_server::{Reply, Request, StubServer};
    use crate::{Orchestrator, RunStatus};
    use std::sync::Arc;
    use std::time::Duration;

    fn adapter() -> MatrixAdapter {
        let client = RestClient::new(
            PLATFORM,
            "http://127.0.0.1:9/_matrix/client/v3",
            Duration::from_millis(10),
            RATE_LIMIT,
        );
        MatrixAdapter::new(client, "https://matrix.example.org")
    }

    #[test]
    fn test_server_name() {
        assert_eq!(server_name("https://matrix.example.org"), "matrix.example.org");
        assert_eq!(server_name("http://localhost:8008/"), "localhost:8008");
        assert_eq!(server_name("matrix.org"), "matrix.org");
    }

    #[test]
    fn test_power_levels_give_creator_admin() {
        let levels = power_levels("@bot:example.org");
        assert_eq!(levels["users"]["@bot:example.org"], json!(100));
        assert_eq!(levels["state_default"], json!(50));
        assert_eq!(levels["events"]["m.room.power_levels"], json!(100));
        assert_eq!(levels["invite"], json!(0));
    }

    #[test]
    fn test_space_and_room_bodies() {
        let space = space_body("Guild", Some("about"), "@bot:x");
        assert_eq!(space["creation_content"]["type"], json!("m.space"));
        assert_eq!(space["topic"], json!("about"));

        let voice = room_body(ChannelKind::Voice, "lounge", None, "@bot:x");
        assert_eq!(voice["creation_content"]["type"], json!("m.voice"));
        assert!(voice.get("topic").is_none());

        let text = room_body(ChannelKind::Text, "general", Some("chat"), "@bot:x");
        assert!(text.get("creation_content").is_none());
        assert_eq!(text["topic"], json!("chat"));
    }

    #[test]
    fn test_space_child_order_sorts_lexicographically() {
        let a = space_child("example.org", 2);
        let b = space_child("example.org", 10);
        assert_eq!(a["via"], json!(["example.org"]));
        assert!(a["order"].as_str().unwrap() < b["order"].as_str().unwrap());
    }

    #[tokio::test]
    async fn test_roles_become_buffered_power_levels() {
        let adapter = adapter();
        let table = matrix_table();
        let admin = map(PermissionBitset(1 << 3), &table);
        let plain = map(PermissionBitset(1 << 11), &table);

        let first = adapter
            .create_role("!space:x", "Admin", None, &admin, 0)
            .await
            .unwrap();
        let second = adapter
            .create_role("!space:x", "Member", None, &plain, 1)
            .await
            .unwrap();

        assert_eq!(first, Created::new("power-level/100/1"));
        assert_eq!(second.id, "power-level/0/2");
        assert_eq!(
            adapter.role_levels(),
            vec![("Admin".to_string(), 100), ("Member".to_string(), 0)]
        );
    }

    #[tokio::test]
    async fn test_unknown_category_is_contract_violation() {
        let err = adapter()
            .create_channel("!space:x", ChannelKind::Text, "general", None, Some("!nope:x"), 0)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.message.contains("contract violation"));
    }

    #[tokio::test]
    async fn test_finish_reports_without_requests() {
        let adapter = adapter();
        adapter
            .create_role("!space:x", "Mods", None, &DestinationPermissionSet::default(), 0)
            .await
            .unwrap();
        assert!(adapter.finish("!space:x").await.is_ok());
    }

    const WHOAMI: &str = "/_matrix/client/v3/account/whoami";
    const CREATE_ROOM: &str = "/_matrix/client/v3/createRoom";

    fn link_path(space: &str, child: &str) -> String {
        format!("/_matrix/client/v3/rooms/{}/state/m.space.child/{}", space, child)
    }

    /// Homeserver that numbers rooms in creation order; `link` answers the
    /// `m.space.child` writes.
    fn homeserver<F>(link: F) -> StubServer
    where
        F: Fn(&Request, usize) -> Reply + Send + Sync + 'static,
    {
        StubServer::start(move |req, attempt| match (req.method.as_str(), req.path.as_str()) {
            ("GET", WHOAMI) => Reply::json(200, json!({"user_id": "@bot:example.org"})),
            ("POST", CREATE_ROOM) => {
                Reply::json(200, json!({"room_id": format!("!room{}:example.org", attempt)}))
            }
            ("PUT", _) => link(req, attempt),
            _ => Reply::json(404, json!({"errcode": "M_UNRECOGNIZED"})),
        })
    }

    fn live(server: &StubServer, attempts: u32) -> MatrixAdapter {
        let base = format!("{}{}", server.url, CLIENT_API);
        let client = RestClient::new(PLATFORM, &base, Duration::from_secs(5), RATE_LIMIT);
        MatrixAdapter::new(client, "https://example.org")
            .with_retry_policy(RetryPolicy::new(attempts).with_base_delay(Duration::ZERO))
    }

    #[tokio::test]
    async fn test_channel_is_linked_under_its_category() {
        let server = homeserver(|_, _| Reply::json(200, json!({"event_id": "$e"})));
        let adapter = live(&server, 3);

        let space = adapter.create_server("Guild", None, None).await.unwrap();
        let category = adapter.create_category(&space, "Text", 1).await.unwrap();
        let channel = adapter
            .create_channel(
                &space,
                ChannelKind::Voice,
                "lounge",
                None,
                Some(category.id.as_str()),
                2,
            )
            .await
            .unwrap();

        assert_eq!(space, "!room1:example.org");
        assert_eq!(category, Created::new("!room2:example.org"));
        assert_eq!(channel, Created::new("!room3:example.org"));
        assert_eq!(server.count("GET", WHOAMI), 1);

        let links: Vec<Request> = server
            .requests()
            .into_iter()
            .filter(|r| r.method == "PUT")
            .collect();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].path, link_path(&space, &category.id));
        assert_eq!(links[1].path, link_path(&category.id, &channel.id));
        assert_eq!(links[1].body, json!({"via": ["example.org"], "order": "00000002"}));
    }

    #[tokio::test]
    async fn test_rate_limited_link_is_retried() {
        let server = homeserver(|_, attempt| match attempt {
            1 => Reply::json(429, json!({"errcode": "M_LIMIT_EXCEEDED", "retry_after_ms": 5})),
            _ => Reply::json(200, json!({"event_id": "$e"})),
        });
        let adapter = live(&server, 3);

        let channel = adapter
            .create_channel("!space:example.org", ChannelKind::Text, "general", None, None, 0)
            .await
            .unwrap();
        assert!(!channel.detached);
        assert_eq!(channel.degraded, None);
        assert_eq!(server.count("PUT", &link_path("!space:example.org", &channel.id)), 2);
    }

    #[tokio::test]
    async fn test_link_still_failing_leaves_room_detached() {
        let server = homeserver(|_, _| {
            Reply::json(429, json!({"errcode": "M_LIMIT_EXCEEDED", "retry_after_ms": 1}))
        });
        let adapter = live(&server, 2);

        let channel = adapter
            .create_channel("!space:example.org", ChannelKind::Text, "general", None, None, 0)
            .await
            .unwrap();
        assert_eq!(channel.id, "!room1:example.org");
        assert!(channel.detached);
        let reason = channel.degraded.unwrap();
        assert!(reason.contains("not applied"));
        assert!(reason.contains("gave up after 2 attempts"));
        assert_eq!(server.count("PUT", &link_path("!space:example.org", &channel.id)), 2);
    }

    #[tokio::test]
    async fn test_forbidden_link_is_fatal() {
        let server = homeserver(|_, _| Reply::json(403, json!({"errcode": "M_FORBIDDEN"})));
        let err = live(&server, 3)
            .create_channel("!space:example.org", ChannelKind::Text, "general", None, None, 0)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(server.count("PUT", &link_path("!space:example.org", "!room1:example.org")), 1);
    }

    #[tokio::test]
    async fn test_bad_token_is_fatal_before_any_room() {
        let server = StubServer::start(|_, _| {
            Reply::json(401, json!({"errcode": "M_UNKNOWN_TOKEN"}))
        });
        let err = live(&server, 3)
            .create_server("Guild", None, None)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.message.contains("access token check failed"));
        assert_eq!(server.count("GET", WHOAMI), 1);
        assert_eq!(server.count("POST", CREATE_ROOM), 0);
    }

    #[tokio::test]
    async fn test_room_response_without_id_is_rejected() {
        let server = StubServer::start(|req, _| match req.path.as_str() {
            WHOAMI => Reply::json(200, json!({"user_id": "@bot:example.org"})),
            _ => Reply::json(200, json!({})),
        });
        let err = live(&server, 3)
            .create_channel("!space:example.org", ChannelKind::Text, "general", None, None, 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::AdapterErrorKind::Rejected);
        assert!(server.requests().iter().all(|r| r.method != "PUT"));
    }

    #[tokio::test]
    async fn test_run_reports_unlinked_channel_without_parent() {
        // rooms: 1 space, 2 sub-space, 3 channel
        let channel_link = link_path("!room2:example.org", "!room3:example.org");
        let server = homeserver(move |req, _| {
            if req.path == channel_link {
                Reply::json(429, json!({"errcode": "M_LIMIT_EXCEEDED", "retry_after_ms": 1}))
            } else {
                Reply::json(200, json!({"event_id": "$e"}))
            }
        });

        let mut snapshot = ServerSnapshot::new("Guild");
        snapshot.categories.push(CategorySpec {
            source_id: "k1".into(),
            name: "Text".into(),
            position: 0,
        });
        snapshot.channels.push(ChannelSpec {
            source_id: "c1".into(),
            name: "general".into(),
            kind: ChannelKind::Text,
            topic: None,
            category_source_id: Some("k1".into()),
            position: 0,
        });

        let adapter = Arc::new(live(&server, 2));
        let report = Orchestrator::new(adapter)
            .with_retry_policy(RetryPolicy::new(2).with_base_delay(Duration::ZERO))
            .run(snapshot)
            .await;

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.categories.created[0].destination_id, "!room2:example.org");
        assert_eq!(report.categories.created[0].degraded, None);

        let channel = &report.channels.created[0];
        assert_eq!(channel.destination_id, "!room3:example.org");
        assert_eq!(channel.parent_id, None);
        assert!(channel.degraded.as_deref().unwrap().contains("not applied"));
        assert_eq!(report.channels.degraded_count(), 1);
    }
}
