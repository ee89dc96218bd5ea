//! Platform-neutral description of a server's structure.
//!
//! A [`ServerSnapshot`] is produced by a reader (see [`crate::source`]) and
//! consumed, read-only, by the [`Orchestrator`](crate::Orchestrator). Nothing
//! here knows about a specific platform's API.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::permissions::PermissionBitset;

/// 24-bit RGB colour, stored as `0xRRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rgb(u32);

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb((r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    /// Build from a packed integer; bits above the low 24 are discarded.
    pub fn from_u32(value: u32) -> Self {
        Rgb(value & 0x00FF_FFFF)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// `#RRGGBB`, upper case.
    pub fn to_hex(&self) -> String {
        format!("#{:06X}", self.0)
    }
}

/// Kinds of entities the migration creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Role,
    Category,
    Channel,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Role => "role",
            EntityKind::Category => "category",
            EntityKind::Channel => "channel",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Text,
    Voice,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Text => f.write_str("text"),
            ChannelKind::Voice => f.write_str("voice"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    /// Origin platform id. Used for cross-referencing only, never sent out.
    pub source_id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<Rgb>,
    #[serde(default)]
    pub permission_bits: PermissionBitset,
    /// Lower = higher precedence.
    #[serde(default)]
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub source_id: String,
    pub name: String,
    #[serde(default)]
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub source_id: String,
    pub name: String,
    pub kind: ChannelKind,
    /// Only meaningful for text channels.
    #[serde(default)]
    pub topic: Option<String>,
    /// `source_id` of the parent category; `None` for top-level channels.
    #[serde(default)]
    pub category_source_id: Option<String>,
    #[serde(default)]
    pub position: u32,
}

impl ChannelSpec {
    /// The topic to send, if the channel kind supports one.
    pub fn effective_topic(&self) -> Option<&str> {
        match self.kind {
            ChannelKind::Text => self.topic.as_deref().filter(|t| !t.is_empty()),
            ChannelKind::Voice => None,
        }
    }
}

/// Structural inconsistency found before any destination call is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    /// A channel points at a category that is not in the snapshot. The
    /// channel is created at the top level instead.
    DanglingCategory {
        channel_source_id: String,
        channel_name: String,
        category_source_id: String,
    },
    /// Two entries of the same kind share a `source_id`. The first one keeps
    /// the id mapping.
    DuplicateSourceId { entity: EntityKind, source_id: String },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::DanglingCategory {
                channel_name,
                category_source_id,
                ..
            } => write!(
                f,
                "channel '{}' references category '{}' which is not in the snapshot; it will be created at the top level",
                channel_name, category_source_id
            ),
            ValidationWarning::DuplicateSourceId { entity, source_id } => {
                write!(f, "duplicate {} source id '{}'", entity, source_id)
            }
        }
    }
}

/// Complete, platform-neutral description of a server's structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub name: String,
    /// URL of the source icon. Carried for reference; icons are not uploaded.
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleSpec>,
    #[serde(default)]
    pub categories: Vec<CategorySpec>,
    #[serde(default)]
    pub channels: Vec<ChannelSpec>,
}

impl ServerSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: None,
            description: None,
            roles: Vec::new(),
            categories: Vec::new(),
            channels: Vec::new(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "'{}': {} roles, {} categories, {} channels",
            self.name,
            self.roles.len(),
            self.categories.len(),
            self.channels.len()
        )
    }

    /// Roles by `position`, ties kept in sequence order.
    pub fn roles_in_order(&self) -> Vec<&RoleSpec> {
        let mut roles: Vec<&RoleSpec> = self.roles.iter().collect();
        roles.sort_by_key(|r| r.position);
        roles
    }

    pub fn categories_in_order(&self) -> Vec<&CategorySpec> {
        let mut categories: Vec<&CategorySpec> = self.categories.iter().collect();
        categories.sort_by_key(|c| c.position);
        categories
    }

    pub fn channels_in_order(&self) -> Vec<&ChannelSpec> {
        let mut channels: Vec<&ChannelSpec> = self.channels.iter().collect();
        channels.sort_by_key(|c| c.position);
        channels
    }

    pub fn has_category(&self, source_id: &str) -> bool {
        self.categories.iter().any(|c| c.source_id == source_id)
    }

    /// Check cross-references and id uniqueness.
    pub fn validate(&self) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        duplicates(
            EntityKind::Role,
            self.roles.iter().map(|r| r.source_id.as_str()),
            &mut warnings,
        );
        duplicates(
            EntityKind::Category,
            self.categories.iter().map(|c| c.source_id.as_str()),
            &mut warnings,
        );
        duplicates(
            EntityKind::Channel,
            self.channels.iter().map(|c| c.source_id.as_str()),
            &mut warnings,
        );

        let categories: HashSet<&str> =
            self.categories.iter().map(|c| c.source_id.as_str()).collect();
        for channel in &self.channels {
            if let Some(ref category) = channel.category_source_id {
                if !categories.contains(category.as_str()) {
                    warnings.push(ValidationWarning::DanglingCategory {
                        channel_source_id: channel.source_id.clone(),
                        channel_name: channel.name.clone(),
                        category_source_id: category.clone(),
                    });
                }
            }
        }

        warnings
    }

    /// Load a snapshot saved with [`ServerSnapshot::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn duplicates<'a>(
    entity: EntityKind,
    ids: impl Iterator<Item = &'a str>,
    warnings: &mut Vec<ValidationWarning>,
) {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            warnings.push(ValidationWarning::DuplicateSourceId {
                entity,
                source_id: id.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn channel(id: &str, category: Option<&str>, position: u32) -> ChannelSpec {
        ChannelSpec {
            source_id: id.to_string(),
            name: format!("chan-{}", id),
            kind: ChannelKind::Text,
            topic: None,
            category_source_id: category.map(str::to_string),
            position,
        }
    }

    fn snapshot() -> ServerSnapshot {
        let mut s = ServerSnapshot::new("Guild");
        s.categories.push(CategorySpec {
            source_id: "c1".into(),
            name: "General".into(),
            position: 0,
        });
        s.channels.push(channel("t1", Some("c1"), 0));
        s.channels.push(channel("t2", None, 1));
        s
    }

    #[test]
    fn test_rgb_hex() {
        assert_eq!(Rgb::new(0x12, 0xAB, 0x0F).to_hex(), "#12AB0F");
        assert_eq!(Rgb::from_u32(0xFF00_0001).value(), 0x01);
        assert_eq!(Rgb::from_u32(0).to_hex(), "#000000");
    }

    #[test]
    fn test_valid_snapshot_has_no_warnings() {
        assert!(snapshot().validate().is_empty());
    }

    #[test]
    fn test_dangling_category_reference() {
        let mut s = snapshot();
        s.channels.push(channel("t3", Some("missing"), 2));
        let warnings = s.validate();
        assert_eq!(
            warnings,
            vec![ValidationWarning::DanglingCategory {
                channel_source_id: "t3".into(),
                channel_name: "chan-t3".into(),
                category_source_id: "missing".into(),
            }]
        );
        assert!(warnings[0].to_string().contains("top level"));
    }

    #[test]
    fn test_duplicate_source_ids() {
        let mut s = snapshot();
        s.channels.push(channel("t1", None, 5));
        let warnings = s.validate();
        assert_eq!(
            warnings,
            vec![ValidationWarning::DuplicateSourceId {
                entity: EntityKind::Channel,
                source_id: "t1".into(),
            }]
        );
    }

    #[test]
    fn test_order_is_stable_on_ties() {
        let mut s = ServerSnapshot::new("Guild");
        s.channels.push(channel("b", None, 1));
        s.channels.push(channel("a", None, 0));
        s.channels.push(channel("c", None, 1));
        let order: Vec<&str> = s
            .channels_in_order()
            .iter()
            .map(|c| c.source_id.as_str())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_voice_topic_is_ignored() {
        let mut c = channel("v", None, 0);
        c.kind = ChannelKind::Voice;
        c.topic = Some("not sent".into());
        assert_eq!(c.effective_topic(), None);

        let mut t = channel("t", None, 0);
        t.topic = Some(String::new());
        assert_eq!(t.effective_topic(), None);
    }

    #[test]
    fn test_save_load() {
        let s = snapshot();
        let file = NamedTempFile::new().unwrap();
        s.save(file.path()).unwrap();
        let loaded = ServerSnapshot::load(file.path()).unwrap();
        assert_eq!(loaded, s);
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{
            "name": "Guild",
            "channels": [{"source_id": "1", "name": "general", "kind": "text"}]
        }"#;
        let s: ServerSnapshot = serde_json::from_str(json).unwrap();
        assert!(s.roles.is_empty());
        assert_eq!(s.channels[0].category_source_id, None);
        assert_eq!(s.channels[0].position, 0);
    }
}
