//! Dry-run preview: what a run would create, computed without touching the
//! destination.

use std::fmt::Write as _;

use serde::Serialize;

use crate::core::snapshot::{ChannelKind, ServerSnapshot, ValidationWarning};
use crate::error::Result;
use crate::permissions::{self, CapabilityTable, DestinationPermissionSet};

#[derive(Debug, Clone, Serialize)]
pub struct PlannedRole {
    pub source_id: String,
    pub name: String,
    pub position: u32,
    pub permissions: DestinationPermissionSet,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedCategory {
    pub source_id: String,
    pub name: String,
    pub position: u32,
}

/// Where a channel will land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "placement", rename_all = "snake_case")]
pub enum Placement {
    TopLevel,
    InCategory { category_source_id: String },
    /// Referenced category is missing from the snapshot.
    Degraded { category_source_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedChannel {
    pub source_id: String,
    pub name: String,
    pub kind: ChannelKind,
    pub position: u32,
    #[serde(flatten)]
    pub placement: Placement,
}

/// Ordered list of the creation calls a run would make.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationPlan {
    pub platform: String,
    pub server_name: String,
    pub warnings: Vec<ValidationWarning>,
    pub roles: Vec<PlannedRole>,
    pub categories: Vec<PlannedCategory>,
    pub channels: Vec<PlannedChannel>,
}

impl MigrationPlan {
    pub fn build(snapshot: &ServerSnapshot, table: &CapabilityTable) -> Self {
        let roles = snapshot
            .roles_in_order()
            .into_iter()
            .map(|r| PlannedRole {
                source_id: r.source_id.clone(),
                name: r.name.clone(),
                position: r.position,
                permissions: permissions::map(r.permission_bits, table),
            })
            .collect();

        let categories = snapshot
            .categories_in_order()
            .into_iter()
            .map(|c| PlannedCategory {
                source_id: c.source_id.clone(),
                name: c.name.clone(),
                position: c.position,
            })
            .collect();

        let channels = snapshot
            .channels_in_order()
            .into_iter()
            .map(|c| {
                let placement = match c.category_source_id {
                    None => Placement::TopLevel,
                    Some(ref id) if snapshot.has_category(id) => Placement::InCategory {
                        category_source_id: id.clone(),
                    },
                    Some(ref id) => Placement::Degraded {
                        category_source_id: id.clone(),
                    },
                };
                PlannedChannel {
                    source_id: c.source_id.clone(),
                    name: c.name.clone(),
                    kind: c.kind,
                    position: c.position,
                    placement,
                }
            })
            .collect();

        Self {
            platform: table.platform().to_string(),
            server_name: snapshot.name.clone(),
            warnings: snapshot.validate(),
            roles,
            categories,
            channels,
        }
    }

    /// Number of adapter creation calls, server included.
    pub fn call_count(&self) -> usize {
        1 + self.roles.len() + self.categories.len() + self.channels.len()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Plan: '{}' to {} ({} calls)",
            self.server_name,
            self.platform,
            self.call_count()
        );

        let _ = writeln!(out, "Roles ({}):", self.roles.len());
        for role in &self.roles {
            let _ = write!(out, "  {:>3}  {}  bits={:#x}", role.position, role.name, role.permissions.bits);
            if !role.permissions.coarsened.is_empty() {
                let _ = write!(out, "  coarsened={}", join(&role.permissions.coarsened));
            }
            if !role.permissions.dropped.is_empty() {
                let _ = write!(out, "  dropped={}", join(&role.permissions.dropped));
            }
            out.push('\n');
        }

        let _ = writeln!(out, "Categories ({}):", self.categories.len());
        for category in &self.categories {
            let _ = writeln!(out, "  {:>3}  {}", category.position, category.name);
        }

        let _ = writeln!(out, "Channels ({}):", self.channels.len());
        for channel in &self.channels {
            let placement = match channel.placement {
                Placement::TopLevel => "top level".to_string(),
                Placement::InCategory {
                    ref category_source_id,
                } => format!("in {}", category_source_id),
                Placement::Degraded {
                    ref category_source_id,
                } => format!("top level, missing category {}", category_source_id),
            };
            let _ = writeln!(
                out,
                "  {:>3}  {} [{}] ({})",
                channel.position, channel.name, channel.kind, placement
            );
        }

        for warning in &self.warnings {
            let _ = writeln!(out, "Warning: {}", warning);
        }
        out
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
