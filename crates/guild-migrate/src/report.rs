//! Migration report: what was created, what failed, and why.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::core::snapshot::ValidationWarning;
use crate::error::{MigrateError, Result};
use crate::orchestrator::RunStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerOutcome {
    /// Destination id; `None` when server creation failed.
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedEntity {
    pub source_id: String,
    pub name: String,
    pub destination_id: String,
    /// Destination category the channel was placed in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Why the entity was created differently than described (e.g. a channel
    /// placed at the top level because its category is missing).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEntity {
    pub source_id: String,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityOutcomes {
    pub created: Vec<CreatedEntity>,
    pub failed: Vec<FailedEntity>,
}

impl EntityOutcomes {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn degraded_count(&self) -> usize {
        self.created.iter().filter(|c| c.degraded.is_some()).count()
    }
}

/// Result of one migration run. Produced for completed and aborted runs alike.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub run_id: String,
    pub platform: String,
    pub status: RunStatus,
    /// Last stage reached.
    pub stage: RunStage,
    /// Work that was in progress when the run aborted (e.g. "roles").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted_during: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    pub server: ServerOutcome,
    pub roles: EntityOutcomes,
    pub categories: EntityOutcomes,
    pub channels: EntityOutcomes,
    pub warnings: Vec<ValidationWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl MigrationReport {
    pub(crate) fn new(platform: &str, server_name: &str) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4().to_string(),
            platform: platform.to_string(),
            status: RunStatus::Completed,
            stage: RunStage::NotStarted,
            aborted_during: None,
            abort_reason: None,
            server: ServerOutcome {
                id: None,
                name: server_name.to_string(),
            },
            roles: EntityOutcomes::default(),
            categories: EntityOutcomes::default(),
            channels: EntityOutcomes::default(),
            warnings: Vec::new(),
            finish_error: None,
            started_at: now,
            completed_at: now,
            duration_seconds: 0.0,
        }
    }

    pub(crate) fn close(&mut self) {
        self.completed_at = Utc::now();
        self.duration_seconds =
            (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;
    }

    pub fn is_aborted(&self) -> bool {
        self.status == RunStatus::Aborted
    }

    /// The abort as an error, for callers that turn it into an exit code.
    pub fn abort_error(&self) -> Option<MigrateError> {
        if !self.is_aborted() {
            return None;
        }
        Some(MigrateError::Aborted {
            stage: self.aborted_during.clone().unwrap_or_else(|| "run".to_string()),
            reason: self.abort_reason.clone().unwrap_or_default(),
        })
    }

    pub fn failed_count(&self) -> usize {
        self.roles.failed_count() + self.categories.failed_count() + self.channels.failed_count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable summary for the terminal.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let status = match self.status {
            RunStatus::Completed => "completed",
            RunStatus::Aborted => "ABORTED",
        };
        let _ = writeln!(out, "Migration {} to {} ({})", status, self.platform, self.run_id);
        let _ = writeln!(
            out,
            "Server: {} -> {}",
            self.server.name,
            self.server.id.as_deref().unwrap_or("(not created)")
        );
        if let Some(ref reason) = self.abort_reason {
            let _ = writeln!(
                out,
                "Aborted during {}: {}",
                self.aborted_during.as_deref().unwrap_or("run"),
                reason
            );
        }

        for (label, outcomes) in [
            ("Roles", &self.roles),
            ("Categories", &self.categories),
            ("Channels", &self.channels),
        ] {
            let _ = write!(
                out,
                "{:<11} {} created, {} failed",
                format!("{}:", label),
                outcomes.created_count(),
                outcomes.failed_count()
            );
            let degraded = outcomes.degraded_count();
            if degraded > 0 {
                let _ = write!(out, ", {} degraded", degraded);
            }
            out.push('\n');
            for failed in &outcomes.failed {
                let _ = writeln!(out, "  x {} ({}): {}", failed.name, failed.source_id, failed.reason);
            }
            for created in outcomes.created.iter().filter(|c| c.degraded.is_some()) {
                let _ = writeln!(
                    out,
                    "  ~ {}: {}",
                    created.name,
                    created.degraded.as_deref().unwrap_or_default()
                );
            }
        }

        if !self.warnings.is_empty() {
            let _ = writeln!(out, "Warnings:");
            for warning in &self.warnings {
                let _ = writeln!(out, "  - {}", warning);
            }
        }
        if let Some(ref err) = self.finish_error {
            let _ = writeln!(out, "Finalization failed: {}", err);
        }
        let _ = writeln!(out, "Duration: {:.1}s", self.duration_seconds);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> MigrationReport {
        let mut report = MigrationReport::new("stoat", "Guild");
        report.server.id = Some("01HSERVER".into());
        report.stage = RunStage::Done;
        report.roles.created.push(CreatedEntity {
            source_id: "r1".into(),
            name: "Admin".into(),
            destination_id: "R1".into(),
            parent_id: None,
            degraded: None,
        });
        report.channels.created.push(CreatedEntity {
            source_id: "c1".into(),
            name: "general".into(),
            destination_id: "C1".into(),
            parent_id: None,
            degraded: Some("category 'k9' was not created".into()),
        });
        report.channels.failed.push(FailedEntity {
            source_id: "c2".into(),
            name: "memes".into(),
            reason: "HTTP 400".into(),
        });
        report.close();
        report
    }

    #[test]
    fn test_counts() {
        let report = report();
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.channels.degraded_count(), 1);
        assert!(!report.is_aborted());
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value = serde_json::from_str(&report().to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["stage"], "done");
        assert_eq!(json["server"]["id"], "01HSERVER");
        assert_eq!(json["channels"]["failed"][0]["reason"], "HTTP 400");
        assert!(json["roles"]["created"][0].get("degraded").is_none());
        assert!(json.get("abort_reason").is_none());
    }

    #[test]
    fn test_text_rendering() {
        let text = report().render_text();
        assert!(text.contains("Migration completed to stoat"));
        assert!(text.contains("1 created, 1 failed, 1 degraded"));
        assert!(text.contains("x memes (c2): HTTP 400"));
    }

    #[test]
    fn test_aborted_rendering() {
        let mut report = MigrationReport::new("matrix", "Guild");
        report.status = RunStatus::Aborted;
        report.aborted_during = Some("server".into());
        report.abort_reason = Some("not authorized".into());
        let text = report.render_text();
        assert!(text.contains("ABORTED"));
        assert!(text.contains("Aborted during server"));
        assert!(text.contains("(not created)"));
        assert!(text.contains("not authorized"));
    }

    #[test]
    fn test_abort_error() {
        assert!(report().abort_error().is_none());

        let mut report = MigrationReport::new("stoat", "Guild");
        report.status = RunStatus::Aborted;
        report.aborted_during = Some("channels".into());
        report.abort_reason = Some("token revoked".into());
        let err = report.abort_error().unwrap();
        assert_eq!(err.exit_code(), 5);
        assert_eq!(err.to_string(), "Migration aborted during channels: token revoked");
    }
}
