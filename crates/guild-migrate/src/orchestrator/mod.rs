//! Migration orchestrator - main workflow coordinator.
//!
//! A run replays a [`ServerSnapshot`] onto one destination in strictly
//! sequential stages: server, roles, categories, channels, then the
//! adapter's `finish` hook. Every adapter call goes through the
//! [`RetryPolicy`]. A failed item is recorded and the run continues; a fatal
//! error (or any failure to create the server) stops the run and the partial
//! report is returned.

mod id_map;
mod plan;
mod stage;

pub use id_map::IdMap;
pub use plan::{MigrationPlan, Placement, PlannedCategory, PlannedChannel, PlannedRole};
pub use stage::RunStage;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::core::snapshot::{EntityKind, ServerSnapshot};
use crate::core::traits::{Created, PlatformAdapter};
use crate::error::{AdapterError, AdapterResult};
use crate::permissions;
use crate::report::{CreatedEntity, EntityOutcomes, FailedEntity, MigrationReport, RunStatus};
use crate::retry::RetryPolicy;

/// Migration orchestrator.
pub struct Orchestrator {
    adapter: Arc<dyn PlatformAdapter>,
    retry: RetryPolicy,
}

/// Mutable state of one run.
struct Run {
    stage: RunStage,
    ids: IdMap,
    report: MigrationReport,
}

impl Run {
    fn advance(&mut self) {
        self.stage.advance();
        self.report.stage = self.stage;
        debug!("stage: {}", self.stage);
    }
}

impl Orchestrator {
    /// Create a new orchestrator with the default retry policy.
    pub fn new(adapter: Arc<dyn PlatformAdapter>) -> Self {
        Self {
            adapter,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn platform(&self) -> &str {
        self.adapter.platform()
    }

    /// Validate and map permissions without calling the adapter.
    pub fn plan(&self, snapshot: &ServerSnapshot) -> MigrationPlan {
        MigrationPlan::build(snapshot, &self.adapter.capability_table())
    }

    /// Run the migration. Always returns a report; check
    /// [`MigrationReport::is_aborted`] for the outcome.
    pub async fn run(&self, snapshot: ServerSnapshot) -> MigrationReport {
        let mut run = Run {
            stage: RunStage::NotStarted,
            ids: IdMap::new(),
            report: MigrationReport::new(self.adapter.platform(), &snapshot.name),
        };

        info!(
            "Starting migration run {} to {}: {}",
            run.report.run_id,
            self.adapter.platform(),
            snapshot.summary()
        );

        run.report.warnings = snapshot.validate();
        for warning in &run.report.warnings {
            warn!("Snapshot: {}", warning);
        }

        if let Err(e) = self.execute(&snapshot, &mut run).await {
            let during = run.stage.abort().unwrap_or("run");
            error!("Migration aborted during {}: {}", during, e);
            run.report.stage = run.stage;
            run.report.status = RunStatus::Aborted;
            run.report.aborted_during = Some(during.to_string());
            run.report.abort_reason = Some(e.message);
        }

        run.report.close();

        info!(
            "Migration {}: {} roles, {} categories, {} channels created, {} failed in {:.1}s",
            if run.report.is_aborted() { "aborted" } else { "completed" },
            run.report.roles.created_count(),
            run.report.categories.created_count(),
            run.report.channels.created_count(),
            run.report.failed_count(),
            run.report.duration_seconds
        );

        run.report
    }

    /// All stages in order. `Err` means the run must abort.
    async fn execute(
        &self,
        snapshot: &ServerSnapshot,
        run: &mut Run,
    ) -> AdapterResult<()> {
        info!("Phase 1: Creating server '{}'", snapshot.name);
        let server_id = self.create_server(snapshot).await?;
        run.report.server.id = Some(server_id.clone());
        run.advance();

        info!("Phase 2: Creating {} roles", snapshot.roles.len());
        self.create_roles(snapshot, &server_id, run).await?;
        run.advance();

        info!("Phase 3: Creating {} categories", snapshot.categories.len());
        self.create_categories(snapshot, &server_id, run).await?;
        run.advance();

        info!("Phase 4: Creating {} channels", snapshot.channels.len());
        self.create_channels(snapshot, &server_id, run).await?;
        run.advance();

        info!("Phase 5: Finalizing");
        self.finish(&server_id, run).await?;
        run.advance();

        Ok(())
    }

    /// Any failure here is fatal: nothing else can be created without a server.
    async fn create_server(&self, snapshot: &ServerSnapshot) -> AdapterResult<String> {
        let adapter = self.adapter.as_ref();
        let name = snapshot.name.as_str();
        let icon = snapshot.icon.as_deref();
        let description = snapshot.description.as_deref();

        let server_id = self
            .retry
            .run("create server", move || {
                adapter.create_server(name, icon, description)
            })
            .await
            .map_err(AdapterError::into_fatal)?;

        info!("Server created: {}", server_id);
        Ok(server_id)
    }

    async fn create_roles(
        &self,
        snapshot: &ServerSnapshot,
        server_id: &str,
        run: &mut Run,
    ) -> AdapterResult<()> {
        let adapter = self.adapter.as_ref();
        let table = adapter.capability_table();

        for role in snapshot.roles_in_order() {
            let mapped = permissions::map(role.permission_bits, &table);
            if !mapped.coarsened.is_empty() {
                info!(
                    "Role '{}': {} permission(s) mapped to a broader {} equivalent",
                    role.name,
                    mapped.coarsened.len(),
                    table.platform()
                );
            }
            let permissions = &mapped;

            let result = self
                .retry
                .run(&format!("role '{}'", role.name), move || {
                    adapter.create_role(
                        server_id,
                        &role.name,
                        role.color,
                        permissions,
                        role.position,
                    )
                })
                .await;

            record(
                EntityKind::Role,
                &role.source_id,
                &role.name,
                None,
                None,
                result,
                run,
            )?;
        }
        Ok(())
    }

    async fn create_categories(
        &self,
        snapshot: &ServerSnapshot,
        server_id: &str,
        run: &mut Run,
    ) -> AdapterResult<()> {
        let adapter = self.adapter.as_ref();

        for category in snapshot.categories_in_order() {
            let result = self
                .retry
                .run(&format!("category '{}'", category.name), move || {
                    adapter.create_category(server_id, &category.name, category.position)
                })
                .await;

            record(
                EntityKind::Category,
                &category.source_id,
                &category.name,
                None,
                None,
                result,
                run,
            )?;
        }
        Ok(())
    }

    async fn create_channels(
        &self,
        snapshot: &ServerSnapshot,
        server_id: &str,
        run: &mut Run,
    ) -> AdapterResult<()> {
        let adapter = self.adapter.as_ref();

        for channel in snapshot.channels_in_order() {
            let (parent_id, degraded) = match channel.category_source_id.as_deref() {
                None => (None, None),
                Some(category) => match run.ids.get(EntityKind::Category, category) {
                    Some(id) => (Some(id.to_string()), None),
                    None if snapshot.has_category(category) => (
                        None,
                        Some(format!(
                            "category '{}' was not created; placed at top level",
                            category
                        )),
                    ),
                    None => (
                        None,
                        Some(format!(
                            "category '{}' is not in the snapshot; placed at top level",
                            category
                        )),
                    ),
                },
            };
            if let Some(ref reason) = degraded {
                warn!("Channel '{}': {}", channel.name, reason);
            }

            let category_id = parent_id.as_deref();
            let topic = channel.effective_topic();
            let result = self
                .retry
                .run(&format!("channel '{}'", channel.name), move || {
                    adapter.create_channel(
                        server_id,
                        channel.kind,
                        &channel.name,
                        topic,
                        category_id,
                        channel.position,
                    )
                })
                .await;

            record(
                EntityKind::Channel,
                &channel.source_id,
                &channel.name,
                parent_id,
                degraded,
                result,
                run,
            )?;
        }
        Ok(())
    }

    async fn finish(&self, server_id: &str, run: &mut Run) -> AdapterResult<()> {
        let adapter = self.adapter.as_ref();
        match self
            .retry
            .run("finish", move || adapter.finish(server_id))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Finalization failed: {}", e);
                run.report.finish_error = Some(e.message);
                Ok(())
            }
        }
    }
}

/// Book a per-item outcome. Fatal errors are handed back to abort the run.
fn record(
    kind: EntityKind,
    source_id: &str,
    name: &str,
    parent_id: Option<String>,
    degraded: Option<String>,
    result: AdapterResult<Created>,
    run: &mut Run,
) -> AdapterResult<()> {
    let outcomes = outcomes_mut(&mut run.report, kind);
    match result {
        Ok(created) => {
            debug!("{} '{}' created: {}", kind, name, created.id);
            if !run.ids.insert(kind, source_id, &created.id) {
                warn!(
                    "{} source id '{}' already mapped; keeping the first mapping",
                    kind, source_id
                );
            }
            if let Some(ref reason) = created.degraded {
                warn!("{} '{}' created incompletely: {}", kind, name, reason);
            }
            let parent_id = if created.detached { None } else { parent_id };
            let degraded = match (degraded, created.degraded) {
                (Some(a), Some(b)) => Some(format!("{}; {}", a, b)),
                (a, b) => a.or(b),
            };
            outcomes.created.push(CreatedEntity {
                source_id: source_id.to_string(),
                name: name.to_string(),
                destination_id: created.id,
                parent_id,
                degraded,
            });
            Ok(())
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!("{} '{}' failed: {}", kind, name, e);
            outcomes.failed.push(FailedEntity {
                source_id: source_id.to_string(),
                name: name.to_string(),
                reason: e.message,
            });
            Ok(())
        }
    }
}

fn outcomes_mut(report: &mut MigrationReport, kind: EntityKind) -> &mut EntityOutcomes {
    match kind {
        EntityKind::Role => &mut report.roles,
        EntityKind::Category => &mut report.categories,
        EntityKind::Channel => &mut report.channels,
    }
}
