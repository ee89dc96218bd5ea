//! Core traits for platform-agnostic migration.
//!
//! - [`SnapshotReader`]: reads a source server into a [`ServerSnapshot`]
//! - [`PlatformAdapter`]: replays creation primitives onto a destination
//!
//! The orchestrator only ever talks to these traits, so a new destination is
//! one more `PlatformAdapter` implementation plus a registration in
//! [`AdapterCatalog`](super::catalog::AdapterCatalog).

use async_trait::async_trait;

use crate::error::{AdapterResult, Result};
use crate::permissions::{CapabilityTable, DestinationPermissionSet};

use super::snapshot::{ChannelKind, Rgb, ServerSnapshot};

/// An entity that now exists on the destination.
///
/// Adapters that decorate or attach an entity with requests after creating
/// it report what could not be applied in `degraded` instead of failing the
/// whole item: the entity exists and its id is needed by later stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub id: String,
    pub degraded: Option<String>,
    /// The entity exists but is not attached under the requested parent.
    pub detached: bool,
}

impl Created {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            degraded: None,
            detached: false,
        }
    }

    /// Created, but some follow-up requests were not applied.
    pub fn with_problems(mut self, problems: Vec<String>) -> Self {
        if !problems.is_empty() {
            self.degraded = Some(problems.join("; "));
        }
        self
    }

    /// Created, but not attached under its parent.
    pub fn detached(mut self, reason: impl Into<String>) -> Self {
        self.degraded = Some(reason.into());
        self.detached = true;
        self
    }
}

/// Read a source server's structure.
#[async_trait]
pub trait SnapshotReader: Send + Sync {
    /// Fetch the whole structure in one go. Fails with
    /// [`MigrateError::SourceRead`](crate::MigrateError::SourceRead) on
    /// authorization or network failure.
    async fn read_snapshot(&self) -> Result<ServerSnapshot>;

    /// Source platform identifier (e.g. "discord").
    fn platform(&self) -> &str;
}

/// Creation primitives of a destination platform.
///
/// Methods take `&self`; implementations that need to buffer state between
/// calls keep it behind a lock. The orchestrator never calls an adapter
/// concurrently.
///
/// # Errors
///
/// Every method returns an [`AdapterError`](crate::AdapterError) whose kind
/// tells the orchestrator what to do: `Fatal` aborts the run, `Retryable` is
/// retried with backoff, `Rejected` becomes a per-item failure.
///
/// # Duplicates
///
/// Calls are not deduplicated. Running the same snapshot twice, or retrying a
/// call whose response was lost, can create the same entity twice.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Destination platform identifier (e.g. "stoat").
    fn platform(&self) -> &str;

    /// Table used to translate source role permissions for this platform.
    fn capability_table(&self) -> CapabilityTable;

    /// Provision (or claim) the destination server. Returns its id.
    async fn create_server(
        &self,
        name: &str,
        icon: Option<&str>,
        description: Option<&str>,
    ) -> AdapterResult<String>;

    /// Create a role. `position` follows the snapshot convention (lower =
    /// higher precedence); adapters without an ordering concept fall back to
    /// creation order.
    async fn create_role(
        &self,
        server_id: &str,
        name: &str,
        color: Option<Rgb>,
        permissions: &DestinationPermissionSet,
        position: u32,
    ) -> AdapterResult<Created>;

    async fn create_category(
        &self,
        server_id: &str,
        name: &str,
        position: u32,
    ) -> AdapterResult<Created>;

    /// Create a channel. `category_id` must be an id previously returned by
    /// [`create_category`](Self::create_category) in the same run; anything
    /// else is a fatal contract violation.
    #[allow(clippy::too_many_arguments)]
    async fn create_channel(
        &self,
        server_id: &str,
        kind: ChannelKind,
        name: &str,
        topic: Option<&str>,
        category_id: Option<&str>,
        position: u32,
    ) -> AdapterResult<Created>;

    /// Called once after the channel stage. Adapters that buffer layout
    /// changes apply them here.
    async fn finish(&self, _server_id: &str) -> AdapterResult<()> {
        Ok(())
    }
}
