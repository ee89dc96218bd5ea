//! # guild-migrate
//!
//! Migrates the structure of a chat server (roles, categories, channels,
//! names, colours) from Discord to another platform over REST.
//!
//! This library provides:
//!
//! - **Snapshots**: a platform-neutral [`ServerSnapshot`], read from Discord
//!   or loaded from a JSON file
//! - **Permission mapping** from Discord bitfields to each destination's model
//! - **Adapters** for Stoat and Matrix behind the [`PlatformAdapter`] trait
//! - **A staged engine** with per-item isolation, retry with backoff, and a
//!   report for completed and aborted runs alike
//!
//! ## Example
//!
//! ```rust,no_run
//! use guild_migrate::{AdapterCatalog, Config, DiscordReader, Orchestrator, SnapshotReader};
//!
//! #[tokio::main]
//! async fn main() -> guild_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let snapshot = DiscordReader::from_config(&config)?.read_snapshot().await?;
//!     let adapter = AdapterCatalog::with_builtins().create("stoat", &config)?;
//!     let report = Orchestrator::new(adapter)
//!         .with_retry_policy(config.retry_policy())
//!         .run(snapshot)
//!         .await;
//!     println!("{}", report.render_text());
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod permissions;
pub mod report;
pub mod retry;
pub mod source;

#[cfg(test)]
pub(crate) mod test_server;

// Re-exports for convenient access
pub use crate::core::{
    AdapterCatalog, CategorySpec, ChannelKind, ChannelSpec, Created, EntityKind, PlatformAdapter,
    Rgb, RoleSpec, ServerSnapshot, SnapshotReader, ValidationWarning,
};
pub use config::{Config, MatrixConfig, MigrationConfig, SourceConfig, StoatConfig};
pub use error::{AdapterError, AdapterErrorKind, AdapterResult, MigrateError, Result};
pub use orchestrator::{MigrationPlan, Orchestrator, RunStage};
pub use permissions::{Capability, CapabilityTable, DestinationPermissionSet, PermissionBitset};
pub use report::{MigrationReport, RunStatus};
pub use retry::RetryPolicy;
pub use source::DiscordReader;
