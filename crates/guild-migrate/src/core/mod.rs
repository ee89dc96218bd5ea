//! Core abstractions for platform-agnostic migration.
//!
//! - [`snapshot`]: the neutral server description shared by readers and the engine
//! - [`traits`]: [`SnapshotReader`] and [`PlatformAdapter`]
//! - [`catalog`]: platform registry for dependency injection
//!
//! Platform modules (`adapters/*`, `source/*`) implement these traits; the
//! orchestrator depends on nothing else.

pub mod catalog;
pub mod snapshot;
pub mod traits;

pub use catalog::{AdapterCatalog, AdapterFactory};
pub use snapshot::{
    CategorySpec, ChannelKind, ChannelSpec, EntityKind, Rgb, RoleSpec, ServerSnapshot,
    ValidationWarning,
};
pub use traits::{Created, PlatformAdapter, SnapshotReader};
