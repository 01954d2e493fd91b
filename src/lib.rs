//! Grantree - hierarchical resource permission resolution.
//!
//! Resources form trees inside a namespace. Each resource may carry a public
//! (global) level, and users or groups may hold explicit grants on any node.
//! Grantree answers one question: what level does this user effectively hold
//! on this resource?
//!
//! - **Permission**: the ordered level lattice and typed [`Level`] markers
//! - **Resolve**: pure nearest-ancestor resolution over loaded chains and closures
//! - **Provider**: traits for the ancestor, directory and grant collaborators
//! - **Store**: libsql implementation of those traits
//! - **Service**: resolution, gate checks, grant changes and listings
//! - **Config**: Layered configuration (file → env → overrides)
//!
//! # Example
//!
//! ```ignore
//! use grantree::{ConfigLoader, PermissionLevel, level};
//!
//! #[tokio::main]
//! async fn main() -> grantree::Result<()> {
//!     let config = ConfigLoader::new("MYAPP").load(None, Some(":memory:"), None)?;
//!     let service = grantree::open(&config).await?;
//!
//!     if service
//!         .user_has_permission("ns-1", "doc-7", "user-3", PermissionLevel::CanEdit)
//!         .await?
//!     {
//!         println!("may edit");
//!     }
//!
//!     // Or get a typed token that proves the check happened
//!     let permit = service.require::<level::Full>("ns-1", "doc-7", "user-3").await?;
//!     service
//!         .set_user_grant("ns-1", permit.resource_id(), "user-9", PermissionLevel::CanView)
//!         .await
//! }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod gate;
pub mod listing;
pub mod model;
pub mod mutate;
pub mod permission;
pub mod provider;
pub mod resolve;
pub mod service;
pub mod store;

// Re-export main types at crate root
pub use config::{Config, ConfigLoader};
pub use error::{Error, Result};
pub use model::{
    GroupGrant, GroupPermission, GroupRef, PermissionListing, ResourceNode, UserGrant,
    UserPermission, UserRef,
};
pub use permission::{Level, PermissionLevel, Permit, level};
pub use provider::{AncestorProvider, Backend, Directory, GrantStore};
pub use service::PermissionService;
pub use store::SqlStore;

/// Connect, migrate and build a service from `config`.
pub async fn open(config: &Config) -> Result<PermissionService<SqlStore>> {
    let store = SqlStore::open(config).await?;
    Ok(PermissionService::with_resolution(
        store,
        config.resolution.clone(),
    ))
}
