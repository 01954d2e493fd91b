//! Authorization gate.
//!
//! Namespace membership is checked before anything else: a non-member never
//! gets a resolved level, whatever grants exist.

use tracing::debug;

use crate::model::ResourceNode;
use crate::permission::{Level, PermissionLevel, Permit};
use crate::provider::Backend;
use crate::service::PermissionService;
use crate::{Error, Result};

impl<S: Backend> PermissionService<S> {
    /// Whether `user_id` holds at least `required` on `resource_id`.
    pub async fn user_has_permission(
        &self,
        namespace_id: &str,
        resource_id: &str,
        user_id: &str,
        required: PermissionLevel,
    ) -> Result<bool> {
        Ok(self
            .gate(namespace_id, resource_id, user_id)
            .await?
            .is_some_and(|level| level.satisfies(required)))
    }

    /// Same as [`user_has_permission`](Self::user_has_permission) with the
    /// configured default level.
    pub async fn user_can_access(
        &self,
        namespace_id: &str,
        resource_id: &str,
        user_id: &str,
    ) -> Result<bool> {
        let required = self.resolution().default_required;
        self.user_has_permission(namespace_id, resource_id, user_id, required)
            .await
    }

    /// Gate check against a pre-loaded leaf-first chain.
    pub async fn user_has_permission_in(
        &self,
        namespace_id: &str,
        chain: &[ResourceNode],
        user_id: &str,
        required: PermissionLevel,
    ) -> Result<bool> {
        if !self.store().is_namespace_member(namespace_id, user_id).await? {
            debug!(namespace_id, user_id, "Not a namespace member");
            return Ok(false);
        }
        let level = self.resolve_chain(namespace_id, chain, user_id).await?;
        Ok(level.satisfies(required))
    }

    /// The resources the user may access at `required`, in input order.
    ///
    /// Ancestors are loaded from the store, so `resources` need not be a
    /// closure. Non-members get an empty list.
    pub async fn filter_by_permission(
        &self,
        user_id: &str,
        namespace_id: &str,
        resources: Vec<ResourceNode>,
        required: PermissionLevel,
    ) -> Result<Vec<ResourceNode>> {
        if !self.store().is_namespace_member(namespace_id, user_id).await? {
            debug!(namespace_id, user_id, "Not a namespace member");
            return Ok(Vec::new());
        }
        let ids: Vec<String> = resources.iter().map(|r| r.id.clone()).collect();
        let levels = self.resolve_all(namespace_id, &ids, user_id).await?;
        Ok(resources
            .into_iter()
            .filter(|r| {
                levels
                    .get(&r.id)
                    .is_some_and(|level| level.satisfies(required))
            })
            .collect())
    }

    /// A [`Permit`] for level `L`, or `Error::Forbidden`.
    pub async fn require<L: Level>(
        &self,
        namespace_id: &str,
        resource_id: &str,
        user_id: &str,
    ) -> Result<Permit<L>> {
        match self.gate(namespace_id, resource_id, user_id).await? {
            Some(level) if level.satisfies(L::LEVEL) => {
                Ok(Permit::new(namespace_id, resource_id, user_id, level))
            }
            _ => Err(Error::Forbidden {
                resource: resource_id.to_string(),
                action: L::LEVEL.to_string(),
            }),
        }
    }

    /// Membership check then resolution. `None` for non-members.
    async fn gate(
        &self,
        namespace_id: &str,
        resource_id: &str,
        user_id: &str,
    ) -> Result<Option<PermissionLevel>> {
        if !self.store().is_namespace_member(namespace_id, user_id).await? {
            debug!(namespace_id, user_id, "Not a namespace member");
            return Ok(None);
        }
        self.resolve(namespace_id, resource_id, user_id)
            .await
            .map(Some)
    }
}
