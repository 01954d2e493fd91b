//! The permission service: resolution entry points over a [`Backend`].
//!
//! Authorization checks live in [`crate::gate`], grant changes in
//! [`crate::mutate`] and listings in [`crate::listing`]; all of them are
//! methods on [`PermissionService`].
//!
//! # Consistency
//!
//! Resolution reads the chain, the user's groups and each grant table with
//! separate statements and no enclosing transaction. Under concurrent writes a
//! single resolution can observe grants from two points in time. Hosts that
//! need a stable snapshot must serialize writers around the check.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::{Error, Result};
use crate::config::Resolution;
use crate::model::ResourceNode;
use crate::permission::PermissionLevel;
use crate::provider::Backend;
use crate::resolve::{self, ClosurePolicy, GrantIndex};

/// Resolves effective levels and guards access to resources.
#[derive(Debug, Clone)]
pub struct PermissionService<S> {
    store: S,
    resolution: Resolution,
}

impl<S: Backend> PermissionService<S> {
    pub fn new(store: S) -> Self {
        Self::with_resolution(store, Resolution::default())
    }

    pub fn with_resolution(store: S, resolution: Resolution) -> Self {
        Self { store, resolution }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Load the user's and their groups' grants on `resource_ids`, one query
    /// per scope.
    pub(crate) async fn grant_index(
        &self,
        namespace_id: &str,
        resource_ids: &[String],
        user_id: &str,
    ) -> Result<GrantIndex> {
        let group_ids = self.store.group_ids_for_user(namespace_id, user_id).await?;
        let user_grants = self
            .store
            .user_grants(namespace_id, resource_ids, user_id)
            .await?;
        let group_grants = self
            .store
            .group_grants(namespace_id, resource_ids, &group_ids)
            .await?;
        Ok(GrantIndex::from_grants(user_grants, group_grants))
    }

    /// Effective level of `user_id` on `resource_id`.
    ///
    /// Resources that are missing, soft-deleted, or cut off from the root by a
    /// missing ancestor resolve to `NoAccess`.
    pub async fn resolve(
        &self,
        namespace_id: &str,
        resource_id: &str,
        user_id: &str,
    ) -> Result<PermissionLevel> {
        let chain = self
            .store
            .ancestor_chain(namespace_id, resource_id, self.resolution.max_depth)
            .await?;
        self.resolve_chain(namespace_id, &chain, user_id).await
    }

    /// Effective level for the first node of a pre-loaded leaf-first chain.
    ///
    /// Every node must belong to `namespace_id`, otherwise the call fails
    /// with [`Error::BadRequest`](crate::Error::BadRequest).
    pub async fn resolve_chain(
        &self,
        namespace_id: &str,
        chain: &[ResourceNode],
        user_id: &str,
    ) -> Result<PermissionLevel> {
        same_namespace(namespace_id, chain)?;
        if !resolve::is_rooted(chain) {
            warn!(
                namespace_id,
                resource_id = chain.first().map(|n| n.id.as_str()),
                "Resource unreachable from root"
            );
            return Ok(PermissionLevel::NoAccess);
        }
        let ids: Vec<String> = chain.iter().map(|n| n.id.clone()).collect();
        let index = self.grant_index(namespace_id, &ids, user_id).await?;
        let level = resolve::resolve_chain(chain, &index);
        debug!(namespace_id, resource_id = %ids[0], user_id, %level, "Resolved");
        Ok(level)
    }

    /// Effective levels for every id in `resource_ids`.
    ///
    /// The closure is built from the store, so unreachable resources resolve
    /// to `NoAccess` exactly as [`resolve`](Self::resolve) would.
    pub async fn resolve_all(
        &self,
        namespace_id: &str,
        resource_ids: &[String],
        user_id: &str,
    ) -> Result<HashMap<String, PermissionLevel>> {
        let closure = self.store.closure(namespace_id, resource_ids).await?;
        let policy = ClosurePolicy::deny(self.max_depth());
        self.resolve_in_closure(namespace_id, &closure, resource_ids, user_id, policy)
            .await
    }

    /// Effective levels for every node of a caller-supplied closure.
    ///
    /// Every parent referenced by a node must be in `closure`; a gap is an
    /// [`Error::IncompleteClosure`](crate::Error::IncompleteClosure) rather
    /// than a silently lower level.
    pub async fn resolve_nodes(
        &self,
        namespace_id: &str,
        closure: &[ResourceNode],
        user_id: &str,
    ) -> Result<HashMap<String, PermissionLevel>> {
        same_namespace(namespace_id, closure)?;
        let ids: Vec<String> = closure.iter().map(|n| n.id.clone()).collect();
        let policy = ClosurePolicy::reject(self.max_depth());
        self.resolve_in_closure(namespace_id, closure, &ids, user_id, policy)
            .await
    }

    async fn resolve_in_closure(
        &self,
        namespace_id: &str,
        closure: &[ResourceNode],
        targets: &[String],
        user_id: &str,
        policy: ClosurePolicy,
    ) -> Result<HashMap<String, PermissionLevel>> {
        let ids: Vec<String> = closure.iter().map(|n| n.id.clone()).collect();
        let index = self.grant_index(namespace_id, &ids, user_id).await?;
        let levels =
            resolve::resolve_closure(closure, targets.iter().map(String::as_str), &index, policy)?;
        debug!(
            namespace_id,
            user_id,
            closure = closure.len(),
            targets = targets.len(),
            "Resolved batch"
        );
        Ok(levels)
    }

    fn max_depth(&self) -> usize {
        self.resolution.max_depth as usize
    }
}

fn same_namespace(namespace_id: &str, nodes: &[ResourceNode]) -> Result<()> {
    match nodes.iter().find(|n| n.namespace_id != namespace_id) {
        Some(stray) => Err(Error::BadRequest(format!(
            "resource {} belongs to namespace {}",
            stray.id, stray.namespace_id
        ))),
        None => Ok(()),
    }
}
