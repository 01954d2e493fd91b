//! Interfaces the engine consumes.
//!
//! Resource trees, membership and grant rows are owned by other parts of the
//! system. The engine only needs the calls below; [`crate::store::SqlStore`]
//! provides all of them over libsql.

use std::future::Future;

use crate::Result;
use crate::model::{GroupGrant, GroupRef, ResourceNode, UserGrant, UserRef};
use crate::permission::PermissionLevel;

/// Supplies ancestor chains and closures of a namespace's resource tree.
pub trait AncestorProvider: Send + Sync {
    /// The resource followed by its ancestors, ending at the root.
    ///
    /// If the resource or any ancestor is missing or soft-deleted, the chain
    /// is empty or its last node still has a parent. At most `max_depth`
    /// parent hops are followed, so a deeper or cyclic tree also ends on a
    /// node that has a parent.
    fn ancestor_chain(
        &self,
        namespace_id: &str,
        resource_id: &str,
        max_depth: u32,
    ) -> impl Future<Output = Result<Vec<ResourceNode>>> + Send;

    /// The live resources among `resource_ids` plus all of their live
    /// ancestors, in no particular order.
    fn closure(
        &self,
        namespace_id: &str,
        resource_ids: &[String],
    ) -> impl Future<Output = Result<Vec<ResourceNode>>> + Send;
}

/// Namespace and group membership.
pub trait Directory: Send + Sync {
    /// Whether the user is an active member of the namespace.
    fn is_namespace_member(
        &self,
        namespace_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Ids of the live groups the user belongs to in the namespace.
    fn group_ids_for_user(
        &self,
        namespace_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn find_user(&self, user_id: &str) -> impl Future<Output = Result<Option<UserRef>>> + Send;
}

/// Grant rows and the global level column.
pub trait GrantStore: Send + Sync {
    /// Live grants for one user on any of `resource_ids`, in one round-trip.
    fn user_grants(
        &self,
        namespace_id: &str,
        resource_ids: &[String],
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<UserGrant>>> + Send;

    /// Live grants for any of `group_ids` on any of `resource_ids`, in one
    /// round-trip.
    fn group_grants(
        &self,
        namespace_id: &str,
        resource_ids: &[String],
        group_ids: &[String],
    ) -> impl Future<Output = Result<Vec<GroupGrant>>> + Send;

    /// Live grants for every user on any of `resource_ids`, with the user.
    fn listed_user_grants(
        &self,
        namespace_id: &str,
        resource_ids: &[String],
    ) -> impl Future<Output = Result<Vec<(UserGrant, UserRef)>>> + Send;

    /// Live grants for every group directly on `resource_id`, with the group.
    fn listed_group_grants(
        &self,
        namespace_id: &str,
        resource_id: &str,
    ) -> impl Future<Output = Result<Vec<(GroupGrant, GroupRef)>>> + Send;

    /// Insert the grant, or update the level of the live row with its key.
    fn upsert_user_grant(&self, grant: &UserGrant) -> impl Future<Output = Result<()>> + Send;

    fn upsert_group_grant(&self, grant: &GroupGrant) -> impl Future<Output = Result<()>> + Send;

    /// Hard delete. Returns the number of rows removed.
    fn delete_user_grant(
        &self,
        namespace_id: &str,
        resource_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<u64>> + Send;

    fn delete_group_grant(
        &self,
        namespace_id: &str,
        resource_id: &str,
        group_id: &str,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Replace the global level stored on the resource. Returns the number of
    /// resources updated.
    fn set_global_level(
        &self,
        namespace_id: &str,
        resource_id: &str,
        level: Option<PermissionLevel>,
    ) -> impl Future<Output = Result<u64>> + Send;
}

/// Everything [`crate::PermissionService`] needs from its store.
pub trait Backend: AncestorProvider + Directory + GrantStore {}

impl<T> Backend for T where T: AncestorProvider + Directory + GrantStore {}
