//! Per-resource permission listing.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::model::{GroupPermission, PermissionListing, UserPermission};
use crate::permission::PermissionLevel;
use crate::provider::Backend;
use crate::resolve;
use crate::service::PermissionService;
use crate::{Error, Result};

impl<S: Backend> PermissionService<S> {
    /// Who holds what on `resource_id`, as seen by `requesting_user_id`.
    ///
    /// Users are listed with their nearest grant on the resource or an
    /// ancestor; the requesting user always comes first, even without a
    /// grant, and everyone else follows by email. Groups are listed with
    /// their grants on the resource itself, by title.
    pub async fn list_permissions(
        &self,
        namespace_id: &str,
        resource_id: &str,
        requesting_user_id: &str,
    ) -> Result<PermissionListing> {
        let chain = self
            .store()
            .ancestor_chain(namespace_id, resource_id, self.resolution().max_depth)
            .await?;
        if !resolve::is_rooted(&chain) {
            return Err(Error::NotFound(format!("resource {resource_id}")));
        }
        let requester = self
            .store()
            .find_user(requesting_user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {requesting_user_id}")))?;

        let ids: Vec<String> = chain.iter().map(|n| n.id.clone()).collect();
        let depth_of: HashMap<&str, usize> = chain
            .iter()
            .enumerate()
            .map(|(depth, node)| (node.id.as_str(), depth))
            .collect();

        let mut nearest: HashMap<String, (usize, UserPermission)> = HashMap::new();
        for (grant, user) in self.store().listed_user_grants(namespace_id, &ids).await? {
            let Some(&depth) = depth_of.get(grant.resource_id.as_str()) else {
                continue;
            };
            let entry = UserPermission {
                user,
                level: grant.level,
            };
            match nearest.entry(grant.user_id) {
                Entry::Vacant(slot) => {
                    slot.insert((depth, entry));
                }
                Entry::Occupied(mut slot) => {
                    if depth < slot.get().0 {
                        slot.insert((depth, entry));
                    }
                }
            }
        }

        let own_level = nearest
            .remove(&requester.id)
            .map(|(_, permission)| permission.level)
            .unwrap_or(PermissionLevel::NoAccess);
        let mut others: Vec<UserPermission> =
            nearest.into_values().map(|(_, permission)| permission).collect();
        others.sort_by(|a, b| a.user.email.cmp(&b.user.email));

        let mut users = Vec::with_capacity(others.len() + 1);
        users.push(UserPermission {
            user: requester,
            level: own_level,
        });
        users.extend(others);

        let mut groups: Vec<GroupPermission> = self
            .store()
            .listed_group_grants(namespace_id, resource_id)
            .await?
            .into_iter()
            .map(|(grant, group)| GroupPermission {
                group,
                level: grant.level,
            })
            .collect();
        groups.sort_by(|a, b| a.group.title.cmp(&b.group.title));

        let current_level = self
            .resolve_chain(namespace_id, &chain, requesting_user_id)
            .await?;

        Ok(PermissionListing {
            global_level: resolve::nearest_global(&chain).unwrap_or(PermissionLevel::NoAccess),
            current_level,
            users,
            groups,
        })
    }
}
