//! Grant changes.
//!
//! These calls do not authorize. Callers gate them (usually with
//! [`require`](PermissionService::require) at [`Full`](crate::level::Full))
//! before invoking them.

use tracing::info;

use crate::model::{GroupGrant, UserGrant};
use crate::permission::PermissionLevel;
use crate::provider::Backend;
use crate::service::PermissionService;
use crate::{Error, Result};

impl<S: Backend> PermissionService<S> {
    /// Give `user_id` an explicit level on `resource_id`, replacing any
    /// existing live grant for the same user.
    pub async fn set_user_grant(
        &self,
        namespace_id: &str,
        resource_id: &str,
        user_id: &str,
        level: PermissionLevel,
    ) -> Result<()> {
        let grant = UserGrant {
            namespace_id: namespace_id.to_string(),
            resource_id: resource_id.to_string(),
            user_id: user_id.to_string(),
            level,
        };
        self.store().upsert_user_grant(&grant).await?;
        info!(namespace_id, resource_id, user_id, %level, "User grant set");
        Ok(())
    }

    /// Give `group_id` an explicit level on `resource_id`, replacing any
    /// existing live grant for the same group.
    pub async fn set_group_grant(
        &self,
        namespace_id: &str,
        resource_id: &str,
        group_id: &str,
        level: PermissionLevel,
    ) -> Result<()> {
        let grant = GroupGrant {
            namespace_id: namespace_id.to_string(),
            resource_id: resource_id.to_string(),
            group_id: group_id.to_string(),
            level,
        };
        self.store().upsert_group_grant(&grant).await?;
        info!(namespace_id, resource_id, group_id, %level, "Group grant set");
        Ok(())
    }

    /// Replace the public level on the resource itself. `None` clears it so
    /// the resource inherits again.
    pub async fn set_global_level(
        &self,
        namespace_id: &str,
        resource_id: &str,
        level: Option<PermissionLevel>,
    ) -> Result<()> {
        let updated = self
            .store()
            .set_global_level(namespace_id, resource_id, level)
            .await?;
        if updated == 0 {
            return Err(Error::NotFound(format!("resource {resource_id}")));
        }
        info!(
            namespace_id,
            resource_id,
            level = level.map(PermissionLevel::as_str),
            "Global level set"
        );
        Ok(())
    }

    /// Remove the user's explicit grant. Missing grants are not an error.
    pub async fn delete_user_grant(
        &self,
        namespace_id: &str,
        resource_id: &str,
        user_id: &str,
    ) -> Result<()> {
        let removed = self
            .store()
            .delete_user_grant(namespace_id, resource_id, user_id)
            .await?;
        info!(namespace_id, resource_id, user_id, removed, "User grant deleted");
        Ok(())
    }

    /// Remove the group's explicit grant. Missing grants are not an error.
    pub async fn delete_group_grant(
        &self,
        namespace_id: &str,
        resource_id: &str,
        group_id: &str,
    ) -> Result<()> {
        let removed = self
            .store()
            .delete_group_grant(namespace_id, resource_id, group_id)
            .await?;
        info!(namespace_id, resource_id, group_id, removed, "Group grant deleted");
        Ok(())
    }
}
