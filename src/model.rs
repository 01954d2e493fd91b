//! Records the engine reads and writes.

use serde::{Deserialize, Serialize};

use crate::permission::PermissionLevel;

/// A node of a namespace's resource tree, as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: String,
    pub namespace_id: String,
    /// `None` only for the namespace root.
    pub parent_id: Option<String>,
    /// Public level set on this node, if any.
    pub global_permission: Option<PermissionLevel>,
}

impl ResourceNode {
    pub fn root(namespace_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            namespace_id: namespace_id.into(),
            parent_id: None,
            global_permission: None,
        }
    }

    pub fn child(
        namespace_id: impl Into<String>,
        id: impl Into<String>,
        parent_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            namespace_id: namespace_id.into(),
            parent_id: Some(parent_id.into()),
            global_permission: None,
        }
    }

    pub fn with_global(mut self, level: PermissionLevel) -> Self {
        self.global_permission = Some(level);
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Explicit level for one user on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGrant {
    pub namespace_id: String,
    pub resource_id: String,
    pub user_id: String,
    pub level: PermissionLevel,
}

/// Explicit level for one group on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupGrant {
    pub namespace_id: String,
    pub resource_id: String,
    pub group_id: String,
    pub level: PermissionLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermission {
    pub user: UserRef,
    pub level: PermissionLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPermission {
    pub group: GroupRef,
    pub level: PermissionLevel,
}

/// Who can do what on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionListing {
    /// Nearest public level on the chain, `NoAccess` if none is set.
    pub global_level: PermissionLevel,
    /// Effective level of the requesting user.
    pub current_level: PermissionLevel,
    /// Requesting user first, then everyone else by email.
    pub users: Vec<UserPermission>,
    pub groups: Vec<GroupPermission>,
}
