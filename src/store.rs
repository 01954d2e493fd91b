//! libsql implementation of the engine's collaborator interfaces.
//!
//! Id sets travel as a single JSON array parameter expanded with `json_each`,
//! so every batch lookup is one statement regardless of the set size.

use libsql::{Connection, Row, Value, params};
use tracing::{debug, info};

use crate::Result;
use crate::config::Config;
use crate::db;
use crate::model::{GroupGrant, GroupRef, ResourceNode, UserGrant, UserRef};
use crate::permission::PermissionLevel;
use crate::provider::{AncestorProvider, Directory, GrantStore};

const ANCESTOR_CHAIN: &str = r#"
WITH RECURSIVE chain(id, parent_id, global_level, depth) AS (
    SELECT id, parent_id, global_level, 0
      FROM resources
     WHERE namespace_id = ?1 AND id = ?2 AND deleted_at IS NULL
    UNION ALL
    SELECT r.id, r.parent_id, r.global_level, c.depth + 1
      FROM resources r
      JOIN chain c ON r.id = c.parent_id
     WHERE r.namespace_id = ?1 AND r.deleted_at IS NULL AND c.depth < ?3
)
SELECT id, parent_id, global_level FROM chain ORDER BY depth
"#;

const CLOSURE: &str = r#"
WITH RECURSIVE closure(id, parent_id, global_level) AS (
    SELECT id, parent_id, global_level
      FROM resources
     WHERE namespace_id = ?1 AND deleted_at IS NULL
       AND id IN (SELECT value FROM json_each(?2))
    UNION
    SELECT r.id, r.parent_id, r.global_level
      FROM resources r
      JOIN closure c ON r.id = c.parent_id
     WHERE r.namespace_id = ?1 AND r.deleted_at IS NULL
)
SELECT id, parent_id, global_level FROM closure
"#;

const USER_GRANTS: &str = r#"
SELECT resource_id, level
  FROM user_permissions
 WHERE namespace_id = ?1 AND user_id = ?2 AND deleted_at IS NULL
   AND resource_id IN (SELECT value FROM json_each(?3))
"#;

const GROUP_GRANTS: &str = r#"
SELECT resource_id, group_id, level
  FROM group_permissions
 WHERE namespace_id = ?1 AND deleted_at IS NULL
   AND resource_id IN (SELECT value FROM json_each(?2))
   AND group_id IN (SELECT value FROM json_each(?3))
"#;

const LISTED_USER_GRANTS: &str = r#"
SELECT p.resource_id, p.user_id, u.email, p.level
  FROM user_permissions p
  JOIN users u ON u.id = p.user_id
 WHERE p.namespace_id = ?1 AND p.deleted_at IS NULL AND u.deleted_at IS NULL
   AND p.resource_id IN (SELECT value FROM json_each(?2))
"#;

const LISTED_GROUP_GRANTS: &str = r#"
SELECT p.group_id, g.title, p.level
  FROM group_permissions p
  JOIN user_groups g ON g.id = p.group_id
 WHERE p.namespace_id = ?1 AND p.resource_id = ?2
   AND p.deleted_at IS NULL AND g.deleted_at IS NULL
"#;

const UPSERT_USER_GRANT: &str = r#"
INSERT INTO user_permissions (namespace_id, resource_id, user_id, level, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?5)
ON CONFLICT (namespace_id, resource_id, user_id) WHERE deleted_at IS NULL
DO UPDATE SET level = excluded.level, updated_at = excluded.updated_at
"#;

const UPSERT_GROUP_GRANT: &str = r#"
INSERT INTO group_permissions (namespace_id, resource_id, group_id, level, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?5)
ON CONFLICT (namespace_id, resource_id, group_id) WHERE deleted_at IS NULL
DO UPDATE SET level = excluded.level, updated_at = excluded.updated_at
"#;

const DELETE_USER_GRANT: &str = r#"
DELETE FROM user_permissions
 WHERE namespace_id = ?1 AND resource_id = ?2 AND user_id = ?3
"#;

const DELETE_GROUP_GRANT: &str = r#"
DELETE FROM group_permissions
 WHERE namespace_id = ?1 AND resource_id = ?2 AND group_id = ?3
"#;

const SET_GLOBAL_LEVEL: &str = r#"
UPDATE resources SET global_level = ?3
 WHERE namespace_id = ?1 AND id = ?2 AND deleted_at IS NULL
"#;

const IS_MEMBER: &str = r#"
SELECT EXISTS (
    SELECT 1
      FROM namespace_members m
      JOIN namespaces n ON n.id = m.namespace_id
      JOIN users u ON u.id = m.user_id
     WHERE m.namespace_id = ?1 AND m.user_id = ?2
       AND m.deleted_at IS NULL AND n.deleted_at IS NULL AND u.deleted_at IS NULL
)
"#;

const GROUP_IDS_FOR_USER: &str = r#"
SELECT gm.group_id
  FROM group_members gm
  JOIN user_groups g ON g.id = gm.group_id
 WHERE gm.namespace_id = ?1 AND gm.user_id = ?2
   AND gm.deleted_at IS NULL AND g.deleted_at IS NULL
 ORDER BY gm.group_id
"#;

/// Store over a single libsql connection.
#[derive(Clone)]
pub struct SqlStore {
    conn: Connection,
}

impl std::fmt::Debug for SqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlStore").finish_non_exhaustive()
    }
}

impl SqlStore {
    /// Wrap an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Connect to the configured database and migrate it.
    pub async fn open(config: &Config) -> Result<Self> {
        let database = db::connect(&config.database.url).await?;
        let conn = db::connection(&database).await?;
        db::migrate(&conn).await?;
        info!(url = %config.database.url, "Grant store ready");
        Ok(Self::new(conn))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    async fn nodes(
        &self,
        sql: &str,
        namespace_id: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<ResourceNode>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await? {
            nodes.push(node_from_row(namespace_id, &row)?);
        }
        Ok(nodes)
    }
}

fn id_list(ids: &[String]) -> Result<String> {
    Ok(serde_json::to_string(ids)?)
}

fn level_at(row: &Row, idx: i32) -> Result<PermissionLevel> {
    row.get::<String>(idx)?.parse()
}

fn optional_level_at(row: &Row, idx: i32) -> Result<Option<PermissionLevel>> {
    row.get::<Option<String>>(idx)?
        .map(|raw| raw.parse())
        .transpose()
}

fn level_value(level: Option<PermissionLevel>) -> Value {
    match level {
        Some(level) => Value::Text(level.as_str().to_string()),
        None => Value::Null,
    }
}

fn node_from_row(namespace_id: &str, row: &Row) -> Result<ResourceNode> {
    Ok(ResourceNode {
        id: row.get::<String>(0)?,
        namespace_id: namespace_id.to_string(),
        parent_id: row.get::<Option<String>>(1)?,
        global_permission: optional_level_at(row, 2)?,
    })
}

impl AncestorProvider for SqlStore {
    async fn ancestor_chain(
        &self,
        namespace_id: &str,
        resource_id: &str,
        max_depth: u32,
    ) -> Result<Vec<ResourceNode>> {
        let chain = self
            .nodes(
                ANCESTOR_CHAIN,
                namespace_id,
                params![namespace_id, resource_id, i64::from(max_depth)],
            )
            .await?;
        debug!(
            namespace_id,
            resource_id,
            len = chain.len(),
            "Loaded ancestor chain"
        );
        Ok(chain)
    }

    async fn closure(
        &self,
        namespace_id: &str,
        resource_ids: &[String],
    ) -> Result<Vec<ResourceNode>> {
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = id_list(resource_ids)?;
        let nodes = self
            .nodes(CLOSURE, namespace_id, params![namespace_id, ids])
            .await?;
        debug!(
            namespace_id,
            requested = resource_ids.len(),
            len = nodes.len(),
            "Loaded closure"
        );
        Ok(nodes)
    }
}

impl Directory for SqlStore {
    async fn is_namespace_member(&self, namespace_id: &str, user_id: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(IS_MEMBER, params![namespace_id, user_id])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? != 0),
            None => Ok(false),
        }
    }

    async fn group_ids_for_user(&self, namespace_id: &str, user_id: &str) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(GROUP_IDS_FOR_USER, params![namespace_id, user_id])
            .await?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }
        Ok(ids)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserRef>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, email FROM users WHERE id = ?1 AND deleted_at IS NULL",
                params![user_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(UserRef {
                id: row.get::<String>(0)?,
                email: row.get::<String>(1)?,
            })),
            None => Ok(None),
        }
    }
}

impl GrantStore for SqlStore {
    async fn user_grants(
        &self,
        namespace_id: &str,
        resource_ids: &[String],
        user_id: &str,
    ) -> Result<Vec<UserGrant>> {
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = id_list(resource_ids)?;
        let mut rows = self
            .conn
            .query(USER_GRANTS, params![namespace_id, user_id, ids])
            .await?;
        let mut grants = Vec::new();
        while let Some(row) = rows.next().await? {
            grants.push(UserGrant {
                namespace_id: namespace_id.to_string(),
                resource_id: row.get::<String>(0)?,
                user_id: user_id.to_string(),
                level: level_at(&row, 1)?,
            });
        }
        Ok(grants)
    }

    async fn group_grants(
        &self,
        namespace_id: &str,
        resource_ids: &[String],
        group_ids: &[String],
    ) -> Result<Vec<GroupGrant>> {
        if resource_ids.is_empty() || group_ids.is_empty() {
            return Ok(Vec::new());
        }
        let resources = id_list(resource_ids)?;
        let groups = id_list(group_ids)?;
        let mut rows = self
            .conn
            .query(GROUP_GRANTS, params![namespace_id, resources, groups])
            .await?;
        let mut grants = Vec::new();
        while let Some(row) = rows.next().await? {
            grants.push(GroupGrant {
                namespace_id: namespace_id.to_string(),
                resource_id: row.get::<String>(0)?,
                group_id: row.get::<String>(1)?,
                level: level_at(&row, 2)?,
            });
        }
        Ok(grants)
    }

    async fn listed_user_grants(
        &self,
        namespace_id: &str,
        resource_ids: &[String],
    ) -> Result<Vec<(UserGrant, UserRef)>> {
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = id_list(resource_ids)?;
        let mut rows = self
            .conn
            .query(LISTED_USER_GRANTS, params![namespace_id, ids])
            .await?;
        let mut grants = Vec::new();
        while let Some(row) = rows.next().await? {
            let user_id = row.get::<String>(1)?;
            let grant = UserGrant {
                namespace_id: namespace_id.to_string(),
                resource_id: row.get::<String>(0)?,
                user_id: user_id.clone(),
                level: level_at(&row, 3)?,
            };
            let user = UserRef {
                id: user_id,
                email: row.get::<String>(2)?,
            };
            grants.push((grant, user));
        }
        Ok(grants)
    }

    async fn listed_group_grants(
        &self,
        namespace_id: &str,
        resource_id: &str,
    ) -> Result<Vec<(GroupGrant, GroupRef)>> {
        let mut rows = self
            .conn
            .query(LISTED_GROUP_GRANTS, params![namespace_id, resource_id])
            .await?;
        let mut grants = Vec::new();
        while let Some(row) = rows.next().await? {
            let group_id = row.get::<String>(0)?;
            let grant = GroupGrant {
                namespace_id: namespace_id.to_string(),
                resource_id: resource_id.to_string(),
                group_id: group_id.clone(),
                level: level_at(&row, 2)?,
            };
            let group = GroupRef {
                id: group_id,
                title: row.get::<String>(1)?,
            };
            grants.push((grant, group));
        }
        Ok(grants)
    }

    async fn upsert_user_grant(&self, grant: &UserGrant) -> Result<()> {
        self.conn
            .execute(
                UPSERT_USER_GRANT,
                params![
                    grant.namespace_id.as_str(),
                    grant.resource_id.as_str(),
                    grant.user_id.as_str(),
                    grant.level.as_str(),
                    db::now()
                ],
            )
            .await?;
        Ok(())
    }

    async fn upsert_group_grant(&self, grant: &GroupGrant) -> Result<()> {
        self.conn
            .execute(
                UPSERT_GROUP_GRANT,
                params![
                    grant.namespace_id.as_str(),
                    grant.resource_id.as_str(),
                    grant.group_id.as_str(),
                    grant.level.as_str(),
                    db::now()
                ],
            )
            .await?;
        Ok(())
    }

    async fn delete_user_grant(
        &self,
        namespace_id: &str,
        resource_id: &str,
        user_id: &str,
    ) -> Result<u64> {
        let removed = self
            .conn
            .execute(
                DELETE_USER_GRANT,
                params![namespace_id, resource_id, user_id],
            )
            .await?;
        Ok(removed)
    }

    async fn delete_group_grant(
        &self,
        namespace_id: &str,
        resource_id: &str,
        group_id: &str,
    ) -> Result<u64> {
        let removed = self
            .conn
            .execute(
                DELETE_GROUP_GRANT,
                params![namespace_id, resource_id, group_id],
            )
            .await?;
        Ok(removed)
    }

    async fn set_global_level(
        &self,
        namespace_id: &str,
        resource_id: &str,
        level: Option<PermissionLevel>,
    ) -> Result<u64> {
        let updated = self
            .conn
            .execute(
                SET_GLOBAL_LEVEL,
                params![namespace_id, resource_id, level_value(level)],
            )
            .await?;
        Ok(updated)
    }
}
