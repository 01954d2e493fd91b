//! Database connection and schema.
//!
//! Supports multiple backends:
//! - Local SQLite file: `path/to/db.sqlite` or `file:path` or `sqlite://path`
//! - In-memory: `:memory:`
//! - Remote Turso: `libsql://...` or `https://...` (requires TURSO_AUTH_TOKEN env var)
//!
//! The schema covers the grant tables the engine owns plus the tables it reads
//! from its collaborators (users, namespaces, membership, groups, resources).

use libsql::{Builder, Connection, Database};
use tracing::debug;

/// Tables and indexes, idempotent.
///
/// Grant keys are unique among live rows only, so a soft-deleted grant never
/// blocks a new one for the same principal.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    deleted_at TEXT
);

CREATE TABLE IF NOT EXISTS namespaces (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    deleted_at TEXT
);

CREATE TABLE IF NOT EXISTS namespace_members (
    namespace_id TEXT NOT NULL REFERENCES namespaces(id),
    user_id TEXT NOT NULL REFERENCES users(id),
    deleted_at TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS namespace_members_key
    ON namespace_members (namespace_id, user_id) WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS user_groups (
    id TEXT PRIMARY KEY,
    namespace_id TEXT NOT NULL REFERENCES namespaces(id),
    title TEXT NOT NULL,
    deleted_at TEXT
);

CREATE TABLE IF NOT EXISTS group_members (
    namespace_id TEXT NOT NULL REFERENCES namespaces(id),
    group_id TEXT NOT NULL REFERENCES user_groups(id),
    user_id TEXT NOT NULL REFERENCES users(id),
    deleted_at TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS group_members_key
    ON group_members (namespace_id, group_id, user_id) WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS resources (
    id TEXT PRIMARY KEY,
    namespace_id TEXT NOT NULL REFERENCES namespaces(id),
    parent_id TEXT,
    global_level TEXT CHECK (global_level IN ('no_access', 'can_view', 'can_comment', 'can_edit', 'full_access')),
    deleted_at TEXT
);
CREATE INDEX IF NOT EXISTS resources_parent ON resources (namespace_id, parent_id);

CREATE TABLE IF NOT EXISTS user_permissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace_id TEXT NOT NULL REFERENCES namespaces(id),
    resource_id TEXT NOT NULL REFERENCES resources(id),
    user_id TEXT NOT NULL REFERENCES users(id),
    level TEXT NOT NULL CHECK (level IN ('no_access', 'can_view', 'can_comment', 'can_edit', 'full_access')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS user_permissions_key
    ON user_permissions (namespace_id, resource_id, user_id) WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS group_permissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    namespace_id TEXT NOT NULL REFERENCES namespaces(id),
    resource_id TEXT NOT NULL REFERENCES resources(id),
    group_id TEXT NOT NULL REFERENCES user_groups(id),
    level TEXT NOT NULL CHECK (level IN ('no_access', 'can_view', 'can_comment', 'can_edit', 'full_access')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS group_permissions_key
    ON group_permissions (namespace_id, resource_id, group_id) WHERE deleted_at IS NULL;
"#;

/// Connect to the database.
///
/// # URL formats
/// - Local file: `mydata.db`, `file:path/to/db.sqlite`, `sqlite://path`
/// - In-memory: `:memory:`
/// - Remote Turso: `libsql://your-db.turso.io` (requires `TURSO_AUTH_TOKEN` env var)
pub async fn connect(url: &str) -> crate::Result<Database> {
    let db = if url.starts_with("libsql://") || url.starts_with("https://") {
        let token = std::env::var("TURSO_AUTH_TOKEN").map_err(|_| {
            crate::Error::Config("TURSO_AUTH_TOKEN not set for remote database".into())
        })?;
        Builder::new_remote(url.to_string(), token).build().await?
    } else if url == ":memory:" {
        Builder::new_local(":memory:").build().await?
    } else {
        // Local file - strip sqlite:// or file: prefix if present
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("file:"))
            .unwrap_or(url);
        Builder::new_local(path).build().await?
    };

    Ok(db)
}

/// Get a connection with foreign keys enforced.
///
/// In-memory databases are private to one connection, so keep the returned
/// connection for the lifetime of the store.
pub async fn connection(db: &Database) -> crate::Result<Connection> {
    let conn = db.connect()?;
    conn.execute("PRAGMA foreign_keys = ON", ()).await?;
    Ok(conn)
}

/// Create every table and index the engine touches.
pub async fn migrate(conn: &Connection) -> crate::Result<()> {
    conn.execute_batch(SCHEMA).await?;
    debug!("Schema migrated");
    Ok(())
}

/// Current time in the format stored in timestamp columns.
pub(crate) fn now() -> String {
    jiff::Timestamp::now().to_string()
}

// Re-exported for hosts seeding their own rows
pub use libsql::params;
