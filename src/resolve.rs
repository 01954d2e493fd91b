//! Effective level computation over ancestor chains and closures.
//!
//! Every scope (global, the user, each of the user's groups) inherits
//! independently: the nearest node carrying a value for that scope decides the
//! scope's contribution. The effective level is the max across scopes, so an
//! explicit lower grant in one scope never reduces what another scope gives.
//!
//! The single-chain and closure forms share [`Scopes`] and must agree for
//! every resource of a valid closure.

use std::collections::HashMap;

use tracing::warn;

use crate::error::{Error, Result};
use crate::model::{GroupGrant, ResourceNode, UserGrant};
use crate::permission::{PermissionLevel, max_all, max_of};

/// Grants relevant to one user, keyed by resource id.
///
/// Holds the user's own grants and the grants of the groups the user belongs
/// to. Grants for other principals must not be inserted.
#[derive(Debug, Clone, Default)]
pub struct GrantIndex {
    user: HashMap<String, PermissionLevel>,
    groups: HashMap<String, HashMap<String, PermissionLevel>>,
}

impl GrantIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_grants<U, G>(user_grants: U, group_grants: G) -> Self
    where
        U: IntoIterator<Item = UserGrant>,
        G: IntoIterator<Item = GroupGrant>,
    {
        let mut index = Self::new();
        for grant in user_grants {
            index.insert_user(grant.resource_id, grant.level);
        }
        for grant in group_grants {
            index.insert_group(grant.resource_id, grant.group_id, grant.level);
        }
        index
    }

    pub fn insert_user(&mut self, resource_id: impl Into<String>, level: PermissionLevel) {
        let slot = self.user.entry(resource_id.into()).or_insert(level);
        *slot = max_of(Some(*slot), Some(level)).unwrap_or(level);
    }

    pub fn insert_group(
        &mut self,
        resource_id: impl Into<String>,
        group_id: impl Into<String>,
        level: PermissionLevel,
    ) {
        let slot = self
            .groups
            .entry(resource_id.into())
            .or_default()
            .entry(group_id.into())
            .or_insert(level);
        *slot = max_of(Some(*slot), Some(level)).unwrap_or(level);
    }
}

/// Per-scope values found so far while walking nearest-first.
#[derive(Debug, Default)]
struct Scopes<'a> {
    global: Option<PermissionLevel>,
    user: Option<PermissionLevel>,
    groups: HashMap<&'a str, PermissionLevel>,
}

impl<'a> Scopes<'a> {
    /// Fill every scope still empty from `node`.
    fn absorb(&mut self, node: &ResourceNode, index: &'a GrantIndex) {
        if self.global.is_none() {
            self.global = node.global_permission;
        }
        if self.user.is_none() {
            self.user = index.user.get(&node.id).copied();
        }
        if let Some(grants) = index.groups.get(&node.id) {
            for (group_id, level) in grants {
                self.groups.entry(group_id.as_str()).or_insert(*level);
            }
        }
    }

    fn effective(&self) -> PermissionLevel {
        let groups = self.groups.values().copied().map(Some);
        max_all([self.global, self.user].into_iter().chain(groups))
            .unwrap_or(PermissionLevel::NoAccess)
    }
}

/// Whether a leaf-first chain ends at a namespace root.
pub fn is_rooted(chain: &[ResourceNode]) -> bool {
    chain.last().is_some_and(ResourceNode::is_root)
}

/// Nearest public level on a leaf-first chain.
pub fn nearest_global(chain: &[ResourceNode]) -> Option<PermissionLevel> {
    chain.iter().find_map(|node| node.global_permission)
}

/// Effective level for the first node of a leaf-first chain.
///
/// A chain that does not end at the root resolves to `NoAccess` without
/// consulting any grant.
pub fn resolve_chain(chain: &[ResourceNode], index: &GrantIndex) -> PermissionLevel {
    if !is_rooted(chain) {
        return PermissionLevel::NoAccess;
    }
    let mut scopes = Scopes::default();
    for node in chain {
        scopes.absorb(node, index);
    }
    scopes.effective()
}

/// What to do when a closure walk cannot reach the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingAncestor {
    /// Resolve to `NoAccess`, as the single-chain form does.
    Deny,
    /// Fail with an error naming the gap.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosurePolicy {
    pub on_missing: MissingAncestor,
    /// Longest parent walk, in edges, before giving up.
    pub max_depth: usize,
}

impl ClosurePolicy {
    pub fn deny(max_depth: usize) -> Self {
        Self {
            on_missing: MissingAncestor::Deny,
            max_depth,
        }
    }

    pub fn reject(max_depth: usize) -> Self {
        Self {
            on_missing: MissingAncestor::Reject,
            max_depth,
        }
    }
}

enum Walk {
    Rooted(PermissionLevel),
    Unknown,
    Broken { resource_id: String, parent_id: String },
    TooDeep,
}

fn walk<'a>(
    by_id: &HashMap<&str, &ResourceNode>,
    target: &str,
    index: &'a GrantIndex,
    max_depth: usize,
) -> Walk {
    let Some(mut node) = by_id.get(target).copied() else {
        return Walk::Unknown;
    };
    let mut scopes: Scopes<'a> = Scopes::default();
    let limit = max_depth.saturating_add(1).min(by_id.len());
    for _ in 0..limit {
        scopes.absorb(node, index);
        match node.parent_id.as_deref() {
            None => return Walk::Rooted(scopes.effective()),
            Some(parent_id) => match by_id.get(parent_id) {
                Some(parent) => node = parent,
                None => {
                    return Walk::Broken {
                        resource_id: node.id.clone(),
                        parent_id: parent_id.to_string(),
                    };
                }
            },
        }
    }
    Walk::TooDeep
}

/// Effective levels for `targets`, walking parent pointers through `nodes`.
///
/// `nodes` is expected to be a closure: every ancestor of every target up to
/// the root. Grant lookups happen against `index` only, so callers load each
/// grant table once for the whole set.
pub fn resolve_closure<'t, T>(
    nodes: &[ResourceNode],
    targets: T,
    index: &GrantIndex,
    policy: ClosurePolicy,
) -> Result<HashMap<String, PermissionLevel>>
where
    T: IntoIterator<Item = &'t str>,
{
    let by_id: HashMap<&str, &ResourceNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let reject = policy.on_missing == MissingAncestor::Reject;

    let mut levels = HashMap::new();
    for target in targets {
        let level = match walk(&by_id, target, index, policy.max_depth) {
            Walk::Rooted(level) => level,
            Walk::Unknown if reject => {
                return Err(Error::NotFound(format!("resource {target} is not in the closure")));
            }
            Walk::Broken {
                resource_id,
                parent_id,
            } if reject => {
                warn!(%resource_id, %parent_id, "Rejecting incomplete closure");
                return Err(Error::IncompleteClosure {
                    resource_id,
                    parent_id,
                });
            }
            Walk::TooDeep if reject => {
                return Err(Error::BadRequest(format!(
                    "resource {target} does not reach a root within {} levels",
                    policy.max_depth
                )));
            }
            Walk::Unknown | Walk::Broken { .. } | Walk::TooDeep => PermissionLevel::NoAccess,
        };
        levels.insert(target.to_string(), level);
    }
    Ok(levels)
}
