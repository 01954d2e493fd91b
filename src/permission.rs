//! Permission levels and the lattice they form.
//!
//! [`PermissionLevel`] is the runtime value stored on grants and resources.
//! Ordering comes from explicit ranks, so reordering the variants can never
//! change how levels compare.
//!
//! The [`Level`] trait and the marker types in [`level`] lift a level into the
//! type system. A [`Permit<L>`] can only be obtained by passing a gate check at
//! level `L`, which lets callers demand proof of access in their signatures.
//!
//! # Example
//!
//! ```ignore
//! use grantree::level::Edit;
//!
//! let permit = service.require::<Edit>(&ns, &doc, &user).await?;
//! documents::update(&conn, permit, body).await?;
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Access level a principal holds on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    NoAccess,
    CanView,
    CanComment,
    CanEdit,
    FullAccess,
}

impl PermissionLevel {
    /// Every level, ascending.
    pub const ALL: [PermissionLevel; 5] = [
        PermissionLevel::NoAccess,
        PermissionLevel::CanView,
        PermissionLevel::CanComment,
        PermissionLevel::CanEdit,
        PermissionLevel::FullAccess,
    ];

    /// Position in the lattice. Higher rank = more permissive.
    pub const fn rank(self) -> u8 {
        match self {
            PermissionLevel::NoAccess => 0,
            PermissionLevel::CanView => 10,
            PermissionLevel::CanComment => 20,
            PermissionLevel::CanEdit => 30,
            PermissionLevel::FullAccess => 40,
        }
    }

    /// Storage and wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            PermissionLevel::NoAccess => "no_access",
            PermissionLevel::CanView => "can_view",
            PermissionLevel::CanComment => "can_comment",
            PermissionLevel::CanEdit => "can_edit",
            PermissionLevel::FullAccess => "full_access",
        }
    }

    /// Whether this level meets `required`.
    pub fn satisfies(self, required: PermissionLevel) -> bool {
        compare(self, required) != Ordering::Less
    }
}

impl Ord for PermissionLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for PermissionLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PermissionLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| Error::InvalidLevel(s.to_string()))
    }
}

/// Compare two levels by rank.
pub fn compare(a: PermissionLevel, b: PermissionLevel) -> Ordering {
    a.rank().cmp(&b.rank())
}

/// The more permissive of two optional levels. An absent level never wins.
pub fn max_of(a: Option<PermissionLevel>, b: Option<PermissionLevel>) -> Option<PermissionLevel> {
    match (a, b) {
        (None, other) | (other, None) => other,
        (Some(a), Some(b)) => Some(if compare(a, b) == Ordering::Less { b } else { a }),
    }
}

/// Left fold of [`max_of`] starting from `None`.
pub fn max_all<I>(levels: I) -> Option<PermissionLevel>
where
    I: IntoIterator<Item = Option<PermissionLevel>>,
{
    levels.into_iter().fold(None, max_of)
}

/// Marker trait for compile-time permission levels.
pub trait Level: Clone + Copy + PartialEq + Eq + fmt::Debug + Send + Sync + 'static {
    /// The runtime level this marker stands for.
    const LEVEL: PermissionLevel;
}

/// Typed levels usable with [`Permit`].
pub mod level {
    use super::{Level, PermissionLevel};

    /// Read-only access.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct View;

    impl Level for View {
        const LEVEL: PermissionLevel = PermissionLevel::CanView;
    }

    /// View plus commenting.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Comment;

    impl Level for Comment {
        const LEVEL: PermissionLevel = PermissionLevel::CanComment;
    }

    /// Content editing.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Edit;

    impl Level for Edit {
        const LEVEL: PermissionLevel = PermissionLevel::CanEdit;
    }

    /// Everything, including permission management.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Full;

    impl Level for Full {
        const LEVEL: PermissionLevel = PermissionLevel::FullAccess;
    }
}

/// Proof that a user passed the authorization gate at level `L`.
///
/// Only the gate constructs permits.
#[derive(Debug, Clone)]
pub struct Permit<L: Level> {
    namespace_id: String,
    resource_id: String,
    user_id: String,
    effective: PermissionLevel,
    _level: PhantomData<L>,
}

impl<L: Level> Permit<L> {
    pub(crate) fn new(
        namespace_id: &str,
        resource_id: &str,
        user_id: &str,
        effective: PermissionLevel,
    ) -> Self {
        Self {
            namespace_id: namespace_id.to_string(),
            resource_id: resource_id.to_string(),
            user_id: user_id.to_string(),
            effective,
            _level: PhantomData,
        }
    }

    pub fn namespace_id(&self) -> &str {
        &self.namespace_id
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The level the user actually holds, at least `L::LEVEL`.
    pub fn effective(&self) -> PermissionLevel {
        self.effective
    }
}
