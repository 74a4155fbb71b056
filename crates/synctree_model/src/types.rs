//! Core identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies which logical collection a change or node belongs to.
///
/// Every non-root node in the replicated tree belongs to exactly one
/// model type. `Unspecified` is never valid on a change handed to the
/// applier; it exists so malformed input can be detected and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    /// No type set. Invalid on any real change.
    Unspecified,
    /// Bookmark-like hierarchical user data.
    Bookmarks,
    /// User preference entries.
    Preferences,
    /// Saved credentials.
    Passwords,
    /// Form autofill entries.
    Autofill,
    /// Theme selection.
    Themes,
    /// Installed extensions.
    Extensions,
}

impl ModelType {
    /// All concrete model types (excludes `Unspecified`).
    pub const ALL: [ModelType; 6] = [
        ModelType::Bookmarks,
        ModelType::Preferences,
        ModelType::Passwords,
        ModelType::Autofill,
        ModelType::Themes,
        ModelType::Extensions,
    ];

    /// The well-known tag of this type's server-provisioned root node.
    #[must_use]
    pub fn root_tag(self) -> &'static str {
        match self {
            ModelType::Unspecified => "",
            ModelType::Bookmarks => "top_level_bookmarks",
            ModelType::Preferences => "top_level_preferences",
            ModelType::Passwords => "top_level_passwords",
            ModelType::Autofill => "top_level_autofill",
            ModelType::Themes => "top_level_themes",
            ModelType::Extensions => "top_level_extensions",
        }
    }

    /// Bit position used by [`ModelTypeSet`].
    fn bit(self) -> u32 {
        match self {
            ModelType::Unspecified => 0,
            ModelType::Bookmarks => 1,
            ModelType::Preferences => 2,
            ModelType::Passwords => 3,
            ModelType::Autofill => 4,
            ModelType::Themes => 5,
            ModelType::Extensions => 6,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelType::Unspecified => "unspecified",
            ModelType::Bookmarks => "bookmarks",
            ModelType::Preferences => "preferences",
            ModelType::Passwords => "passwords",
            ModelType::Autofill => "autofill",
            ModelType::Themes => "themes",
            ModelType::Extensions => "extensions",
        };
        f.write_str(name)
    }
}

/// A copyable set of model types, backed by a bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTypeSet(u32);

impl ModelTypeSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns true if the set contains no types.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if `model_type` is in the set.
    #[must_use]
    pub fn contains(self, model_type: ModelType) -> bool {
        self.0 & (1 << model_type.bit()) != 0
    }

    /// Adds a type to the set. `Unspecified` is not a real collection
    /// and is ignored.
    pub fn insert(&mut self, model_type: ModelType) {
        if model_type == ModelType::Unspecified {
            return;
        }
        self.0 |= 1 << model_type.bit();
    }

    /// Removes a type from the set.
    pub fn remove(&mut self, model_type: ModelType) {
        self.0 &= !(1 << model_type.bit());
    }

    /// Iterates over the concrete types in the set.
    pub fn iter(self) -> impl Iterator<Item = ModelType> {
        ModelType::ALL.into_iter().filter(move |t| self.contains(*t))
    }
}

impl FromIterator<ModelType> for ModelTypeSet {
    fn from_iter<I: IntoIterator<Item = ModelType>>(iter: I) -> Self {
        let mut set = Self::empty();
        for model_type in iter {
            set.insert(model_type);
        }
        set
    }
}

/// Stable unique identifier of a node in the replicated tree.
///
/// Node IDs are assigned by the store, are never reused, and remain
/// valid across the node's lifetime (including its tombstone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub i64);

impl NodeId {
    /// Creates a new node ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}
