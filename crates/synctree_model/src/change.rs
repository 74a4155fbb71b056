//! Change intents and remote change records.

use crate::specifics::Specifics;
use crate::types::{ModelType, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of mutation a [`SyncChange`] expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    /// Create a new entry.
    Add,
    /// Overwrite an existing entry.
    Update,
    /// Remove an existing entry.
    Delete,
}

/// The payload of a change, qualified by where it originated.
///
/// Local data is addressed by client tag; remote data is addressed by
/// the store-assigned node ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncData {
    /// Data originating from the local model.
    Local {
        /// Client-unique key within the model type. Must be non-empty.
        tag: String,
        /// Display title for the node.
        title: String,
        /// Opaque payload.
        specifics: Specifics,
        /// The logical collection this belongs to.
        model_type: ModelType,
    },
    /// Data originating from the replicated store.
    Remote {
        /// Store-assigned node ID.
        id: NodeId,
        /// Opaque payload.
        specifics: Specifics,
        /// The logical collection this belongs to.
        model_type: ModelType,
    },
}

impl SyncData {
    /// Creates local-origin data.
    pub fn local(
        model_type: ModelType,
        tag: impl Into<String>,
        title: impl Into<String>,
        specifics: Specifics,
    ) -> Self {
        SyncData::Local { tag: tag.into(), title: title.into(), specifics, model_type }
    }

    /// Creates remote-origin data.
    #[must_use]
    pub fn remote(model_type: ModelType, id: NodeId, specifics: Specifics) -> Self {
        SyncData::Remote { id, specifics, model_type }
    }

    /// Returns true for local-origin data.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, SyncData::Local { .. })
    }

    /// The model type of this data.
    #[must_use]
    pub fn model_type(&self) -> ModelType {
        match self {
            SyncData::Local { model_type, .. } | SyncData::Remote { model_type, .. } => *model_type,
        }
    }

    /// The client tag, empty for remote-origin data.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            SyncData::Local { tag, .. } => tag,
            SyncData::Remote { .. } => "",
        }
    }

    /// The display title, empty for remote-origin data.
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            SyncData::Local { title, .. } => title,
            SyncData::Remote { .. } => "",
        }
    }

    /// The node ID, present only for remote-origin data.
    #[must_use]
    pub fn remote_id(&self) -> Option<NodeId> {
        match self {
            SyncData::Local { .. } => None,
            SyncData::Remote { id, .. } => Some(*id),
        }
    }

    /// The opaque payload.
    #[must_use]
    pub fn specifics(&self) -> &Specifics {
        match self {
            SyncData::Local { specifics, .. } | SyncData::Remote { specifics, .. } => specifics,
        }
    }
}

/// A single mutation intent, immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncChange {
    /// Kind of mutation.
    pub change_type: ChangeType,
    /// Payload and addressing for the mutation.
    pub data: SyncData,
}

impl SyncChange {
    /// Creates a new change.
    #[must_use]
    pub fn new(change_type: ChangeType, data: SyncData) -> Self {
        Self { change_type, data }
    }

    /// The model type the change applies to.
    #[must_use]
    pub fn model_type(&self) -> ModelType {
        self.data.model_type()
    }
}

impl fmt::Display for SyncChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} change for {}", self.change_type, self.model_type())
    }
}

/// The action carried by a remote [`ChangeRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeAction {
    /// A node was created.
    Add,
    /// A node was updated.
    Update,
    /// A node was deleted.
    Delete,
}

/// A remote-origin change notification from the replicated store.
///
/// `specifics` is absent for deletes; deleted nodes may no longer be
/// readable, so the applier synthesizes the delete from the ID alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// The affected node.
    pub id: NodeId,
    /// What happened to it.
    pub action: ChangeAction,
    /// The logical collection the node belongs to.
    pub model_type: ModelType,
    /// Payload at notification time, absent for deletes.
    pub specifics: Option<Specifics>,
}

impl ChangeRecord {
    /// Creates an add record.
    #[must_use]
    pub fn add(id: NodeId, model_type: ModelType, specifics: Specifics) -> Self {
        Self { id, action: ChangeAction::Add, model_type, specifics: Some(specifics) }
    }

    /// Creates an update record.
    #[must_use]
    pub fn update(id: NodeId, model_type: ModelType, specifics: Specifics) -> Self {
        Self { id, action: ChangeAction::Update, model_type, specifics: Some(specifics) }
    }

    /// Creates a delete record.
    #[must_use]
    pub fn delete(id: NodeId, model_type: ModelType) -> Self {
        Self { id, action: ChangeAction::Delete, model_type, specifics: None }
    }
}
