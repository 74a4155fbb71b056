//! RAII read and write transactions over the tree.

use crate::crypto::Cryptographer;
use crate::error::{CreateError, LookupError};
use crate::tree::TreeInner;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use synctree_model::{ModelType, ModelTypeSet, NodeId, Specifics};

/// A lazy forward-only walk over a node's live children, in sibling
/// order. Finite, bounded by child count; each walk starts from the
/// first child.
pub struct ChildWalk<'a> {
    inner: &'a TreeInner,
    next: Option<NodeId>,
}

impl Iterator for ChildWalk<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.inner.successor(current);
        Some(current)
    }
}

/// A shared read transaction. Multiple may coexist; none may overlap a
/// write transaction.
pub struct ReadTransaction<'a> {
    inner: RwLockReadGuard<'a, TreeInner>,
}

impl<'a> ReadTransaction<'a> {
    pub(crate) fn new(inner: RwLockReadGuard<'a, TreeInner>) -> Self {
        Self { inner }
    }

    /// Resolves a node by ID, verifying it is live and readable.
    pub fn find_by_id(&self, id: NodeId) -> Result<NodeId, LookupError> {
        self.inner.resolve(id).map(|_| id)
    }

    /// Resolves a node by client tag within a model type.
    pub fn find_by_client_tag(
        &self,
        model_type: ModelType,
        tag: &str,
    ) -> Result<NodeId, LookupError> {
        self.inner.resolve_by_tag(model_type, tag)
    }

    /// Resolves the server-provisioned root for a model type.
    pub fn root(&self, model_type: ModelType) -> Result<NodeId, LookupError> {
        self.inner.root(model_type)
    }

    /// Reads a node's payload.
    pub fn specifics(&self, id: NodeId) -> Result<Specifics, LookupError> {
        self.inner.resolve(id).map(|node| node.specifics.clone())
    }

    /// Reads a node's title.
    pub fn title(&self, id: NodeId) -> Result<String, LookupError> {
        self.inner.resolve(id).map(|node| node.title.clone())
    }

    /// Reads a node's model type.
    pub fn model_type_of(&self, id: NodeId) -> Result<ModelType, LookupError> {
        self.inner.resolve(id).map(|node| node.model_type)
    }

    /// Tag index resolution without liveness or decryption gates.
    pub fn node_id_for_tag(&self, model_type: ModelType, tag: &str) -> Option<NodeId> {
        self.inner.node_id_for_tag(model_type, tag)
    }

    /// A node's payload as stored, bypassing the decryption gate.
    pub fn raw_specifics(&self, id: NodeId) -> Option<Specifics> {
        self.inner.raw_specifics(id).cloned()
    }

    /// The first live child of a node, if any.
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.inner.first_child(id)
    }

    /// The next live sibling of a node, if any.
    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        self.inner.successor(id)
    }

    /// True if the node has at least one live child.
    pub fn has_children(&self, id: NodeId) -> bool {
        self.inner.has_children(id)
    }

    /// Walks a node's live children in sibling order.
    pub fn children(&self, id: NodeId) -> ChildWalk<'_> {
        ChildWalk { inner: &self.inner, next: self.inner.first_child(id) }
    }

    /// The set of model types currently required to be encrypted.
    pub fn encrypted_types(&self) -> ModelTypeSet {
        self.inner.encrypted_types()
    }

    /// The store's cryptographer.
    pub fn cryptographer(&self) -> &Cryptographer {
        self.inner.cryptographer()
    }
}

/// An exclusive write transaction.
///
/// Mutations are applied to the tree in place; each tree operation is
/// atomic, and dropping the guard publishes everything written so far.
pub struct WriteTransaction<'a> {
    inner: RwLockWriteGuard<'a, TreeInner>,
}

impl<'a> WriteTransaction<'a> {
    pub(crate) fn new(inner: RwLockWriteGuard<'a, TreeInner>) -> Self {
        Self { inner }
    }

    /// Resolves a node by ID, verifying it is live and readable.
    pub fn find_by_id(&self, id: NodeId) -> Result<NodeId, LookupError> {
        self.inner.resolve(id).map(|_| id)
    }

    /// Resolves a node by client tag within a model type.
    pub fn find_by_client_tag(
        &self,
        model_type: ModelType,
        tag: &str,
    ) -> Result<NodeId, LookupError> {
        self.inner.resolve_by_tag(model_type, tag)
    }

    /// Resolves the server-provisioned root for a model type.
    pub fn root(&self, model_type: ModelType) -> Result<NodeId, LookupError> {
        self.inner.root(model_type)
    }

    /// Reads a node's payload.
    pub fn specifics(&self, id: NodeId) -> Result<Specifics, LookupError> {
        self.inner.resolve(id).map(|node| node.specifics.clone())
    }

    /// Reads a node's title.
    pub fn title(&self, id: NodeId) -> Result<String, LookupError> {
        self.inner.resolve(id).map(|node| node.title.clone())
    }

    /// Tag index resolution without liveness or decryption gates.
    pub fn node_id_for_tag(&self, model_type: ModelType, tag: &str) -> Option<NodeId> {
        self.inner.node_id_for_tag(model_type, tag)
    }

    /// A node's payload as stored, bypassing the decryption gate.
    pub fn raw_specifics(&self, id: NodeId) -> Option<Specifics> {
        self.inner.raw_specifics(id).cloned()
    }

    /// The first live child of a node, if any.
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.inner.first_child(id)
    }

    /// The next live sibling of a node, if any.
    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        self.inner.successor(id)
    }

    /// True if the node has at least one live child.
    pub fn has_children(&self, id: NodeId) -> bool {
        self.inner.has_children(id)
    }

    /// The set of model types currently required to be encrypted.
    pub fn encrypted_types(&self) -> ModelTypeSet {
        self.inner.encrypted_types()
    }

    /// The store's cryptographer.
    pub fn cryptographer(&self) -> &Cryptographer {
        self.inner.cryptographer()
    }

    /// Creates the root node for a model type if absent, returning it.
    pub fn provision_root(&mut self, model_type: ModelType) -> NodeId {
        self.inner.provision_root(model_type)
    }

    /// Creates a tag-unique node under `parent`, optionally positioned
    /// after `predecessor` (appended last when `None`).
    pub fn create_unique(
        &mut self,
        model_type: ModelType,
        parent: NodeId,
        tag: &str,
        predecessor: Option<NodeId>,
    ) -> Result<NodeId, CreateError> {
        self.inner.create_unique(model_type, parent, tag, predecessor)
    }

    /// Sets a node's title.
    pub fn set_title(&mut self, id: NodeId, title: &str) -> Result<(), LookupError> {
        self.inner.set_title(id, title)
    }

    /// Sets a node's payload.
    pub fn set_specifics(&mut self, id: NodeId, specifics: Specifics) -> Result<(), LookupError> {
        self.inner.set_specifics(id, specifics)
    }

    /// Tombstones a node, unlinking it from siblings and the tag index.
    pub fn remove(&mut self, id: NodeId) -> Result<(), LookupError> {
        self.inner.remove(id)
    }
}
