//! The replicated tree and its single-writer lock.

use crate::crypto::Cryptographer;
use crate::error::{CreateError, LookupError};
use crate::transaction::{ReadTransaction, WriteTransaction};
use parking_lot::RwLock;
use std::collections::HashMap;
use synctree_model::{ModelType, ModelTypeSet, NodeId, Specifics};

/// A node in the tree.
#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) model_type: ModelType,
    pub(crate) parent: Option<NodeId>,
    pub(crate) tag: Option<String>,
    pub(crate) title: String,
    pub(crate) specifics: Specifics,
    pub(crate) deleted: bool,
}

/// Mutable tree state, guarded by the store's lock.
#[derive(Debug, Default)]
pub(crate) struct TreeInner {
    nodes: HashMap<NodeId, NodeData>,
    /// Live children per parent, in sibling order.
    children: HashMap<NodeId, Vec<NodeId>>,
    /// Client tag index over live nodes.
    tags: HashMap<(ModelType, String), NodeId>,
    /// Server-provisioned root per model type.
    roots: HashMap<ModelType, NodeId>,
    next_id: i64,
    encrypted_types: ModelTypeSet,
    cryptographer: Cryptographer,
}

impl TreeInner {
    fn allocate_id(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId::new(self.next_id)
    }

    /// Resolves a node by ID, applying tombstone and decryption gates.
    pub(crate) fn resolve(&self, id: NodeId) -> Result<&NodeData, LookupError> {
        let node = self.nodes.get(&id).ok_or(LookupError::NotFound)?;
        if node.deleted {
            return Err(LookupError::Deleted);
        }
        if let Some(envelope) = &node.specifics.encrypted {
            if !self.cryptographer.can_decrypt(envelope) {
                return Err(LookupError::Undecryptable);
            }
        }
        Ok(node)
    }

    pub(crate) fn resolve_by_tag(
        &self,
        model_type: ModelType,
        tag: &str,
    ) -> Result<NodeId, LookupError> {
        if tag.is_empty() {
            return Err(LookupError::PreconditionFailed);
        }
        let id = *self
            .tags
            .get(&(model_type, tag.to_owned()))
            .ok_or(LookupError::NotFound)?;
        self.resolve(id)?;
        Ok(id)
    }

    pub(crate) fn root(&self, model_type: ModelType) -> Result<NodeId, LookupError> {
        self.roots.get(&model_type).copied().ok_or(LookupError::NotFound)
    }

    /// Tag index resolution without the tombstone/decryption gates.
    pub(crate) fn node_id_for_tag(&self, model_type: ModelType, tag: &str) -> Option<NodeId> {
        self.tags.get(&(model_type, tag.to_owned())).copied()
    }

    /// Specifics as stored, bypassing the decryption gate.
    pub(crate) fn raw_specifics(&self, id: NodeId) -> Option<&Specifics> {
        self.nodes.get(&id).map(|n| &n.specifics)
    }

    pub(crate) fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children.get(&id).and_then(|kids| kids.first().copied())
    }

    pub(crate) fn successor(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get(&id)?.parent?;
        let siblings = self.children.get(&parent)?;
        let position = siblings.iter().position(|&sibling| sibling == id)?;
        siblings.get(position + 1).copied()
    }

    pub(crate) fn has_children(&self, id: NodeId) -> bool {
        self.children.get(&id).is_some_and(|kids| !kids.is_empty())
    }

    pub(crate) fn encrypted_types(&self) -> ModelTypeSet {
        self.encrypted_types
    }

    pub(crate) fn cryptographer(&self) -> &Cryptographer {
        &self.cryptographer
    }

    pub(crate) fn provision_root(&mut self, model_type: ModelType) -> NodeId {
        if let Some(&id) = self.roots.get(&model_type) {
            return id;
        }
        let id = self.allocate_id();
        self.nodes.insert(
            id,
            NodeData {
                model_type,
                parent: None,
                tag: None,
                title: model_type.root_tag().to_owned(),
                specifics: Specifics::default(),
                deleted: false,
            },
        );
        self.children.insert(id, Vec::new());
        self.roots.insert(model_type, id);
        tracing::debug!(%model_type, %id, "provisioned root node");
        id
    }

    pub(crate) fn create_unique(
        &mut self,
        model_type: ModelType,
        parent: NodeId,
        tag: &str,
        predecessor: Option<NodeId>,
    ) -> Result<NodeId, CreateError> {
        if tag.is_empty() {
            return Err(CreateError::EmptyTag);
        }
        if self.tags.contains_key(&(model_type, tag.to_owned())) {
            return Err(CreateError::EntryAlreadyExists);
        }
        match self.nodes.get(&parent) {
            Some(node) if !node.deleted && node.model_type == model_type => {}
            _ => return Err(CreateError::CouldNotCreateEntry),
        }

        let position = match predecessor {
            Some(pred) => {
                let siblings =
                    self.children.get(&parent).ok_or(CreateError::FailedToSetPredecessor)?;
                let pred_position = siblings
                    .iter()
                    .position(|&sibling| sibling == pred)
                    .ok_or(CreateError::FailedToSetPredecessor)?;
                pred_position + 1
            }
            None => self.children.get(&parent).map_or(0, Vec::len),
        };

        let id = self.allocate_id();
        self.nodes.insert(
            id,
            NodeData {
                model_type,
                parent: Some(parent),
                tag: Some(tag.to_owned()),
                title: String::new(),
                specifics: Specifics::default(),
                deleted: false,
            },
        );
        self.children.entry(parent).or_default().insert(position, id);
        self.tags.insert((model_type, tag.to_owned()), id);
        Ok(id)
    }

    pub(crate) fn set_title(&mut self, id: NodeId, title: &str) -> Result<(), LookupError> {
        self.resolve(id)?;
        if let Some(node) = self.nodes.get_mut(&id) {
            node.title = title.to_owned();
        }
        Ok(())
    }

    pub(crate) fn set_specifics(
        &mut self,
        id: NodeId,
        specifics: Specifics,
    ) -> Result<(), LookupError> {
        self.resolve(id)?;
        if let Some(node) = self.nodes.get_mut(&id) {
            node.specifics = specifics;
        }
        Ok(())
    }

    /// Tombstones a node: unlinks it from its sibling chain and tag
    /// index, but keeps the entry so later ID lookups report `Deleted`
    /// rather than `NotFound`.
    pub(crate) fn remove(&mut self, id: NodeId) -> Result<(), LookupError> {
        let node = self.nodes.get(&id).ok_or(LookupError::NotFound)?;
        if node.deleted {
            return Err(LookupError::Deleted);
        }
        let parent = node.parent;
        let tag_key = node.tag.clone().map(|tag| (node.model_type, tag));

        if let Some(parent) = parent {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|&sibling| sibling != id);
            }
        }
        if let Some(key) = tag_key {
            self.tags.remove(&key);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.deleted = true;
        }
        Ok(())
    }

    pub(crate) fn set_encrypted_types(&mut self, types: ModelTypeSet) {
        self.encrypted_types = types;
    }

    pub(crate) fn cryptographer_mut(&mut self) -> &mut Cryptographer {
        &mut self.cryptographer
    }
}

/// The externally-owned hierarchical replicated store.
///
/// Access is transactional: [`TreeStore::read`] returns a shared read
/// transaction, [`TreeStore::write`] an exclusive write transaction.
/// Mutations made through a write transaction are applied in place;
/// dropping the guard makes them visible to subsequent transactions.
#[derive(Debug, Default)]
pub struct TreeStore {
    inner: RwLock<TreeInner>,
}

impl TreeStore {
    /// Creates an empty store with no provisioned roots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a read transaction. Multiple readers may coexist.
    pub fn read(&self) -> ReadTransaction<'_> {
        ReadTransaction::new(self.inner.read())
    }

    /// Opens a write transaction, excluding all other transactions.
    pub fn write(&self) -> WriteTransaction<'_> {
        WriteTransaction::new(self.inner.write())
    }

    /// Replaces the set of model types that must be encrypted.
    pub fn set_encrypted_types(&self, types: ModelTypeSet) {
        self.inner.write().set_encrypted_types(types);
    }

    /// Installs a decryption key by name.
    pub fn install_key(&self, key_name: impl Into<String>) {
        self.inner.write().cryptographer_mut().install_key(key_name);
    }

    /// Removes the installed decryption key.
    pub fn clear_key(&self) {
        self.inner.write().cryptographer_mut().clear_key();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synctree_model::EncryptedPayload;

    #[test]
    fn provision_root_is_idempotent() {
        let store = TreeStore::new();
        let first = store.write().provision_root(ModelType::Bookmarks);
        let second = store.write().provision_root(ModelType::Bookmarks);
        assert_eq!(first, second);
    }

    #[test]
    fn create_and_resolve_by_tag() {
        let store = TreeStore::new();
        let mut txn = store.write();
        let root = txn.provision_root(ModelType::Preferences);
        let id = txn.create_unique(ModelType::Preferences, root, "p1", None).unwrap();
        drop(txn);

        let txn = store.read();
        assert_eq!(txn.find_by_client_tag(ModelType::Preferences, "p1"), Ok(id));
        assert_eq!(
            txn.find_by_client_tag(ModelType::Preferences, ""),
            Err(LookupError::PreconditionFailed)
        );
        assert_eq!(
            txn.find_by_client_tag(ModelType::Preferences, "missing"),
            Err(LookupError::NotFound)
        );
    }

    #[test]
    fn duplicate_tag_is_rejected() {
        let store = TreeStore::new();
        let mut txn = store.write();
        let root = txn.provision_root(ModelType::Autofill);
        txn.create_unique(ModelType::Autofill, root, "a1", None).unwrap();
        assert_eq!(
            txn.create_unique(ModelType::Autofill, root, "a1", None),
            Err(CreateError::EntryAlreadyExists)
        );
    }

    #[test]
    fn create_under_missing_parent_fails() {
        let store = TreeStore::new();
        let mut txn = store.write();
        assert_eq!(
            txn.create_unique(ModelType::Autofill, NodeId::new(999), "a1", None),
            Err(CreateError::CouldNotCreateEntry)
        );
    }

    #[test]
    fn create_with_bad_predecessor_fails() {
        let store = TreeStore::new();
        let mut txn = store.write();
        let root = txn.provision_root(ModelType::Bookmarks);
        assert_eq!(
            txn.create_unique(ModelType::Bookmarks, root, "b1", Some(NodeId::new(999))),
            Err(CreateError::FailedToSetPredecessor)
        );
    }

    #[test]
    fn sibling_order_follows_insertion() {
        let store = TreeStore::new();
        let mut txn = store.write();
        let root = txn.provision_root(ModelType::Bookmarks);
        let a = txn.create_unique(ModelType::Bookmarks, root, "a", None).unwrap();
        let b = txn.create_unique(ModelType::Bookmarks, root, "b", None).unwrap();
        let c = txn.create_unique(ModelType::Bookmarks, root, "c", None).unwrap();

        assert_eq!(txn.first_child(root), Some(a));
        assert_eq!(txn.successor(a), Some(b));
        assert_eq!(txn.successor(b), Some(c));
        assert_eq!(txn.successor(c), None);
    }

    #[test]
    fn predecessor_positions_new_sibling() {
        let store = TreeStore::new();
        let mut txn = store.write();
        let root = txn.provision_root(ModelType::Bookmarks);
        let a = txn.create_unique(ModelType::Bookmarks, root, "a", None).unwrap();
        let c = txn.create_unique(ModelType::Bookmarks, root, "c", None).unwrap();
        let b = txn.create_unique(ModelType::Bookmarks, root, "b", Some(a)).unwrap();

        assert_eq!(txn.successor(a), Some(b));
        assert_eq!(txn.successor(b), Some(c));
    }

    #[test]
    fn removed_node_is_tombstoned() {
        let store = TreeStore::new();
        let mut txn = store.write();
        let root = txn.provision_root(ModelType::Passwords);
        let id = txn.create_unique(ModelType::Passwords, root, "pw", None).unwrap();
        txn.remove(id).unwrap();

        assert_eq!(txn.find_by_id(id), Err(LookupError::Deleted));
        assert_eq!(
            txn.find_by_client_tag(ModelType::Passwords, "pw"),
            Err(LookupError::NotFound)
        );
        assert!(!txn.has_children(root));
        // Tag is free for reuse after the delete.
        txn.create_unique(ModelType::Passwords, root, "pw", None).unwrap();
    }

    #[test]
    fn undecryptable_node_is_gated() {
        let store = TreeStore::new();
        let mut txn = store.write();
        let root = txn.provision_root(ModelType::Passwords);
        let id = txn.create_unique(ModelType::Passwords, root, "pw", None).unwrap();
        txn.set_specifics(id, Specifics::encrypted(EncryptedPayload::new("key-1", vec![7])))
            .unwrap();
        drop(txn);

        assert_eq!(store.read().find_by_id(id), Err(LookupError::Undecryptable));

        store.install_key("key-1");
        assert_eq!(store.read().find_by_id(id), Ok(id));
    }

    #[test]
    fn concurrent_readers_allowed() {
        let store = TreeStore::new();
        let first = store.read();
        let second = store.read();
        assert_eq!(first.root(ModelType::Bookmarks), Err(LookupError::NotFound));
        assert_eq!(second.root(ModelType::Bookmarks), Err(LookupError::NotFound));
    }
}
