//! # Synctree Store
//!
//! In-memory replicated tree store with transactional access.
//!
//! This crate provides:
//! - `TreeStore`, a single-writer/multi-reader hierarchical store
//! - RAII read and write transactions
//! - Node addressing by ID, client tag, and per-type root tag
//! - Sibling-chain walks over a node's children
//! - Tombstoned deletes, so ID lookups can distinguish "never existed"
//!   from "already deleted"
//! - Encryption state (encrypted type set plus cryptographer readiness)
//!
//! ## Transaction discipline
//!
//! Read transactions may run concurrently with each other; a write
//! transaction excludes all other transactions for its duration. Both
//! are lock guards: dropping the guard ends the transaction, so a
//! transaction can never be left open on an early-return path.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod crypto;
mod error;
mod transaction;
mod tree;

pub use crypto::Cryptographer;
pub use error::{CreateError, LookupError};
pub use transaction::{ChildWalk, ReadTransaction, WriteTransaction};
pub use tree::TreeStore;
