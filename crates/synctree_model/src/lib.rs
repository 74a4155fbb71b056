//! # Synctree Model
//!
//! Shared model and change types for synctree.
//!
//! This crate provides:
//! - `ModelType` and `ModelTypeSet` for identifying logical collections
//! - `NodeId` for addressing nodes in the replicated tree
//! - `Specifics` payloads, with optional encrypted envelopes
//! - `SyncChange` / `SyncData` for locally observed mutations
//! - `ChangeRecord` for remote-origin change notifications
//!
//! This is a pure types crate with no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod specifics;
mod types;

pub use change::{ChangeAction, ChangeRecord, ChangeType, SyncChange, SyncData};
pub use specifics::{EncryptedPayload, Specifics};
pub use types::{ModelType, ModelTypeSet, NodeId};
