//! Error types for store lookups and node creation.

use thiserror::Error;

/// Reasons a node resolution can fail.
///
/// Every lookup path (by ID, by client tag, by root tag) reports one of
/// these. Callers branch on the variant to produce per-failure
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LookupError {
    /// No entry matched the lookup criteria.
    #[error("could not find entry matching the lookup criteria")]
    NotFound,

    /// The entry exists but has been deleted (tombstoned).
    #[error("entry is already deleted")]
    Deleted,

    /// The entry's payload is encrypted and the current key cannot
    /// decrypt it.
    #[error("unable to decrypt entry")]
    Undecryptable,

    /// A precondition for the lookup was not met (e.g. empty tag).
    #[error("a lookup precondition was not met")]
    PreconditionFailed,
}

/// Reasons a tag-qualified node creation can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CreateError {
    /// The client tag was empty.
    #[error("empty tag")]
    EmptyTag,

    /// A live node already owns this tag within the model type.
    #[error("entry already exists")]
    EntryAlreadyExists,

    /// The parent was missing, deleted, or of the wrong model type.
    #[error("failed to create entry")]
    CouldNotCreateEntry,

    /// The requested predecessor is not a live child of the parent.
    #[error("failed to set predecessor")]
    FailedToSetPredecessor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_error_messages_are_distinct() {
        let all = [
            LookupError::NotFound,
            LookupError::Deleted,
            LookupError::Undecryptable,
            LookupError::PreconditionFailed,
        ];
        let mut messages: Vec<String> = all.iter().map(|e| e.to_string()).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), all.len());
    }

    #[test]
    fn create_error_messages_are_distinct() {
        let all = [
            CreateError::EmptyTag,
            CreateError::EntryAlreadyExists,
            CreateError::CouldNotCreateEntry,
            CreateError::FailedToSetPredecessor,
        ];
        let mut messages: Vec<String> = all.iter().map(|e| e.to_string()).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), all.len());
    }
}
