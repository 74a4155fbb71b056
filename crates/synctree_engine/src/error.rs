//! Error types for change application.

use synctree_model::ModelType;
use synctree_store::{CreateError, LookupError};
use thiserror::Error;

/// Result type for applier operations.
pub type ApplyResult<T> = Result<T, ApplyError>;

/// Errors raised while translating changes between the replicated
/// store and the local model.
///
/// Every variant names the affected model type: failures are per-type,
/// and the caller is expected to stop routing changes for that type
/// rather than retry. The applier reports each error once through the
/// [`UnrecoverableErrorSink`](crate::UnrecoverableErrorSink) before
/// returning it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApplyError {
    /// A node resolution failed.
    #[error("{context} for {model_type}: {source}")]
    Lookup {
        /// The affected model type.
        model_type: ModelType,
        /// What the applier was doing when the lookup failed.
        context: String,
        /// The underlying lookup failure.
        source: LookupError,
    },

    /// A tag-qualified node creation failed.
    #[error("failed to create {model_type} node: {source}")]
    Creation {
        /// The affected model type.
        model_type: ModelType,
        /// The underlying creation failure.
        source: CreateError,
    },

    /// The server has not provisioned the type's top-level node.
    #[error("server did not create the top-level {model_type} node; the server may be out of date")]
    Provisioning {
        /// The affected model type.
        model_type: ModelType,
    },

    /// A caller contract was violated (unset type, empty local tag).
    #[error("invariant violated for {model_type}: {message}")]
    InvariantViolation {
        /// The affected model type.
        model_type: ModelType,
        /// What was violated.
        message: String,
    },

    /// The local observer was torn down while changes were pending.
    #[error("local change observer destroyed with changes pending for {model_type}")]
    ObserverUnavailable {
        /// The affected model type.
        model_type: ModelType,
    },
}

impl ApplyError {
    /// The model type this error applies to.
    #[must_use]
    pub fn model_type(&self) -> ModelType {
        match self {
            ApplyError::Lookup { model_type, .. }
            | ApplyError::Creation { model_type, .. }
            | ApplyError::Provisioning { model_type }
            | ApplyError::InvariantViolation { model_type, .. }
            | ApplyError::ObserverUnavailable { model_type } => *model_type,
        }
    }

    pub(crate) fn lookup(
        model_type: ModelType,
        context: impl Into<String>,
        source: LookupError,
    ) -> Self {
        ApplyError::Lookup { model_type, context: context.into(), source }
    }

    pub(crate) fn invariant(model_type: ModelType, message: impl Into<String>) -> Self {
        ApplyError::InvariantViolation { model_type, message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_names_its_model_type() {
        let errors = [
            ApplyError::lookup(ModelType::Bookmarks, "failed to load entry", LookupError::NotFound),
            ApplyError::Creation { model_type: ModelType::Bookmarks, source: CreateError::EmptyTag },
            ApplyError::Provisioning { model_type: ModelType::Bookmarks },
            ApplyError::invariant(ModelType::Bookmarks, "unset change type"),
            ApplyError::ObserverUnavailable { model_type: ModelType::Bookmarks },
        ];
        for error in errors {
            assert_eq!(error.model_type(), ModelType::Bookmarks);
            assert!(error.to_string().contains("bookmarks"));
        }
    }

    #[test]
    fn lookup_display_includes_cause() {
        let error =
            ApplyError::lookup(ModelType::Passwords, "failed to delete node", LookupError::Deleted);
        let message = error.to_string();
        assert!(message.contains("failed to delete node"));
        assert!(message.contains("entry is already deleted"));
    }
}
