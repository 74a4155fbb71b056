//! Opaque node payloads.

use serde::{Deserialize, Serialize};

/// An encrypted payload envelope.
///
/// The store does not interpret the ciphertext; it only checks whether
/// the current cryptographer holds the key named here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Name of the key that produced the ciphertext.
    pub key_name: String,
    /// Opaque ciphertext bytes.
    pub blob: Vec<u8>,
}

impl EncryptedPayload {
    /// Creates an encrypted envelope.
    pub fn new(key_name: impl Into<String>, blob: Vec<u8>) -> Self {
        Self { key_name: key_name.into(), blob }
    }
}

/// The opaque structured payload carried by a node or a change.
///
/// The applier and store treat `data` as a black box. When `encrypted`
/// is present, reading the node requires the cryptographer to hold the
/// matching key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specifics {
    /// Opaque payload bytes.
    pub data: Vec<u8>,
    /// Optional encrypted envelope; present only for encrypted entries.
    pub encrypted: Option<EncryptedPayload>,
}

impl Specifics {
    /// Creates a plaintext payload.
    #[must_use]
    pub fn plaintext(data: Vec<u8>) -> Self {
        Self { data, encrypted: None }
    }

    /// Creates an encrypted payload.
    #[must_use]
    pub fn encrypted(envelope: EncryptedPayload) -> Self {
        Self { data: Vec::new(), encrypted: Some(envelope) }
    }

    /// Returns true if this payload carries an encrypted envelope.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.encrypted.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_is_not_encrypted() {
        let specifics = Specifics::plaintext(vec![1, 2, 3]);
        assert!(!specifics.is_encrypted());
        assert_eq!(specifics.data, vec![1, 2, 3]);
    }

    #[test]
    fn encrypted_envelope_round_trips_through_serde() {
        let specifics = Specifics::encrypted(EncryptedPayload::new("key-1", vec![9, 9]));
        let json = serde_json::to_string(&specifics).unwrap();
        let back: Specifics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, specifics);
        assert!(back.is_encrypted());
    }
}
