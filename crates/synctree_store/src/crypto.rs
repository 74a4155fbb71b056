//! Cryptographer readiness tracking.

use synctree_model::EncryptedPayload;

/// Tracks which encryption key, if any, is currently installed.
///
/// The store does not perform real cryptography; it only answers the
/// two questions the sync layer needs: "is a key available" and "does
/// the installed key match this ciphertext's key name". Actual
/// encryption and decryption belong to the host.
#[derive(Debug, Clone, Default)]
pub struct Cryptographer {
    key_name: Option<String>,
}

impl Cryptographer {
    /// Creates a cryptographer with no key installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a decryption key is currently installed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.key_name.is_some()
    }

    /// Returns true if the installed key can decrypt `payload`.
    #[must_use]
    pub fn can_decrypt(&self, payload: &EncryptedPayload) -> bool {
        self.key_name.as_deref() == Some(payload.key_name.as_str())
    }

    /// Installs a key by name, replacing any previous key.
    pub fn install_key(&mut self, key_name: impl Into<String>) {
        self.key_name = Some(key_name.into());
    }

    /// Removes the installed key.
    pub fn clear_key(&mut self) {
        self.key_name = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_follows_key_installation() {
        let mut crypto = Cryptographer::new();
        assert!(!crypto.is_ready());

        crypto.install_key("key-1");
        assert!(crypto.is_ready());

        crypto.clear_key();
        assert!(!crypto.is_ready());
    }

    #[test]
    fn can_decrypt_requires_matching_key_name() {
        let mut crypto = Cryptographer::new();
        let payload = EncryptedPayload::new("key-1", vec![1, 2]);
        assert!(!crypto.can_decrypt(&payload));

        crypto.install_key("key-1");
        assert!(crypto.can_decrypt(&payload));

        crypto.install_key("key-2");
        assert!(!crypto.can_decrypt(&payload));
    }
}
