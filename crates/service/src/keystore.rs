//! Process-wide holder for the service's verification key.
//!
//! The bootstrap agent publishes the key once it has been fetched; the
//! authenticator reads it on every request.

use cat_crypto::VerificationKey;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
pub struct KeyStore {
    verification_key: RwLock<Option<VerificationKey>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store already available at construction, e.g. from a config file.
    pub fn with_key(key: VerificationKey) -> Self {
        Self {
            verification_key: RwLock::new(Some(key)),
        }
    }

    pub fn set(&self, key: VerificationKey) {
        let mut slot = self
            .verification_key
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(key);
        debug!("Verification key published");
    }

    pub fn get(&self) -> Option<VerificationKey> {
        self.verification_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.verification_key
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_ready(&self) -> bool {
        self.verification_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
