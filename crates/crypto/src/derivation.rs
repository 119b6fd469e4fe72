//! Key Derivation Engine.
//!
//! Pure functions only: no clock, no randomness, no I/O. Anything that varies
//! per request (timestamps, nonces) is part of the caller-supplied claims.

use cat_core::PseudoRandomFunction;
use hmac::digest::core_api::BlockSizeUser;
use hmac::digest::Digest;
use hmac::{Mac, SimpleHmac};
use sha2::{Sha224, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

use crate::claims::Claims;
use crate::keys::{CreationKey, RootSecret, VerificationKey};

fn mac<D>(key: &[u8], msg: &[u8]) -> Vec<u8>
where
    D: Digest + BlockSizeUser,
{
    // HMAC pads or hashes the key, so every length is accepted.
    let mut mac = <SimpleHmac<D> as Mac>::new_from_slice(key)
        .expect("HMAC accepts keys of any length");
    mac.update(msg);
    mac.finalize().into_bytes().to_vec()
}

/// Lowercase hex of `HMAC(key, msg)` under the given hash.
pub fn hmac_hex(prf: PseudoRandomFunction, key: &[u8], msg: &[u8]) -> String {
    let digest = match prf {
        PseudoRandomFunction::Sha224 => mac::<Sha224>(key, msg),
        PseudoRandomFunction::Sha256 => mac::<Sha256>(key, msg),
        PseudoRandomFunction::Sha384 => mac::<Sha384>(key, msg),
        PseudoRandomFunction::Sha512 => mac::<Sha512>(key, msg),
    };
    hex::encode(digest)
}

/// The three-level derivation chain, parameterised by its hash function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyDerivation {
    prf: PseudoRandomFunction,
}

impl KeyDerivation {
    pub fn new(prf: PseudoRandomFunction) -> Self {
        Self { prf }
    }

    pub fn prf(&self) -> PseudoRandomFunction {
        self.prf
    }

    /// `HMAC(root secret, service type)`.
    pub fn verification_key(&self, root: &RootSecret, service_type: &str) -> VerificationKey {
        VerificationKey::from_derived(hmac_hex(self.prf, root.as_bytes(), service_type.as_bytes()))
    }

    /// `HMAC(verification key, identity)`.
    pub fn creation_key(&self, verification_key: &VerificationKey, identity: &str) -> CreationKey {
        CreationKey::from_derived(hmac_hex(
            self.prf,
            verification_key.as_bytes(),
            identity.as_bytes(),
        ))
    }

    /// Both levels at once, as the CA does for `/creation-key`.
    pub fn creation_key_from_root(
        &self,
        root: &RootSecret,
        service_type: &str,
        identity: &str,
    ) -> CreationKey {
        self.creation_key(&self.verification_key(root, service_type), identity)
    }

    /// `HMAC(creation key, canonicalJSON(claims))`.
    pub fn token(&self, creation_key: &CreationKey, claims: &Claims) -> String {
        hmac_hex(
            self.prf,
            creation_key.as_bytes(),
            claims.canonical_json().as_bytes(),
        )
    }

    /// Recompute the token for `claims` and compare it to `candidate` in
    /// constant time.
    pub fn verify_token(&self, candidate: &str, creation_key: &CreationKey, claims: &Claims) -> bool {
        let expected = self.token(creation_key, claims);
        bool::from(expected.as_bytes().ct_eq(candidate.as_bytes()))
    }
}
