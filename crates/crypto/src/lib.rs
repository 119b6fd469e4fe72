//! Key derivation for Capability Authentication Tokens (CATs).
//!
//! The derivation chain is a pure function of its inputs:
//!
//! ```text
//! root secret ──HMAC(service type)──▶ verification key
//! verification key ──HMAC(identity)──▶ creation key
//! creation key ──HMAC(canonical claims)──▶ CAT
//! ```
//!
//! # Security Principles
//!
//! - The root secret never leaves the certificate authority
//! - A verification key is scoped to one service type, a creation key to one
//!   (service type, identity) pair
//! - Token comparison is constant-time
//! - Key material is zeroized on drop and never printed

pub mod claims;
pub mod derivation;
pub mod keys;

#[cfg(test)]
mod test_vectors;

pub use claims::{canonical_json, Claims, IDENTITY, NONCE, SERVICE_NAME, TIMESTAMP, VALID_UNTIL};
pub use derivation::{hmac_hex, KeyDerivation};
pub use keys::{CreationKey, DerivationError, RootSecret, VerificationKey};
