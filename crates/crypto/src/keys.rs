//! Key material of the derivation chain.
//!
//! Every key is carried as the lowercase hex encoding of an HMAC output. The
//! next level of the chain uses the UTF-8 bytes of that hex string as its
//! HMAC key, so keys can cross JSON boundaries without re-encoding.

use cat_core::SecretString;
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Errors raised when importing key material received from elsewhere.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DerivationError {
    #[error("Key material is empty")]
    EmptyKey,

    #[error("Key material is not lowercase hex: {reason}")]
    MalformedKey { reason: String },
}

fn check_hex(value: &str) -> Result<(), DerivationError> {
    if value.is_empty() {
        return Err(DerivationError::EmptyKey);
    }
    if value.len() % 2 != 0 {
        return Err(DerivationError::MalformedKey {
            reason: format!("odd length {}", value.len()),
        });
    }
    if let Some(c) = value
        .chars()
        .find(|c| !matches!(c, '0'..='9' | 'a'..='f'))
    {
        return Err(DerivationError::MalformedKey {
            reason: format!("unexpected character '{}'", c),
        });
    }
    Ok(())
}

/// Root of the derivation chain. Owned by the CA process only.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RootSecret(String);

impl RootSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&SecretString> for RootSecret {
    fn from(secret: &SecretString) -> Self {
        Self(secret.expose().to_string())
    }
}

impl fmt::Debug for RootSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RootSecret([redacted])")
    }
}

macro_rules! hex_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
        pub struct $name(String);

        impl $name {
            /// Import key material received over the wire.
            pub fn from_hex(value: impl Into<String>) -> Result<Self, DerivationError> {
                let value = value.into();
                check_hex(&value)?;
                Ok(Self(value))
            }

            pub(crate) fn from_derived(value: String) -> Self {
                Self(value)
            }

            /// Hex form of the key. Never log it.
            pub fn as_hex(&self) -> &str {
                &self.0
            }

            pub(crate) fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "([redacted; {} chars])"), self.0.len())
            }
        }
    };
}

hex_key!(
    /// Per-service-type key: `HMAC(root secret, service type)`.
    VerificationKey
);

hex_key!(
    /// Per-identity key: `HMAC(verification key, identity)`. Signs CATs.
    CreationKey
);
