//! Small value types shared by every CAT crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::Error;

/// Hash function backing every HMAC in the key-derivation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum PseudoRandomFunction {
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl PseudoRandomFunction {
    /// Lowercase identifier, as used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for PseudoRandomFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PseudoRandomFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha224" => Ok(Self::Sha224),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(Error::InvalidSetting {
                name: "prf",
                reason: format!("unsupported pseudo-random function '{}'", other),
            }),
        }
    }
}

impl TryFrom<String> for PseudoRandomFunction {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Type the `identity` claim is converted to before user lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum IdentityKind {
    /// Whitespace-trimmed text
    #[default]
    String,
    /// Signed 64-bit integer (typical database primary key)
    Integer,
    /// RFC 4122 UUID
    Uuid,
}

impl FromStr for IdentityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(Self::String),
            "integer" | "int" => Ok(Self::Integer),
            "uuid" => Ok(Self::Uuid),
            other => Err(Error::InvalidSetting {
                name: "identity_kind",
                reason: format!("unknown identity kind '{}'", other),
            }),
        }
    }
}

impl TryFrom<String> for IdentityKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// String holding secret material. Zeroized on drop, redacted in `Debug`.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the secret. Callers must not log the returned value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([redacted])")
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prf_parsing() {
        assert_eq!("sha256".parse::<PseudoRandomFunction>().unwrap(), PseudoRandomFunction::Sha256);
        assert_eq!("SHA512".parse::<PseudoRandomFunction>().unwrap(), PseudoRandomFunction::Sha512);
        assert!("md5".parse::<PseudoRandomFunction>().is_err());
        assert_eq!(PseudoRandomFunction::default().name(), "sha256");
    }

    #[test]
    fn test_identity_kind_parsing() {
        assert_eq!("uuid".parse::<IdentityKind>().unwrap(), IdentityKind::Uuid);
        assert_eq!("int".parse::<IdentityKind>().unwrap(), IdentityKind::Integer);
        assert!("float".parse::<IdentityKind>().is_err());
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = SecretString::new("hunter2");
        let printed = format!("{:?}", secret);
        assert!(!printed.contains("hunter2"));
        assert_eq!(secret.expose(), "hunter2");
    }
}
