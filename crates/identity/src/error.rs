//! Error types for certificate and authority operations.
//!
//! Every variant maps to a stable snake_case code via `code()`, which is what
//! crosses process boundaries. Messages are for operators.

use thiserror::Error;

/// Errors raised by the certificate engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CertificateError {
    /// CSR signature does not verify against its embedded public key
    #[error("Invalid signature.")]
    InvalidSignature,

    /// Input is not a structurally valid certificate or CSR
    #[error("Malformed certificate: {0}")]
    MalformedCertificate(String),

    #[error("Certificate was not issued by this CA.")]
    WrongIssuer,

    #[error("Certificate is not directly issued by the CA.")]
    NotIssuedByCa,

    #[error("Certificate subject does not match.")]
    WrongSubject,

    #[error("Certificate public key does not match.")]
    WrongPublicKey,

    #[error("Certificate is not valid yet.")]
    CertificateNotYetValid,

    #[error("Certificate is not valid anymore.")]
    CertificateExpired,

    #[error("Certificate does not have basic constraints.")]
    MissingBasicConstraints,

    #[error("Client certificate cannot be a CA.")]
    CannotBeCa,

    #[error("Certificate does not have key usage.")]
    MissingKeyUsage,

    #[error("Certificate cannot be used for digital signatures.")]
    CannotSignDigitally,

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Certificate generation failed: {0}")]
    Generation(String),

    #[error("Validity period out of range")]
    InvalidValidity,
}

impl CertificateError {
    /// Stable identifier for logs and response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSignature => "invalid_signature",
            Self::MalformedCertificate(_) => "invalid_certificate",
            Self::WrongIssuer => "wrong_issuer",
            Self::NotIssuedByCa => "not_directly_issued_by_ca",
            Self::WrongSubject => "wrong_subject",
            Self::WrongPublicKey => "wrong_public_key",
            Self::CertificateNotYetValid => "certificate_not_valid_yet",
            Self::CertificateExpired => "certificate_not_valid_anymore",
            Self::MissingBasicConstraints => "missing_basic_constraints",
            Self::CannotBeCa => "cant_be_a_ca",
            Self::MissingKeyUsage => "missing_key_usage",
            Self::CannotSignDigitally => "cant_be_used_for_digital_signatures",
            Self::KeyGeneration(_) => "key_generation_failed",
            Self::Generation(_) => "certificate_generation_failed",
            Self::InvalidValidity => "invalid_validity",
        }
    }
}

/// Errors raised by the certificate authority.
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// Required configuration is missing or invalid
    #[error("CA setup error: {0}")]
    Setup(#[from] cat_core::Error),

    /// No CA key pair or certificate yet
    #[error("CA is not ready to issue certificates")]
    CaNotReady,

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error("Service entity '{name}' of type '{entity_type}' not found.")]
    EntityNotFound { entity_type: String, name: String },

    #[error("Service entity type '{name}' not found.")]
    EntityTypeNotFound { name: String },
}

impl AuthorityError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Setup(_) => "service_setup_error",
            Self::CaNotReady => "ca_not_ready",
            Self::Certificate(err) => err.code(),
            Self::EntityNotFound { .. } => "entity_not_found",
            Self::EntityTypeNotFound { .. } => "entity_type_not_found",
        }
    }
}

pub type CertificateResult<T> = Result<T, CertificateError>;

pub type AuthorityResult<T> = Result<T, AuthorityError>;
