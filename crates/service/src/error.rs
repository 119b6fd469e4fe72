//! Error types for request authentication and bootstrap.

use thiserror::Error;

/// Why an inbound request was rejected.
///
/// Callers may use the variant for diagnostics; only a generic
/// "authentication failed" should be returned over the network.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing Authorization header.")]
    MissingAuthHeader,

    #[error("Invalid Authorization header. Must be of form: '<scheme> <token>'.")]
    InvalidAuthHeader,

    #[error("Invalid auth scheme: '{scheme}'. Accepted: '{expected}'.")]
    InvalidAuthScheme { scheme: String, expected: String },

    #[error("Invalid CAT header '{header}'. Should not contain non-ASCII characters.")]
    InvalidHeaderEncoding { header: String },

    #[error("Unrecognized CAT header: '{header}'.")]
    UnrecognizedHeader { header: String },

    /// Every missing header, in Header-Case with the prefix
    #[error("Missing required headers: {}.", crate::headers::human_readable_list(.headers))]
    MissingRequiredHeaders { headers: Vec<String> },

    #[error("Invalid identity value: '{value}'. Could not convert to required type.")]
    InvalidIdentity { value: String },

    #[error("Request not for this service.")]
    WrongService,

    #[error("Invalid timestamp header. Must be in ISO 8601 format.")]
    InvalidTimestamp,

    #[error("Invalid valid-until header. Must be in ISO 8601 format.")]
    InvalidValidUntil,

    #[error("Valid-until header indicates that the request is no longer valid.")]
    TokenExpired,

    #[error("Nonce was rejected.")]
    NonceRejected,

    #[error("Invalid value for claim '{claim}': {reason}")]
    InvalidClaim { claim: String, reason: String },

    #[error("Invalid CAT.")]
    InvalidToken,

    #[error("User does not exist.")]
    IdentityNotFound,

    /// The service cannot authenticate anything yet
    #[error("Service setup error: {0}")]
    ServiceSetup(String),
}

impl AuthError {
    /// Stable identifier for logs and response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingAuthHeader => "missing_auth_header",
            Self::InvalidAuthHeader => "invalid_auth_header",
            Self::InvalidAuthScheme { .. } => "invalid_auth_scheme",
            Self::InvalidHeaderEncoding { .. } => "invalid_cat_header",
            Self::UnrecognizedHeader { .. } => "unrecognized_cat_header",
            Self::MissingRequiredHeaders { .. } => "missing_required_headers",
            Self::InvalidIdentity { .. } => "invalid_identity",
            Self::WrongService => "wrong_service",
            Self::InvalidTimestamp => "invalid_timestamp",
            Self::InvalidValidUntil => "invalid_valid_until",
            Self::TokenExpired => "cat_expired",
            Self::NonceRejected => "nonce_rejected",
            Self::InvalidClaim { .. } => "invalid_claim",
            Self::InvalidToken => "invalid_cat",
            Self::IdentityNotFound => "user_does_not_exist",
            Self::ServiceSetup(_) => "service_setup_error",
        }
    }
}

/// Failures while obtaining a certificate or verification key from the CA.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Setup error: {0}")]
    Setup(#[from] cat_core::Error),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response from the CA
    #[error("CA responded with {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Unexpected response body: {0}")]
    InvalidResponse(String),

    #[error("Certificate error: {0}")]
    Certificate(#[from] cat_identity::CertificateError),

    #[error("Invalid key material: {0}")]
    Key(#[from] cat_crypto::DerivationError),
}
