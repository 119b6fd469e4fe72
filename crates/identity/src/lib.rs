//! Certificate authority for CAT participants.
//!
//! Services prove who they are with short-lived X.509 client certificates
//! issued by the CA, and present those certificates to obtain the
//! verification key for their service type.
//!
//! # Security Model
//!
//! - Services generate their own Ed25519 key pairs; the CA only sees CSRs
//! - Every CSR must be signed by the key it certifies
//! - Client certificates cannot act as CAs and may only sign
//! - Key material is released only for entities registered in the directory

pub mod authority;
pub mod directory;
pub mod error;
pub mod pki;

pub use authority::CertificateAuthority;
pub use directory::{EntityDirectory, InMemoryDirectory};
pub use error::{AuthorityError, AuthorityResult, CertificateError, CertificateResult};
pub use pki::{
    build_csr, deserialize_certificate, deserialize_csr, generate_key_pair, issue_ca_certificate,
    issue_certificate, serialize_certificate, serialize_csr, validate_certificate_chain,
    validate_csr, Certificate, CertificateSigningRequest, ServiceKeyPair, SubjectName,
};
