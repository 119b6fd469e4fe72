//! Service side of CAT.
//!
//! - [`BootstrapAgent`] obtains a client certificate from the CA and trades it
//!   for this service type's verification key
//! - [`Authenticator`] checks inbound requests against that key
//! - [`RequestSigner`] produces the headers a client attaches to a request
//!
//! ```text
//! Authorization: CAT <token>
//! CAT-Identity: 42
//! CAT-Service-Name: billing
//! CAT-Valid-Until: 2030-01-01T00:00:00Z
//! ```

pub mod authenticator;
pub mod bootstrap;
pub mod error;
pub mod headers;
pub mod keystore;
pub mod signer;
pub mod validation;

pub use authenticator::{
    AcceptAnyNonce, Authenticated, Authenticator, IdentityResolver, NonceValidator, TrustIdentity,
};
pub use bootstrap::{BootstrapAgent, CERTIFICATE_AUTH_SCHEME};
pub use error::{AuthError, BootstrapError};
pub use keystore::KeyStore;
pub use signer::{RequestSigner, SignedHeaders};
pub use validation::{ClaimRegistry, ClaimValidator, Identity, KnownClaim};
