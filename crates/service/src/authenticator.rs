//! Inbound request authentication.
//!
//! A request carries its token in `Authorization: <scheme> <token>` and one
//! header per claim. Authentication walks the headers, validates every claim,
//! recomputes the token from the creation key of the claimed identity and
//! finally resolves that identity to a user record.

use cat_core::{CatConfig, IdentityKind};
use cat_crypto::{Claims, KeyDerivation};
use chrono::{DateTime, Utc};
use http::HeaderMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::AuthError;
use crate::headers::{authorization_header, claim_headers, to_cat_header_name, ClaimHeader};
use crate::keystore::KeyStore;
use crate::validation::{parse_datetime, ClaimRegistry, ClaimRule, Identity, KnownClaim};

/// Looks up the user an identity claim refers to.
pub trait IdentityResolver: Send + Sync {
    type User;

    fn resolve(&self, identity: &Identity) -> Option<Self::User>;
}

/// Resolver for services without a user table: every identity is its own user.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustIdentity;

impl IdentityResolver for TrustIdentity {
    type User = Identity;

    fn resolve(&self, identity: &Identity) -> Option<Identity> {
        Some(identity.clone())
    }
}

/// Replay-cache hook for the `nonce` claim.
pub trait NonceValidator: Send + Sync {
    /// Return `false` to reject the request.
    fn validate(&self, nonce: &str, now: DateTime<Utc>) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAnyNonce;

impl NonceValidator for AcceptAnyNonce {
    fn validate(&self, _nonce: &str, _now: DateTime<Utc>) -> bool {
        true
    }
}

/// A request that passed every check.
#[derive(Debug, Clone)]
pub struct Authenticated<U> {
    pub user: U,
    pub identity: Identity,
    /// Raw claim values the token was computed over
    pub claims: Claims,
    pub timestamp: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Claim values after per-claim validation.
#[derive(Debug, Default)]
struct ValidatedClaims {
    identity: Option<Identity>,
    timestamp: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
}

pub struct Authenticator<R> {
    service_type: String,
    auth_scheme: String,
    header_prefix: String,
    identity_kind: IdentityKind,
    derivation: KeyDerivation,
    registry: ClaimRegistry,
    keys: Arc<KeyStore>,
    resolver: R,
    nonces: Arc<dyn NonceValidator>,
}

impl<R: IdentityResolver> Authenticator<R> {
    pub fn new(config: &CatConfig, keys: Arc<KeyStore>, resolver: R) -> cat_core::Result<Self> {
        config.validate_for_authentication()?;
        let service = &config.service;
        Ok(Self {
            service_type: service.service_type.clone(),
            auth_scheme: service.auth_scheme.clone(),
            header_prefix: service.header_prefix.clone(),
            identity_kind: config.common.identity_kind,
            derivation: KeyDerivation::new(config.common.prf),
            registry: ClaimRegistry::from_settings(service),
            keys,
            resolver,
            nonces: Arc::new(AcceptAnyNonce),
        })
    }

    /// Replace the registry built from configuration.
    pub fn with_registry(mut self, registry: ClaimRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_nonce_validator(mut self, nonces: Arc<dyn NonceValidator>) -> Self {
        self.nonces = nonces;
        self
    }

    pub fn registry(&self) -> &ClaimRegistry {
        &self.registry
    }

    /// Authenticate against the current time.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Authenticated<R::User>, AuthError> {
        self.authenticate_at(headers, Utc::now())
    }

    pub fn authenticate_at(
        &self,
        headers: &HeaderMap,
        now: DateTime<Utc>,
    ) -> Result<Authenticated<R::User>, AuthError> {
        match self.try_authenticate(headers, now) {
            Ok(authenticated) => {
                debug!(
                    service_type = %self.service_type,
                    identity = %authenticated.identity,
                    "Request authenticated"
                );
                Ok(authenticated)
            }
            Err(e) => {
                warn!(
                    service_type = %self.service_type,
                    code = e.code(),
                    error = %e,
                    "Request authentication failed"
                );
                Err(e)
            }
        }
    }

    fn try_authenticate(
        &self,
        headers: &HeaderMap,
        now: DateTime<Utc>,
    ) -> Result<Authenticated<R::User>, AuthError> {
        let (scheme, token) = authorization_header(headers)?;
        if !scheme.eq_ignore_ascii_case(&self.auth_scheme) {
            return Err(AuthError::InvalidAuthScheme {
                scheme,
                expected: self.auth_scheme.clone(),
            });
        }

        let received = claim_headers(headers, &self.header_prefix)?;
        let validated = self.validate_claims(&received, now)?;
        let identity = validated.identity.ok_or_else(|| AuthError::MissingRequiredHeaders {
            headers: vec![to_cat_header_name(&self.header_prefix, cat_crypto::IDENTITY)],
        })?;

        let claims: Claims = received
            .iter()
            .map(|(claim, header)| (claim.as_str(), header.value.as_str()))
            .collect();
        let raw_identity = claims.identity().unwrap_or_default();

        let verification_key = self.keys.get().ok_or_else(|| {
            AuthError::ServiceSetup("verification key has not been fetched yet".to_string())
        })?;
        let creation_key = self.derivation.creation_key(&verification_key, raw_identity);
        if !self.derivation.verify_token(&token, &creation_key, &claims) {
            return Err(AuthError::InvalidToken);
        }

        let user = self
            .resolver
            .resolve(&identity)
            .ok_or(AuthError::IdentityNotFound)?;

        Ok(Authenticated {
            user,
            identity,
            claims,
            timestamp: validated.timestamp,
            valid_until: validated.valid_until,
        })
    }

    fn validate_claims(
        &self,
        received: &BTreeMap<String, ClaimHeader>,
        now: DateTime<Utc>,
    ) -> Result<ValidatedClaims, AuthError> {
        let mut validated = ValidatedClaims::default();

        for (claim, header) in received {
            match self.registry.rule(claim) {
                None => {
                    return Err(AuthError::UnrecognizedHeader {
                        header: header.header.clone(),
                    })
                }
                Some(ClaimRule::Known(known)) => {
                    self.validate_known(known, &header.value, now, &mut validated)?
                }
                Some(ClaimRule::Extension(Some(validator))) => {
                    validator
                        .validate(&header.value)
                        .map_err(|reason| AuthError::InvalidClaim {
                            claim: claim.clone(),
                            reason,
                        })?
                }
                Some(ClaimRule::Extension(None)) => {}
            }
        }

        let missing: Vec<String> = self
            .registry
            .required()
            .filter(|claim| !received.contains_key(*claim))
            .map(|claim| to_cat_header_name(&self.header_prefix, claim))
            .collect();
        if !missing.is_empty() {
            return Err(AuthError::MissingRequiredHeaders { headers: missing });
        }

        Ok(validated)
    }

    fn validate_known(
        &self,
        claim: KnownClaim,
        value: &str,
        now: DateTime<Utc>,
        validated: &mut ValidatedClaims,
    ) -> Result<(), AuthError> {
        match claim {
            KnownClaim::Identity => {
                validated.identity = Some(Identity::parse(self.identity_kind, value)?);
            }
            KnownClaim::ServiceName => {
                if value.to_lowercase() != self.service_type.to_lowercase() {
                    return Err(AuthError::WrongService);
                }
            }
            KnownClaim::Timestamp => {
                validated.timestamp = Some(parse_datetime(value).ok_or(AuthError::InvalidTimestamp)?);
            }
            KnownClaim::ValidUntil => {
                let valid_until = parse_datetime(value).ok_or(AuthError::InvalidValidUntil)?;
                if valid_until < now {
                    return Err(AuthError::TokenExpired);
                }
                validated.valid_until = Some(valid_until);
            }
            KnownClaim::Nonce => {
                if !self.nonces.validate(value, now) {
                    return Err(AuthError::NonceRejected);
                }
            }
        }
        Ok(())
    }
}
