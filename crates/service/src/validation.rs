//! Claim registry and per-claim value checks.
//!
//! Built-in claims are a closed enum, so every one of them is matched to its
//! validator at compile time. Services extend the set with their own claims,
//! optionally attaching a validator to each.

use cat_core::{IdentityKind, ServiceSettings};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AuthError;
use crate::headers::{from_cat_header_name, header_case_to_snake_case};

/// Claims every service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownClaim {
    Identity,
    ServiceName,
    Timestamp,
    ValidUntil,
    Nonce,
}

impl KnownClaim {
    pub const ALL: [KnownClaim; 5] = [
        KnownClaim::Identity,
        KnownClaim::ServiceName,
        KnownClaim::Timestamp,
        KnownClaim::ValidUntil,
        KnownClaim::Nonce,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Identity => cat_crypto::IDENTITY,
            Self::ServiceName => cat_crypto::SERVICE_NAME,
            Self::Timestamp => cat_crypto::TIMESTAMP,
            Self::ValidUntil => cat_crypto::VALID_UNTIL,
            Self::Nonce => cat_crypto::NONCE,
        }
    }

    /// Required unless a service says otherwise.
    pub fn required_by_default(self) -> bool {
        matches!(self, Self::Identity | Self::ServiceName)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|claim| claim.name() == name)
    }
}

/// Check on the raw value of a service-defined claim.
pub trait ClaimValidator: Send + Sync {
    fn validate(&self, value: &str) -> Result<(), String>;
}

impl<F> ClaimValidator for F
where
    F: Fn(&str) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, value: &str) -> Result<(), String> {
        self(value)
    }
}

/// How a claim name present on a request is handled.
pub enum ClaimRule<'a> {
    Known(KnownClaim),
    Extension(Option<&'a dyn ClaimValidator>),
}

/// The set of permitted and required claims for one service.
#[derive(Clone)]
pub struct ClaimRegistry {
    required: BTreeSet<String>,
    extensions: BTreeMap<String, Option<Arc<dyn ClaimValidator>>>,
}

impl Default for ClaimRegistry {
    fn default() -> Self {
        Self {
            required: KnownClaim::ALL
                .into_iter()
                .filter(|claim| claim.required_by_default())
                .map(|claim| claim.name().to_string())
                .collect(),
            extensions: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for ClaimRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimRegistry")
            .field("required", &self.required)
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// `CAT-Tenant` → `tenant`; a bare `Tenant` is accepted too.
fn claim_name(prefix: &str, header: &str) -> String {
    from_cat_header_name(prefix, header).unwrap_or_else(|| header_case_to_snake_case(header))
}

impl ClaimRegistry {
    /// Built-in claims plus the additional headers named in `settings`.
    pub fn from_settings(settings: &ServiceSettings) -> Self {
        let prefix = settings.header_prefix.as_str();
        let mut registry = Self::default();
        for header in &settings.additional_valid_headers {
            registry = registry.allow(claim_name(prefix, header));
        }
        for header in &settings.additional_required_headers {
            registry = registry.require(claim_name(prefix, header));
        }
        registry
    }

    /// Permit an extension claim.
    pub fn allow(mut self, claim: impl Into<String>) -> Self {
        let claim = claim.into();
        if KnownClaim::from_name(&claim).is_none() {
            self.extensions.entry(claim).or_insert(None);
        }
        self
    }

    /// Require a claim, permitting it if it is an extension.
    pub fn require(mut self, claim: impl Into<String>) -> Self {
        let claim = claim.into();
        self = self.allow(claim.clone());
        self.required.insert(claim);
        self
    }

    /// Permit an extension claim and check its values with `validator`.
    pub fn validate_with(
        mut self,
        claim: impl Into<String>,
        validator: impl ClaimValidator + 'static,
    ) -> Self {
        let claim = claim.into();
        if KnownClaim::from_name(&claim).is_none() {
            self.extensions.insert(claim, Some(Arc::new(validator)));
        }
        self
    }

    pub fn rule(&self, claim: &str) -> Option<ClaimRule<'_>> {
        if let Some(known) = KnownClaim::from_name(claim) {
            return Some(ClaimRule::Known(known));
        }
        self.extensions
            .get(claim)
            .map(|validator| ClaimRule::Extension(validator.as_deref()))
    }

    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(String::as_str)
    }

    pub fn is_required(&self, claim: &str) -> bool {
        self.required.contains(claim)
    }
}

/// The converted `identity` claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Text(String),
    Integer(i64),
    Uuid(Uuid),
}

impl Identity {
    /// Convert a raw identity value. Surrounding whitespace is ignored.
    pub fn parse(kind: IdentityKind, raw: &str) -> Result<Self, AuthError> {
        let value = raw.trim();
        let invalid = || AuthError::InvalidIdentity {
            value: raw.to_string(),
        };
        match kind {
            IdentityKind::String => Ok(Self::Text(value.to_string())),
            IdentityKind::Integer => value.parse().map(Self::Integer).map_err(|_| invalid()),
            IdentityKind::Uuid => Uuid::parse_str(value).map(Self::Uuid).map_err(|_| invalid()),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(value) => f.write_str(value),
            Self::Integer(value) => write!(f, "{}", value),
            Self::Uuid(value) => write!(f, "{}", value),
        }
    }
}

/// Parse an ISO 8601 date-time. Values without an offset are taken as UTC.
pub fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(parsed) = DateTime::parse_from_str(value, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}
