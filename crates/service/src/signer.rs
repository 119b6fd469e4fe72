//! Client side of the protocol: turning a claim set into request headers.

use cat_core::CatConfig;
use cat_crypto::{Claims, CreationKey, KeyDerivation};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

use crate::headers::to_cat_header_name;

/// Headers produced for one request.
///
/// Kept as plain strings so they can be attached with any HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    /// `(CAT-Header-Name, raw value)` in claim order
    pub claims: Vec<(String, String)>,
}

impl SignedHeaders {
    /// Every header, `Authorization` first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        std::iter::once(("Authorization", self.authorization.as_str())).chain(
            self.claims
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        )
    }

    pub fn to_header_map(&self) -> Result<HeaderMap, http::Error> {
        let mut headers = HeaderMap::with_capacity(self.claims.len() + 1);
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&self.authorization)?);
        for (name, value) in &self.claims {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }
        Ok(headers)
    }
}

pub struct RequestSigner {
    creation_key: CreationKey,
    derivation: KeyDerivation,
    auth_scheme: String,
    header_prefix: String,
}

impl RequestSigner {
    /// Signer with the default `CAT` scheme and header prefix.
    pub fn new(creation_key: CreationKey) -> Self {
        Self {
            creation_key,
            derivation: KeyDerivation::default(),
            auth_scheme: "CAT".to_string(),
            header_prefix: "CAT".to_string(),
        }
    }

    /// Signer matching the scheme, prefix and PRF of a configured service.
    pub fn from_config(config: &CatConfig, creation_key: CreationKey) -> Self {
        Self {
            creation_key,
            derivation: KeyDerivation::new(config.common.prf),
            auth_scheme: config.service.auth_scheme.clone(),
            header_prefix: config.service.header_prefix.clone(),
        }
    }

    pub fn sign(&self, claims: &Claims) -> SignedHeaders {
        let token = self.derivation.token(&self.creation_key, claims);
        SignedHeaders {
            authorization: format!("{} {}", self.auth_scheme, token),
            claims: claims
                .iter()
                .map(|(claim, value)| {
                    (to_cat_header_name(&self.header_prefix, claim), value.to_string())
                })
                .collect(),
        }
    }

    /// Add `timestamp`, a random `nonce` and, with a `ttl`, `valid_until`.
    pub fn stamp(claims: Claims, now: DateTime<Utc>, ttl: Option<Duration>) -> Claims {
        let claims = claims
            .timestamp(now.to_rfc3339_opts(SecondsFormat::Secs, true))
            .nonce(Uuid::new_v4().to_string());
        match ttl {
            Some(ttl) => claims.valid_until((now + ttl).to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => claims,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cat_crypto::RootSecret;
    use chrono::TimeZone;

    fn signer() -> RequestSigner {
        RequestSigner::new(KeyDerivation::default().creation_key_from_root(
            &RootSecret::new("secret"),
            "billing",
            "42",
        ))
    }

    #[test]
    fn test_sign_minimal_claims() {
        let signed = signer().sign(&Claims::new("42", "billing"));
        assert_eq!(
            signed.authorization,
            "CAT 4d5d140edccfbe52223cd449827ba304a5abc5d530df88339b2d9c71164c0b63"
        );
        assert_eq!(
            signed.claims,
            vec![
                ("CAT-Identity".to_string(), "42".to_string()),
                ("CAT-Service-Name".to_string(), "billing".to_string()),
            ]
        );
        assert_eq!(signed.iter().count(), 3);
    }

    #[test]
    fn test_header_map() {
        let headers = signer()
            .sign(&Claims::new("42", "billing").valid_until("2030-01-01T00:00:00Z"))
            .to_header_map()
            .unwrap();
        assert_eq!(headers["cat-valid-until"], "2030-01-01T00:00:00Z");
        assert!(headers[AUTHORIZATION].to_str().unwrap().starts_with("CAT "));
    }

    #[test]
    fn test_from_config_uses_scheme_and_prefix() {
        let mut config = CatConfig::default();
        config.service.auth_scheme = "Token".to_string();
        config.service.header_prefix = "X-Auth".to_string();
        let key = KeyDerivation::default().creation_key_from_root(&RootSecret::new("s"), "t", "i");

        let signed = RequestSigner::from_config(&config, key).sign(&Claims::new("i", "t"));
        assert!(signed.authorization.starts_with("Token "));
        assert_eq!(signed.claims[1].0, "X-Auth-Service-Name");
    }

    #[test]
    fn test_stamp() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let claims = RequestSigner::stamp(Claims::new("42", "billing"), now, Some(Duration::minutes(5)));

        assert_eq!(claims.get("timestamp"), Some("2024-01-01T00:00:00Z"));
        assert_eq!(claims.get("valid_until"), Some("2024-01-01T00:05:00Z"));
        assert!(Uuid::parse_str(claims.get("nonce").unwrap()).is_ok());

        let without_ttl = RequestSigner::stamp(Claims::new("42", "billing"), now, None);
        assert!(!without_ttl.contains("valid_until"));
        assert_ne!(claims.get("nonce"), without_ttl.get("nonce"));
    }
}
