//! Request authentication with keys from the CA's derivation chain.

use cat_core::CatConfig;
use cat_crypto::{Claims, KeyDerivation, RootSecret};
use cat_service::{AuthError, Authenticator, KeyStore, RequestSigner, TrustIdentity};
use chrono::{Duration, Utc};
use http::HeaderMap;
use std::sync::Arc;

use crate::test_utils::{init_tracing, ROOT_SECRET, SERVICE_TYPE};

fn config() -> CatConfig {
    let mut config = CatConfig::default();
    config.service.service_type = SERVICE_TYPE.to_string();
    config
}

fn authenticator() -> Authenticator<TrustIdentity> {
    let key = KeyDerivation::default().verification_key(&RootSecret::new(ROOT_SECRET), SERVICE_TYPE);
    Authenticator::new(&config(), Arc::new(KeyStore::with_key(key)), TrustIdentity).unwrap()
}

fn signed(claims: &Claims) -> HeaderMap {
    let identity = claims.identity().unwrap();
    let creation_key =
        KeyDerivation::default().creation_key_from_root(&RootSecret::new(ROOT_SECRET), SERVICE_TYPE, identity);
    RequestSigner::new(creation_key)
        .sign(claims)
        .to_header_map()
        .unwrap()
}

#[test]
fn test_stamped_request_authenticates() {
    init_tracing();
    let claims = RequestSigner::stamp(
        Claims::new("42", SERVICE_TYPE),
        Utc::now(),
        Some(Duration::minutes(5)),
    );

    let result = authenticator().authenticate(&signed(&claims)).unwrap();
    assert_eq!(result.identity.to_string(), "42");
    assert!(result.valid_until.is_some());
    assert!(result.timestamp.is_some());
}

#[test]
fn test_expired_request_fails_regardless_of_token() {
    init_tracing();
    let past = (Utc::now() - Duration::hours(1)).to_rfc3339();
    let claims = Claims::new("42", SERVICE_TYPE).valid_until(past);

    assert_eq!(
        authenticator().authenticate(&signed(&claims)).unwrap_err(),
        AuthError::TokenExpired
    );

    let mut forged = signed(&claims);
    forged.insert(
        http::header::AUTHORIZATION,
        http::HeaderValue::from_static("CAT 00"),
    );
    assert_eq!(
        authenticator().authenticate(&forged).unwrap_err(),
        AuthError::TokenExpired
    );
}

#[test]
fn test_missing_service_name_lists_exactly_that_header() {
    init_tracing();
    let mut headers = signed(&Claims::new("42", SERVICE_TYPE));
    headers.remove("cat-service-name");

    match authenticator().authenticate(&headers).unwrap_err() {
        AuthError::MissingRequiredHeaders { headers } => {
            assert_eq!(headers, vec!["CAT-Service-Name".to_string()]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_rejections_carry_stable_codes() {
    let cases = [
        (Claims::new("42", "search"), "wrong_service"),
        (Claims::new("42", SERVICE_TYPE).timestamp("noon"), "invalid_timestamp"),
        (Claims::new("42", SERVICE_TYPE).with("tenant", "acme"), "unrecognized_cat_header"),
    ];
    for (claims, code) in cases {
        let err = authenticator().authenticate(&signed(&claims)).unwrap_err();
        assert_eq!(err.code(), code);
    }
}
