//! Full flow: bootstrap against a live CA server, then authenticate a
//! request signed with a creation key obtained from the same CA.

use cat_crypto::{Claims, CreationKey};
use cat_service::{
    AuthError, Authenticator, BootstrapAgent, BootstrapError, KeyStore, RequestSigner, TrustIdentity,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::test_utils::{
    ca_config, init_tracing, service_config, TestCa, ENTITY_NAME, SERVICE_TYPE,
};

async fn fetch_creation_key(base_url: &str, identity: &str) -> CreationKey {
    let body: Value = reqwest::Client::new()
        .post(format!("{}/creation-key", base_url))
        .header("x-authenticated-user", identity)
        .json(&json!({ "service": SERVICE_TYPE }))
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap()
        .json()
        .await
        .unwrap();
    CreationKey::from_hex(body["creation_key"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn test_bootstrap_then_authenticate() {
    init_tracing();
    let ca = TestCa::spawn(&ca_config()).await;
    let config = service_config(&ca.base_url(), ENTITY_NAME);

    let keys = Arc::new(KeyStore::new());
    let agent = BootstrapAgent::new(&config, Arc::clone(&keys)).unwrap();
    let authenticator = Authenticator::new(&config, Arc::clone(&keys), TrustIdentity).unwrap();

    let valid_until = (Utc::now() + Duration::minutes(5)).to_rfc3339();
    let claims = Claims::new("42", SERVICE_TYPE).valid_until(valid_until);
    let creation_key = fetch_creation_key(&ca.base_url(), "42").await;
    let headers = RequestSigner::from_config(&config, creation_key)
        .sign(&claims)
        .to_header_map()
        .unwrap();

    // No verification key yet.
    assert_eq!(
        authenticator.authenticate(&headers).unwrap_err().code(),
        "service_setup_error"
    );

    agent.verification_key().await.unwrap();
    let result = authenticator.authenticate(&headers).unwrap();
    assert_eq!(result.identity.to_string(), "42");

    let certificate = agent.certificate().await.unwrap();
    assert_eq!(certificate.subject().common_name, ENTITY_NAME);
}

#[tokio::test]
async fn test_force_refresh_keeps_service_working() {
    init_tracing();
    let ca = TestCa::spawn(&ca_config()).await;
    let config = service_config(&ca.base_url(), ENTITY_NAME);

    let keys = Arc::new(KeyStore::new());
    let agent = BootstrapAgent::new(&config, Arc::clone(&keys)).unwrap();
    let before = agent.verification_key().await.unwrap();
    let first_certificate = agent.certificate().await.unwrap();

    let after = agent.force_refresh().await.unwrap();
    assert_eq!(before, after);
    assert_eq!(keys.get(), Some(after));
    assert_ne!(agent.certificate().await.unwrap(), first_certificate);

    let authenticator = Authenticator::new(&config, keys, TrustIdentity).unwrap();
    let creation_key = fetch_creation_key(&ca.base_url(), "7").await;
    let headers = RequestSigner::from_config(&config, creation_key)
        .sign(&Claims::new("7", SERVICE_TYPE).nonce("abc"))
        .to_header_map()
        .unwrap();
    assert!(authenticator.authenticate(&headers).is_ok());
}

#[tokio::test]
async fn test_unregistered_service_cannot_bootstrap() {
    init_tracing();
    let ca = TestCa::spawn(&ca_config()).await;
    let keys = Arc::new(KeyStore::new());
    let agent = BootstrapAgent::new(&service_config(&ca.base_url(), "rogue"), Arc::clone(&keys)).unwrap();

    match agent.verification_key().await {
        Err(BootstrapError::Status { status, detail }) => {
            assert_eq!(status, 404);
            assert!(detail.contains("rogue"));
        }
        other => panic!("expected 404, got {:?}", other.map(|_| ())),
    }
    assert!(!keys.is_ready());

    let config = service_config(&ca.base_url(), "rogue");
    let authenticator = Authenticator::new(&config, keys, TrustIdentity).unwrap();
    let err = authenticator.authenticate(&http::HeaderMap::new()).unwrap_err();
    assert_eq!(err, AuthError::MissingAuthHeader);
}
