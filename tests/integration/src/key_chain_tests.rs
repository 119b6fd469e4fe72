//! Key-derivation chain across the CA and the service side.

use cat_core::PseudoRandomFunction;
use cat_crypto::{Claims, KeyDerivation, RootSecret};
use cat_identity::{
    build_csr, AuthorityError, CertificateAuthority, InMemoryDirectory, ServiceKeyPair, SubjectName,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

use crate::test_utils::{ca_config, init_tracing, ENTITY_NAME, ROOT_SECRET, SERVICE_TYPE};

fn hmac_sha256_hex(key: &[u8], msg: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).unwrap();
    mac.update(msg);
    hex::encode(mac.finalize().into_bytes())
}

fn authority() -> CertificateAuthority {
    let config = ca_config();
    let directory = InMemoryDirectory::from_records(&config.server.entities);
    CertificateAuthority::new(&config, Arc::new(directory)).unwrap()
}

#[test]
fn test_verification_key_for_registered_entity() {
    init_tracing();
    let authority = authority();
    authority.ca_certificate().unwrap();

    let key = ServiceKeyPair::generate().unwrap();
    let csr = build_csr(&key, &SubjectName::new(ENTITY_NAME)).unwrap();
    let certificate = authority.issue_client_certificate(&csr).unwrap();

    let verification_key = authority
        .verification_key(&certificate, SERVICE_TYPE, ENTITY_NAME)
        .unwrap();
    assert_eq!(
        verification_key.as_hex(),
        hmac_sha256_hex(ROOT_SECRET.as_bytes(), SERVICE_TYPE.as_bytes())
    );

    let err = authority
        .verification_key(&certificate, SERVICE_TYPE, "missing")
        .unwrap_err();
    assert!(matches!(err, AuthorityError::EntityNotFound { .. }));
    assert_eq!(err.code(), "entity_not_found");
}

#[test]
fn test_token_matches_independent_hmac_chain() {
    let verification_key = hmac_sha256_hex(ROOT_SECRET.as_bytes(), b"billing");
    let creation_key = hmac_sha256_hex(verification_key.as_bytes(), b"42");
    let expected = hmac_sha256_hex(
        creation_key.as_bytes(),
        br#"{"identity": "42", "service_name": "billing"}"#,
    );

    let derivation = KeyDerivation::default();
    let ck = derivation.creation_key_from_root(&RootSecret::new(ROOT_SECRET), "billing", "42");
    let token = derivation.token(&ck, &Claims::new("42", "billing"));

    assert_eq!(token, expected);
    assert_eq!(
        token,
        "4d5d140edccfbe52223cd449827ba304a5abc5d530df88339b2d9c71164c0b63"
    );
}

#[test]
fn test_ca_creation_key_signs_verifiable_tokens() {
    let authority = authority();
    let creation_key = authority.creation_key(SERVICE_TYPE, "42").unwrap();

    let derivation = KeyDerivation::default();
    let verification_key = derivation.verification_key(&RootSecret::new(ROOT_SECRET), SERVICE_TYPE);
    let claims = Claims::new("42", SERVICE_TYPE).nonce("n1");
    let token = derivation.token(&creation_key, &claims);

    assert!(derivation.verify_token(
        &token,
        &derivation.creation_key(&verification_key, "42"),
        &claims
    ));
    assert!(!derivation.verify_token(
        &token,
        &derivation.creation_key(&verification_key, "43"),
        &claims
    ));
}

#[test]
fn test_prf_changes_every_level() {
    let root = RootSecret::new(ROOT_SECRET);
    let sha256 = KeyDerivation::new(PseudoRandomFunction::Sha256);
    let sha512 = KeyDerivation::new(PseudoRandomFunction::Sha512);

    let vk256 = sha256.verification_key(&root, SERVICE_TYPE);
    let vk512 = sha512.verification_key(&root, SERVICE_TYPE);
    assert_eq!(vk256.as_hex().len(), 64);
    assert_eq!(vk512.as_hex().len(), 128);

    let claims = Claims::new("42", SERVICE_TYPE);
    let token = sha512.token(&sha512.creation_key(&vk512, "42"), &claims);
    assert!(!sha256.verify_token(&token, &sha256.creation_key(&vk256, "42"), &claims));
}
