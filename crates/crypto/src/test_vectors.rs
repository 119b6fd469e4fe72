//! Known-answer vectors for the derivation chain.
//!
//! Values were produced with an independent HMAC implementation and must
//! never change: clients and services built against other releases hash the
//! same bytes.

use crate::{Claims, KeyDerivation, RootSecret};
use cat_core::PseudoRandomFunction;

const ROOT: &str = "secret";
const SERVICE_TYPE: &str = "billing";
const IDENTITY: &str = "42";

const VERIFICATION_KEY: &str = "b043fbc2ae5c6529246a27fb857df25e1fcefb3522394d6f974eb5322270ff45";
const CREATION_KEY: &str = "ed27bb76e827326fb190e32887707bcdc1c06cbac045fc400d906f0fb7693f88";
const MINIMAL_CAT: &str = "4d5d140edccfbe52223cd449827ba304a5abc5d530df88339b2d9c71164c0b63";
const NONCE_CAT: &str = "f3c8f5129e64d27c415dad661df88866df3ae8ffad36497365392cec4339e5bd";
const SHA512_VERIFICATION_KEY: &str = "4d578e95ca68a89d8189626e176211a499f9103731e0e567a4b9ec5fba278d6e3ef821849f0cb4719ee5afacf01503139a83e2b5120fcddb5c24df27b3de2993";

#[test]
fn test_verification_key_vector() {
    let vk = KeyDerivation::default().verification_key(&RootSecret::new(ROOT), SERVICE_TYPE);
    assert_eq!(vk.as_hex(), VERIFICATION_KEY);
}

#[test]
fn test_creation_key_vector() {
    let engine = KeyDerivation::default();
    let ck = engine.creation_key_from_root(&RootSecret::new(ROOT), SERVICE_TYPE, IDENTITY);
    assert_eq!(ck.as_hex(), CREATION_KEY);
}

#[test]
fn test_minimal_cat_vector() {
    let engine = KeyDerivation::default();
    let ck = engine.creation_key_from_root(&RootSecret::new(ROOT), SERVICE_TYPE, IDENTITY);
    let claims = Claims::new(IDENTITY, SERVICE_TYPE);

    assert_eq!(engine.token(&ck, &claims), MINIMAL_CAT);
    assert!(engine.verify_token(MINIMAL_CAT, &ck, &claims));
}

#[test]
fn test_cat_with_nonce_and_timestamp_vector() {
    let engine = KeyDerivation::default();
    let ck = engine.creation_key_from_root(&RootSecret::new(ROOT), SERVICE_TYPE, IDENTITY);
    let claims = Claims::new(IDENTITY, SERVICE_TYPE)
        .nonce("n1")
        .timestamp("2024-01-01T00:00:00");

    assert_eq!(engine.token(&ck, &claims), NONCE_CAT);
}

#[test]
fn test_sha512_vector() {
    let vk = KeyDerivation::new(PseudoRandomFunction::Sha512)
        .verification_key(&RootSecret::new(ROOT), SERVICE_TYPE);
    assert_eq!(vk.as_hex(), SHA512_VERIFICATION_KEY);
}

#[test]
fn test_imported_keys_reproduce_vectors() {
    // A service holding only the wire form of its verification key must
    // land on the same creation key as the CA.
    let engine = KeyDerivation::default();
    let vk = crate::VerificationKey::from_hex(VERIFICATION_KEY).unwrap();
    assert_eq!(engine.creation_key(&vk, IDENTITY).as_hex(), CREATION_KEY);
}
