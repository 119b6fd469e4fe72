//! Certificate engine.
//!
//! Ed25519 key pairs, certificate signing requests, and the two kinds of
//! certificate the CA issues: its own self-signed CA certificate and
//! short-lived client certificates for services. Certificates and CSRs travel
//! as standard base64 of their DER encoding.
//!
//! Nothing here reads the clock. Issuance and validation take `now`
//! explicitly.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::RngCore;
use rcgen::{
    BasicConstraints, CertificateParams, CertificateSigningRequestParams, DistinguishedName,
    DnType, DnValue, IsCa, Issuer, KeyPair, KeyUsagePurpose, PublicKeyData, SerialNumber,
};
use rustls_pki_types::{CertificateDer, CertificateSigningRequestDer};
use std::fmt;
use std::time::Duration;
use time::OffsetDateTime;
use x509_parser::certificate::X509Certificate;
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::prelude::FromDer;
use x509_parser::x509::X509Name;
use zeroize::Zeroizing;

use crate::error::{CertificateError, CertificateResult};

/// Subject (or issuer) of a certificate: common name plus optional
/// organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectName {
    pub common_name: String,
    pub organization: Option<String>,
}

impl SubjectName {
    pub fn new(common_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            organization: None,
        }
    }

    /// Empty organizations are treated as absent.
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        let organization = organization.into();
        self.organization = (!organization.is_empty()).then_some(organization);
        self
    }

    fn to_distinguished_name(&self) -> DistinguishedName {
        let mut dn = DistinguishedName::new();
        dn.push(
            DnType::CommonName,
            DnValue::Utf8String(self.common_name.clone()),
        );
        if let Some(organization) = &self.organization {
            dn.push(
                DnType::OrganizationName,
                DnValue::Utf8String(organization.clone()),
            );
        }
        dn
    }

    fn from_x509(name: &X509Name<'_>) -> Self {
        let common_name = name
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .unwrap_or_default()
            .to_string();
        let organization = name
            .iter_organization()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_string);
        Self {
            common_name,
            organization,
        }
    }
}

impl fmt::Display for SubjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CN={}", self.common_name)?;
        if let Some(organization) = &self.organization {
            write!(f, ",O={}", organization)?;
        }
        Ok(())
    }
}

/// Ed25519 signing key pair of a service or of the CA.
pub struct ServiceKeyPair {
    inner: KeyPair,
}

impl ServiceKeyPair {
    pub fn generate() -> CertificateResult<Self> {
        let inner = KeyPair::generate_for(&rcgen::PKCS_ED25519)
            .map_err(|e| CertificateError::KeyGeneration(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Load a PKCS#8 PEM private key, as written by [`ServiceKeyPair::to_pem`].
    pub fn from_pem(pem: &str) -> CertificateResult<Self> {
        let inner = KeyPair::from_pem(pem)
            .map_err(|e| CertificateError::KeyGeneration(format!("invalid private key: {}", e)))?;
        Ok(Self { inner })
    }

    pub fn to_pem(&self) -> Zeroizing<String> {
        Zeroizing::new(self.inner.serialize_pem())
    }

    /// Raw public key bytes (the `subjectPublicKey` bit string contents).
    pub fn public_key(&self) -> &[u8] {
        self.inner.der_bytes()
    }

    pub(crate) fn key_pair(&self) -> &KeyPair {
        &self.inner
    }
}

impl fmt::Debug for ServiceKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceKeyPair")
            .field("public_key_len", &self.public_key().len())
            .finish_non_exhaustive()
    }
}

/// Generate a fresh Ed25519 key pair.
pub fn generate_key_pair() -> CertificateResult<ServiceKeyPair> {
    ServiceKeyPair::generate()
}

fn malformed(err: impl fmt::Display) -> CertificateError {
    CertificateError::MalformedCertificate(err.to_string())
}

fn generation(err: rcgen::Error) -> CertificateError {
    CertificateError::Generation(err.to_string())
}

fn parse_certificate(der: &[u8]) -> CertificateResult<X509Certificate<'_>> {
    let (rest, certificate) = X509Certificate::from_der(der).map_err(malformed)?;
    if !rest.is_empty() {
        return Err(malformed("trailing data after certificate"));
    }
    Ok(certificate)
}

fn timestamp_to_utc(timestamp: i64) -> CertificateResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .ok_or_else(|| malformed("validity timestamp out of range"))
}

/// An X.509 certificate with its commonly inspected fields extracted.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    subject: SubjectName,
    issuer: SubjectName,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    public_key: Vec<u8>,
    is_ca: bool,
}

impl Certificate {
    pub fn from_der(der: impl Into<Vec<u8>>) -> CertificateResult<Self> {
        let der = der.into();
        let parsed = parse_certificate(&der)?;

        let subject = SubjectName::from_x509(parsed.subject());
        let issuer = SubjectName::from_x509(parsed.issuer());
        let not_before = timestamp_to_utc(parsed.validity().not_before.timestamp())?;
        let not_after = timestamp_to_utc(parsed.validity().not_after.timestamp())?;
        let public_key = parsed.public_key().subject_public_key.data.to_vec();
        let is_ca = matches!(parsed.basic_constraints(), Ok(Some(bc)) if bc.value.ca);
        drop(parsed);

        Ok(Self {
            der,
            subject,
            issuer,
            not_before,
            not_after,
            public_key,
            is_ca,
        })
    }

    pub fn from_base64(encoded: &str) -> CertificateResult<Self> {
        let der = STANDARD.decode(encoded.trim()).map_err(malformed)?;
        Self::from_der(der)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.der)
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &SubjectName {
        &self.subject
    }

    pub fn issuer(&self) -> &SubjectName {
        &self.issuer
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn is_ca(&self) -> bool {
        self.is_ca
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.not_after
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject.to_string())
            .field("issuer", &self.issuer.to_string())
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .field("is_ca", &self.is_ca)
            .finish()
    }
}

/// A PKCS#10 certificate signing request.
#[derive(Clone, PartialEq, Eq)]
pub struct CertificateSigningRequest {
    der: Vec<u8>,
    subject: SubjectName,
    public_key: Vec<u8>,
}

impl CertificateSigningRequest {
    /// Parse the request structure. The signature is not checked here; see
    /// [`validate_csr`].
    pub fn from_der(der: impl Into<Vec<u8>>) -> CertificateResult<Self> {
        let der = der.into();
        let (rest, parsed) = X509CertificationRequest::from_der(&der).map_err(malformed)?;
        if !rest.is_empty() {
            return Err(malformed("trailing data after CSR"));
        }
        let info = &parsed.certification_request_info;
        let subject = SubjectName::from_x509(&info.subject);
        let public_key = info.subject_pki.subject_public_key.data.to_vec();
        drop(parsed);

        Ok(Self {
            der,
            subject,
            public_key,
        })
    }

    pub fn from_base64(encoded: &str) -> CertificateResult<Self> {
        let der = STANDARD.decode(encoded.trim()).map_err(malformed)?;
        Self::from_der(der)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.der)
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &SubjectName {
        &self.subject
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }
}

impl fmt::Debug for CertificateSigningRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateSigningRequest")
            .field("subject", &self.subject.to_string())
            .finish_non_exhaustive()
    }
}

pub fn serialize_certificate(certificate: &Certificate) -> String {
    certificate.to_base64()
}

pub fn deserialize_certificate(encoded: &str) -> CertificateResult<Certificate> {
    Certificate::from_base64(encoded)
}

pub fn serialize_csr(csr: &CertificateSigningRequest) -> String {
    csr.to_base64()
}

pub fn deserialize_csr(encoded: &str) -> CertificateResult<CertificateSigningRequest> {
    CertificateSigningRequest::from_base64(encoded)
}

/// Build a CSR for `subject`, signed by `key` as proof of possession.
pub fn build_csr(
    key: &ServiceKeyPair,
    subject: &SubjectName,
) -> CertificateResult<CertificateSigningRequest> {
    let mut params = CertificateParams::default();
    params.distinguished_name = subject.to_distinguished_name();
    let request = params
        .serialize_request(key.key_pair())
        .map_err(generation)?;
    CertificateSigningRequest::from_der(request.der().to_vec())
}

/// Check that the CSR is signed by the private half of its embedded key.
pub fn validate_csr(csr: &CertificateSigningRequest) -> CertificateResult<()> {
    let (_, parsed) = X509CertificationRequest::from_der(csr.der()).map_err(malformed)?;
    parsed
        .verify_signature()
        .map_err(|_| CertificateError::InvalidSignature)
}

fn random_serial() -> SerialNumber {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    // Keep the DER integer positive.
    bytes[0] &= 0x7f;
    SerialNumber::from_slice(&bytes)
}

fn to_offset(at: DateTime<Utc>) -> CertificateResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(at.timestamp()).map_err(|_| CertificateError::InvalidValidity)
}

/// `[now - leeway, now + validity]`, at second precision.
fn validity_window(
    now: DateTime<Utc>,
    validity: Duration,
    leeway: Duration,
) -> CertificateResult<(OffsetDateTime, OffsetDateTime)> {
    let validity =
        chrono::Duration::from_std(validity).map_err(|_| CertificateError::InvalidValidity)?;
    let leeway = chrono::Duration::from_std(leeway).map_err(|_| CertificateError::InvalidValidity)?;
    let not_before = now
        .checked_sub_signed(leeway)
        .ok_or(CertificateError::InvalidValidity)?;
    let not_after = now
        .checked_add_signed(validity)
        .ok_or(CertificateError::InvalidValidity)?;
    Ok((to_offset(not_before)?, to_offset(not_after)?))
}

/// Issue a client certificate for the subject and public key of `csr`.
///
/// The CSR is assumed to have passed [`validate_csr`].
pub fn issue_certificate(
    ca_key: &ServiceKeyPair,
    ca_certificate: &Certificate,
    csr: &CertificateSigningRequest,
    validity: Duration,
    leeway: Duration,
    now: DateTime<Utc>,
) -> CertificateResult<Certificate> {
    let mut request =
        CertificateSigningRequestParams::from_der(&CertificateSigningRequestDer::from(csr.der()))
            .map_err(malformed)?;
    let (not_before, not_after) = validity_window(now, validity, leeway)?;

    // Only subject and public key are taken from the request.
    let mut params = CertificateParams::default();
    params.distinguished_name = csr.subject().to_distinguished_name();
    params.serial_number = Some(random_serial());
    params.not_before = not_before;
    params.not_after = not_after;
    params.is_ca = IsCa::ExplicitNoCa;
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    request.params = params;

    let issuer = Issuer::from_ca_cert_der(
        &CertificateDer::from(ca_certificate.der()),
        ca_key.key_pair(),
    )
    .map_err(generation)?;
    let signed = request.signed_by(&issuer).map_err(generation)?;

    Certificate::from_der(signed.der().to_vec())
}

/// Issue the CA's self-signed certificate.
pub fn issue_ca_certificate(
    ca_key: &ServiceKeyPair,
    subject: &SubjectName,
    validity: Duration,
    leeway: Duration,
    now: DateTime<Utc>,
) -> CertificateResult<Certificate> {
    let (not_before, not_after) = validity_window(now, validity, leeway)?;

    let mut params = CertificateParams::default();
    params.distinguished_name = subject.to_distinguished_name();
    params.serial_number = Some(random_serial());
    params.not_before = not_before;
    params.not_after = not_after;
    params.is_ca = IsCa::Ca(BasicConstraints::Constrained(1));
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::KeyEncipherment,
    ];

    let certificate = params.self_signed(ca_key.key_pair()).map_err(generation)?;
    Certificate::from_der(certificate.der().to_vec())
}

/// Validate a client certificate against the CA certificate.
///
/// Checks run in a fixed order and stop at the first failure: issuer name,
/// issuer signature, subject (when expected), public key (when expected),
/// validity window, basic constraints, key usage.
pub fn validate_certificate_chain(
    certificate: &Certificate,
    ca_certificate: &Certificate,
    expected_subject: Option<&SubjectName>,
    expected_public_key: Option<&[u8]>,
    now: DateTime<Utc>,
) -> CertificateResult<()> {
    let parsed = parse_certificate(certificate.der())?;
    let ca = parse_certificate(ca_certificate.der())?;

    if certificate.issuer() != ca_certificate.subject() {
        return Err(CertificateError::WrongIssuer);
    }
    parsed
        .verify_signature(Some(ca.public_key()))
        .map_err(|_| CertificateError::NotIssuedByCa)?;

    if let Some(expected) = expected_subject {
        if certificate.subject() != expected {
            return Err(CertificateError::WrongSubject);
        }
    }
    if let Some(expected) = expected_public_key {
        if certificate.public_key() != expected {
            return Err(CertificateError::WrongPublicKey);
        }
    }

    let now = now.timestamp();
    if now < parsed.validity().not_before.timestamp() {
        return Err(CertificateError::CertificateNotYetValid);
    }
    if now > parsed.validity().not_after.timestamp() {
        return Err(CertificateError::CertificateExpired);
    }

    match parsed.basic_constraints().map_err(malformed)? {
        None => return Err(CertificateError::MissingBasicConstraints),
        Some(constraints) if constraints.value.ca => return Err(CertificateError::CannotBeCa),
        Some(_) => {}
    }

    match parsed.key_usage().map_err(malformed)? {
        None => Err(CertificateError::MissingKeyUsage),
        Some(usage) if !usage.value.digital_signature() => {
            Err(CertificateError::CannotSignDigitally)
        }
        Some(_) => Ok(()),
    }
}
