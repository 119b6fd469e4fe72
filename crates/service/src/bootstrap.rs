//! Client Bootstrap Agent.
//!
//! Obtains this service's client certificate from the CA and trades it for
//! the verification key of the service type. Everything fetched is cached
//! until [`BootstrapAgent::force_refresh`] is called; an expired client
//! certificate is replaced on next use.

use cat_core::CatConfig;
use cat_crypto::VerificationKey;
use cat_identity::{
    build_csr, validate_certificate_chain, Certificate, CertificateError, ServiceKeyPair,
    SubjectName,
};
use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::BootstrapError;
use crate::keystore::KeyStore;

/// Scheme under which the client certificate is presented to the CA.
pub const CERTIFICATE_AUTH_SCHEME: &str = "Certificate";

#[derive(Debug, Serialize)]
struct CsrRequest<'a> {
    csr: &'a str,
}

#[derive(Debug, Deserialize)]
struct CertificateResponse {
    certificate: String,
}

#[derive(Debug, Serialize)]
struct VerificationKeyRequest<'a> {
    #[serde(rename = "type")]
    entity_type: &'a str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerificationKeyResponse {
    verification_key: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Default)]
struct BootstrapState {
    key_pair: Option<ServiceKeyPair>,
    ca_certificate: Option<Certificate>,
    certificate: Option<Certificate>,
    verification_key: Option<VerificationKey>,
}

pub struct BootstrapAgent {
    client: reqwest::Client,
    certificate_url: String,
    verification_key_url: String,
    service_type: String,
    ca_name: String,
    subject: SubjectName,
    keys: Arc<KeyStore>,
    state: Mutex<BootstrapState>,
}

impl BootstrapAgent {
    pub fn new(config: &CatConfig, keys: Arc<KeyStore>) -> Result<Self, BootstrapError> {
        config.validate_for_bootstrap()?;
        let service = &config.service;
        let client = reqwest::Client::builder()
            .timeout(service.request_timeout())
            .build()?;

        Ok(Self {
            client,
            certificate_url: service.certificate_url.clone(),
            verification_key_url: service.verification_key_url.clone(),
            service_type: service.service_type.clone(),
            ca_name: config.common.ca_name.clone(),
            subject: SubjectName::new(service.service_name.as_str())
                .with_organization(service.service_organization.as_str()),
            keys,
            state: Mutex::new(BootstrapState::default()),
        })
    }

    /// Verification key for this service, fetched on first call.
    ///
    /// Concurrent callers wait for the same round-trip.
    pub async fn verification_key(&self) -> Result<VerificationKey, BootstrapError> {
        let mut state = self.state.lock().await;
        if let Some(key) = &state.verification_key {
            return Ok(key.clone());
        }
        self.fetch_verification_key(&mut state).await
    }

    /// Client certificate for this service, requested on first call or
    /// after the cached one expired.
    pub async fn certificate(&self) -> Result<Certificate, BootstrapError> {
        let mut state = self.state.lock().await;
        self.ensure_certificate(&mut state).await
    }

    /// Drop the key pair, certificates and verification key, then fetch
    /// everything again.
    pub async fn force_refresh(&self) -> Result<VerificationKey, BootstrapError> {
        let mut state = self.state.lock().await;
        *state = BootstrapState::default();
        self.keys.clear();
        info!(service_type = %self.service_type, "Bootstrap state invalidated");
        self.fetch_verification_key(&mut state).await
    }

    async fn fetch_verification_key(
        &self,
        state: &mut BootstrapState,
    ) -> Result<VerificationKey, BootstrapError> {
        let certificate = self.ensure_certificate(state).await?;

        let response = self
            .client
            .post(&self.verification_key_url)
            .header(
                AUTHORIZATION,
                format!("{} {}", CERTIFICATE_AUTH_SCHEME, certificate.to_base64()),
            )
            .json(&VerificationKeyRequest {
                entity_type: &self.service_type,
                name: &self.subject.common_name,
            })
            .send()
            .await?;
        let body: VerificationKeyResponse = read_json(response).await?;
        let key = VerificationKey::from_hex(body.verification_key)?;

        info!(service_type = %self.service_type, "Fetched verification key");
        self.keys.set(key.clone());
        state.verification_key = Some(key.clone());
        Ok(key)
    }

    async fn ensure_certificate(
        &self,
        state: &mut BootstrapState,
    ) -> Result<Certificate, BootstrapError> {
        let now = Utc::now();
        if let Some(certificate) = &state.certificate {
            if !certificate.is_expired(now) {
                return Ok(certificate.clone());
            }
            warn!(
                not_after = %certificate.not_after(),
                "Client certificate expired, requesting a new one"
            );
        }

        let ca_certificate = match &state.ca_certificate {
            Some(ca_certificate) if !ca_certificate.is_expired(now) => ca_certificate.clone(),
            _ => {
                let ca_certificate = self.fetch_ca_certificate().await?;
                state.ca_certificate = Some(ca_certificate.clone());
                ca_certificate
            }
        };

        let key_pair = match state.key_pair.take() {
            Some(key_pair) => key_pair,
            None => {
                debug!("Generating service key pair");
                ServiceKeyPair::generate()?
            }
        };
        let requested = self.request_certificate(&key_pair, &ca_certificate).await;
        state.key_pair = Some(key_pair);
        let certificate = requested?;

        state.certificate = Some(certificate.clone());
        Ok(certificate)
    }

    async fn request_certificate(
        &self,
        key_pair: &ServiceKeyPair,
        ca_certificate: &Certificate,
    ) -> Result<Certificate, BootstrapError> {
        let csr = build_csr(key_pair, &self.subject)?;
        let response = self
            .client
            .post(&self.certificate_url)
            .json(&CsrRequest {
                csr: &csr.to_base64(),
            })
            .send()
            .await?;
        let body: CertificateResponse = read_json(response).await?;
        let certificate = Certificate::from_base64(&body.certificate)?;

        validate_certificate_chain(
            &certificate,
            ca_certificate,
            Some(&self.subject),
            Some(key_pair.public_key()),
            Utc::now(),
        )?;

        info!(
            subject = %certificate.subject(),
            not_after = %certificate.not_after(),
            "Obtained client certificate"
        );
        Ok(certificate)
    }

    async fn fetch_ca_certificate(&self) -> Result<Certificate, BootstrapError> {
        let response = self.client.get(&self.certificate_url).send().await?;
        let body: CertificateResponse = read_json(response).await?;
        let certificate = Certificate::from_base64(&body.certificate)?;

        if certificate.subject().common_name != self.ca_name {
            warn!(
                expected = %self.ca_name,
                received = %certificate.subject(),
                "CA certificate subject mismatch"
            );
            return Err(CertificateError::WrongSubject.into());
        }
        if !certificate.is_ca() {
            return Err(CertificateError::MalformedCertificate(
                "CA certificate lacks the CA flag".to_string(),
            )
            .into());
        }
        Ok(certificate)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BootstrapError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.detail)
            .unwrap_or(text);
        return Err(BootstrapError::Status {
            status: status.as_u16(),
            detail,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| BootstrapError::InvalidResponse(e.to_string()))
}
