//! CA Authority.
//!
//! Owns the root secret, the CA key pair and the CA certificate. The key pair
//! and certificate are created exactly once, on first use, unless persisted
//! material is supplied up front with [`CertificateAuthority::with_material`].

use cat_core::CatConfig;
use cat_crypto::{CreationKey, KeyDerivation, RootSecret, VerificationKey};
use chrono::Utc;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::directory::EntityDirectory;
use crate::error::{AuthorityError, AuthorityResult, CertificateError};
use crate::pki::{
    issue_ca_certificate, issue_certificate, validate_certificate_chain, validate_csr, Certificate,
    CertificateSigningRequest, ServiceKeyPair, SubjectName,
};

struct CaMaterial {
    key: ServiceKeyPair,
    certificate: Certificate,
}

pub struct CertificateAuthority {
    subject: SubjectName,
    root: RootSecret,
    derivation: KeyDerivation,
    ca_validity: Duration,
    client_validity: Duration,
    leeway: Duration,
    directory: Arc<dyn EntityDirectory>,
    material: OnceLock<CaMaterial>,
    init_lock: Mutex<()>,
}

impl CertificateAuthority {
    /// Create an authority whose key pair and certificate are generated on
    /// first use.
    pub fn new(config: &CatConfig, directory: Arc<dyn EntityDirectory>) -> AuthorityResult<Self> {
        config.validate_for_ca()?;
        Ok(Self {
            subject: SubjectName::new(config.common.ca_name.as_str())
                .with_organization(config.ca.organization.as_str()),
            root: RootSecret::from(&config.ca.root_key),
            derivation: KeyDerivation::new(config.common.prf),
            ca_validity: config.ca.ca_certificate_validity(),
            client_validity: config.ca.client_certificate_validity(),
            leeway: config.ca.leeway(),
            directory,
            material: OnceLock::new(),
            init_lock: Mutex::new(()),
        })
    }

    /// Create an authority from a persisted key pair and CA certificate.
    ///
    /// The certificate must still be valid and carry the configured CA subject.
    pub fn with_material(
        config: &CatConfig,
        directory: Arc<dyn EntityDirectory>,
        key_pem: &str,
        certificate: Certificate,
    ) -> AuthorityResult<Self> {
        let authority = Self::new(config, directory)?;
        let key = ServiceKeyPair::from_pem(key_pem)?;
        if key.public_key() != certificate.public_key() {
            return Err(CertificateError::WrongPublicKey.into());
        }
        if !certificate.is_ca() {
            return Err(CertificateError::MalformedCertificate(
                "persisted CA certificate is not a CA certificate".to_string(),
            )
            .into());
        }
        if certificate.subject() != authority.subject() {
            return Err(CertificateError::WrongSubject.into());
        }
        if certificate.is_expired(Utc::now()) {
            return Err(CertificateError::CertificateExpired.into());
        }
        // A fresh OnceLock cannot already be set.
        let _ = authority.material.set(CaMaterial { key, certificate });
        Ok(authority)
    }

    pub fn subject(&self) -> &SubjectName {
        &self.subject
    }

    pub fn is_ready(&self) -> bool {
        self.material.get().is_some()
    }

    fn material(&self) -> AuthorityResult<&CaMaterial> {
        if let Some(material) = self.material.get() {
            return Ok(material);
        }

        // Serialize first use so exactly one key pair is ever generated.
        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(material) = self.material.get() {
            return Ok(material);
        }

        let key = ServiceKeyPair::generate()?;
        let certificate =
            issue_ca_certificate(&key, &self.subject, self.ca_validity, self.leeway, Utc::now())?;
        info!(
            subject = %self.subject,
            not_after = %certificate.not_after(),
            "Generated CA key pair and certificate"
        );
        Ok(self.material.get_or_init(|| CaMaterial { key, certificate }))
    }

    /// The CA certificate, creating the CA identity on first call.
    pub fn ca_certificate(&self) -> AuthorityResult<Certificate> {
        Ok(self.material()?.certificate.clone())
    }

    /// PEM private key of the CA for persistence by the host. `None` until
    /// the CA identity exists.
    pub fn ca_private_key_pem(&self) -> Option<Zeroizing<String>> {
        self.material.get().map(|material| material.key.to_pem())
    }

    /// Validate a CSR and issue a client certificate for it.
    pub fn issue_client_certificate(
        &self,
        csr: &CertificateSigningRequest,
    ) -> AuthorityResult<Certificate> {
        validate_csr(csr)?;
        let material = self.material.get().ok_or(AuthorityError::CaNotReady)?;

        let certificate = issue_certificate(
            &material.key,
            &material.certificate,
            csr,
            self.client_validity,
            self.leeway,
            Utc::now(),
        )?;
        info!(
            subject = %certificate.subject(),
            not_after = %certificate.not_after(),
            "Issued client certificate"
        );
        Ok(certificate)
    }

    /// Check that a presented certificate is a valid client certificate
    /// issued by this CA. No subject or key is presumed.
    pub fn authenticate_client(&self, certificate: &Certificate) -> AuthorityResult<()> {
        let material = self.material.get().ok_or(AuthorityError::CaNotReady)?;
        validate_certificate_chain(certificate, &material.certificate, None, None, Utc::now())
            .map_err(|err| {
                warn!(code = err.code(), subject = %certificate.subject(), "Client certificate rejected");
                AuthorityError::from(err)
            })
    }

    /// Verification key for `service_type`, released to a caller holding a
    /// valid client certificate for a registered entity.
    pub fn verification_key(
        &self,
        client_certificate: &Certificate,
        service_type: &str,
        entity_name: &str,
    ) -> AuthorityResult<VerificationKey> {
        self.authenticate_client(client_certificate)?;

        if !self.directory.entity_exists(service_type, entity_name) {
            warn!(service_type, entity = entity_name, "Unknown service entity");
            return Err(AuthorityError::EntityNotFound {
                entity_type: service_type.to_string(),
                name: entity_name.to_string(),
            });
        }

        debug!(service_type, entity = entity_name, "Releasing verification key");
        Ok(self.derivation.verification_key(&self.root, service_type))
    }

    /// Creation key for an identity already authenticated by the caller.
    pub fn creation_key(&self, service_type: &str, identity: &str) -> AuthorityResult<CreationKey> {
        if !self.directory.entity_type_exists(service_type) {
            warn!(service_type, "Unknown service entity type");
            return Err(AuthorityError::EntityTypeNotFound {
                name: service_type.to_string(),
            });
        }

        debug!(service_type, "Releasing creation key");
        Ok(self
            .derivation
            .creation_key_from_root(&self.root, service_type, identity))
    }
}
