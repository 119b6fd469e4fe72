use anyhow::{bail, Context};
use cat_core::CatConfig;
use cat_identity::{
    AuthorityError, Certificate, CertificateAuthority, CertificateError, EntityDirectory,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub struct AppState {
    pub authority: CertificateAuthority,
    /// Header carrying the end-user identity for `/creation-key`
    pub authenticated_user_header: String,
}

impl AppState {
    pub fn new(config: &CatConfig, authority: CertificateAuthority) -> Self {
        Self {
            authority,
            authenticated_user_header: config.server.authenticated_user_header.clone(),
        }
    }
}

/// Build the CA and bring its identity up before serving.
///
/// With both `server.ca_key_path` and `server.ca_certificate_path` set, an
/// existing identity is loaded from them, or a new one is generated and
/// written there. A persisted identity that has expired or was issued for a
/// different CA subject is replaced. Without the paths the identity lives
/// only in memory.
pub fn load_or_create_authority(
    config: &CatConfig,
    directory: Arc<dyn EntityDirectory>,
) -> anyhow::Result<CertificateAuthority> {
    let server = &config.server;
    let (key_path, certificate_path) = match (&server.ca_key_path, &server.ca_certificate_path) {
        (Some(key), Some(certificate)) => (Path::new(key), Path::new(certificate)),
        (None, None) => {
            let authority = CertificateAuthority::new(config, directory)?;
            authority.ca_certificate()?;
            return Ok(authority);
        }
        _ => bail!("server.ca_key_path and server.ca_certificate_path must be set together"),
    };

    if key_path.exists() && certificate_path.exists() {
        let key_pem = fs::read_to_string(key_path)
            .with_context(|| format!("reading CA key from {}", key_path.display()))?;
        let encoded = fs::read_to_string(certificate_path).with_context(|| {
            format!("reading CA certificate from {}", certificate_path.display())
        })?;
        let certificate = Certificate::from_base64(encoded.trim())?;
        match CertificateAuthority::with_material(
            config,
            Arc::clone(&directory),
            &key_pem,
            certificate,
        ) {
            Ok(authority) => {
                info!(path = %certificate_path.display(), "Loaded CA identity");
                return Ok(authority);
            }
            Err(AuthorityError::Certificate(
                err @ (CertificateError::CertificateExpired | CertificateError::WrongSubject),
            )) => {
                warn!(
                    code = err.code(),
                    path = %certificate_path.display(),
                    "Persisted CA identity is stale, generating a new one"
                );
            }
            Err(err) => return Err(err.into()),
        }
    }

    let authority = CertificateAuthority::new(config, directory)?;
    let certificate = authority.ca_certificate()?;
    let key_pem = authority
        .ca_private_key_pem()
        .context("CA key missing after initialisation")?;
    write_private(key_path, key_pem.as_bytes())
        .with_context(|| format!("writing CA key to {}", key_path.display()))?;
    fs::write(certificate_path, certificate.to_base64())
        .with_context(|| format!("writing CA certificate to {}", certificate_path.display()))?;
    info!(path = %certificate_path.display(), "Persisted new CA identity");
    Ok(authority)
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(path, contents)
}
