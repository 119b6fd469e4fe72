//! Configuration management for CAT.
//!
//! A single [`CatConfig`] is built once at startup (TOML file, then
//! environment overrides) and handed to every component by reference. It is
//! never mutated afterwards.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::types::{IdentityKind, PseudoRandomFunction, SecretString};
use crate::{Error, Result};

/// Environment variable naming the TOML configuration file.
pub const CONFIG_PATH_ENV: &str = "CAT_CONFIG";

const TEN_DAYS_SECS: u64 = 10 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatConfig {
    pub common: CommonSettings,
    pub ca: CaSettings,
    pub service: ServiceSettings,
    pub server: ServerSettings,
    pub log: LogSettings,
}

/// Settings shared by the CA and by participating services.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommonSettings {
    /// Common name of the certificate authority
    pub ca_name: String,
    pub prf: PseudoRandomFunction,
    pub identity_kind: IdentityKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaSettings {
    /// Root of the key-derivation chain. Never leaves the CA process.
    pub root_key: SecretString,
    pub organization: String,
    pub ca_certificate_validity_secs: u64,
    pub client_certificate_validity_secs: u64,
    /// Subtracted from every certificate's start of validity
    pub leeway_secs: u64,
}

impl Default for CaSettings {
    fn default() -> Self {
        Self {
            root_key: SecretString::default(),
            organization: String::new(),
            ca_certificate_validity_secs: TEN_DAYS_SECS,
            client_certificate_validity_secs: TEN_DAYS_SECS,
            leeway_secs: 1,
        }
    }
}

impl CaSettings {
    pub fn ca_certificate_validity(&self) -> Duration {
        Duration::from_secs(self.ca_certificate_validity_secs)
    }

    pub fn client_certificate_validity(&self) -> Duration {
        Duration::from_secs(self.client_certificate_validity_secs)
    }

    pub fn leeway(&self) -> Duration {
        Duration::from_secs(self.leeway_secs)
    }
}

/// Settings of a service that authenticates CAT requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Type this service is (the scope of its verification key)
    pub service_type: String,
    /// Name of this service instance, used as certificate subject
    pub service_name: String,
    pub service_organization: String,
    pub auth_scheme: String,
    pub header_prefix: String,
    /// Additional valid CAT headers in the form `CAT-{Name-In-Header-Case}`
    pub additional_valid_headers: Vec<String>,
    /// Additional required CAT headers in the form `CAT-{Name-In-Header-Case}`
    pub additional_required_headers: Vec<String>,
    pub certificate_url: String,
    pub verification_key_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            service_type: String::new(),
            service_name: String::new(),
            service_organization: String::new(),
            auth_scheme: "CAT".to_string(),
            header_prefix: "CAT".to_string(),
            additional_valid_headers: Vec::new(),
            additional_required_headers: Vec::new(),
            certificate_url: String::new(),
            verification_key_url: String::new(),
            request_timeout_secs: 10,
        }
    }
}

impl ServiceSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// One `(type, name)` record seeded into the CA's entity directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntityRecord {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub ca_key_path: Option<String>,
    pub ca_certificate_path: Option<String>,
    /// Header carrying the caller identity established by the fronting
    /// authentication layer (used by `/creation-key`)
    pub authenticated_user_header: String,
    pub entities: Vec<EntityRecord>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            ca_key_path: None,
            ca_certificate_path: None,
            authenticated_user_header: "x-authenticated-user".to_string(),
            entities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl CatConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from the file named by `CAT_CONFIG` (if any), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply `CAT_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("CAT_ROOT_KEY") {
            self.ca.root_key = SecretString::new(value);
        }
        if let Some(value) = lookup("CAT_CA_NAME") {
            self.common.ca_name = value;
        }
        if let Some(value) = lookup("CAT_PRF") {
            self.common.prf = value.parse()?;
        }
        if let Some(value) = lookup("CAT_SERVICE_TYPE") {
            self.service.service_type = value;
        }
        if let Some(value) = lookup("CAT_SERVICE_NAME") {
            self.service.service_name = value;
        }
        if let Some(value) = lookup("CAT_CERTIFICATE_URL") {
            self.service.certificate_url = value;
        }
        if let Some(value) = lookup("CAT_VERIFICATION_KEY_URL") {
            self.service.verification_key_url = value;
        }
        if let Some(value) = lookup("CAT_BIND_ADDR") {
            self.server.bind_addr = value;
        }
        Ok(())
    }

    /// Check everything the certificate authority needs.
    pub fn validate_for_ca(&self) -> Result<()> {
        if self.ca.root_key.is_empty() {
            return Err(Error::MissingSetting("ca.root_key"));
        }
        if self.common.ca_name.is_empty() {
            return Err(Error::MissingSetting("common.ca_name"));
        }
        if self.ca.client_certificate_validity_secs == 0 {
            return Err(Error::InvalidSetting {
                name: "ca.client_certificate_validity_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Check everything a service needs to authenticate inbound requests.
    pub fn validate_for_authentication(&self) -> Result<()> {
        if self.service.service_type.is_empty() {
            return Err(Error::MissingSetting("service.service_type"));
        }
        if self.service.auth_scheme.is_empty() {
            return Err(Error::MissingSetting("service.auth_scheme"));
        }
        if self.service.header_prefix.is_empty() {
            return Err(Error::MissingSetting("service.header_prefix"));
        }
        Ok(())
    }

    /// Check everything a service needs to bootstrap its verification key.
    pub fn validate_for_bootstrap(&self) -> Result<()> {
        self.validate_for_authentication()?;
        if self.service.service_name.is_empty() {
            return Err(Error::MissingSetting("service.service_name"));
        }
        if self.service.certificate_url.is_empty() {
            return Err(Error::MissingSetting("service.certificate_url"));
        }
        if self.service.verification_key_url.is_empty() {
            return Err(Error::MissingSetting("service.verification_key_url"));
        }
        if self.common.ca_name.is_empty() {
            return Err(Error::MissingSetting("common.ca_name"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
        [common]
        ca_name = "cat-ca"
        prf = "sha512"
        identity_kind = "integer"

        [ca]
        root_key = "s3cret"
        leeway_secs = 5

        [service]
        service_type = "billing"
        service_name = "billing-1"
        additional_valid_headers = ["CAT-Tenant"]

        [server]
        bind_addr = "127.0.0.1:9000"
        entities = [{ type = "billing", name = "billing-1" }]
    "#;

    #[test]
    fn test_parse_toml() {
        let config = CatConfig::from_toml(SAMPLE).unwrap();

        assert_eq!(config.common.ca_name, "cat-ca");
        assert_eq!(config.common.prf, PseudoRandomFunction::Sha512);
        assert_eq!(config.common.identity_kind, IdentityKind::Integer);
        assert_eq!(config.ca.root_key.expose(), "s3cret");
        assert_eq!(config.ca.leeway(), Duration::from_secs(5));
        assert_eq!(config.ca.client_certificate_validity_secs, TEN_DAYS_SECS);
        assert_eq!(config.service.auth_scheme, "CAT");
        assert_eq!(config.service.additional_valid_headers, vec!["CAT-Tenant"]);
        assert_eq!(
            config.server.entities,
            vec![EntityRecord {
                entity_type: "billing".to_string(),
                name: "billing-1".to_string()
            }]
        );
    }

    #[test]
    fn test_file_values_parse_like_env_values() {
        let config = CatConfig::from_toml(
            r#"
            [common]
            prf = "SHA384"
            identity_kind = "int"
            "#,
        )
        .unwrap();
        assert_eq!(config.common.prf, PseudoRandomFunction::Sha384);
        assert_eq!(config.common.identity_kind, IdentityKind::Integer);

        let result = CatConfig::from_toml("[common]\nprf = \"md5\"\n");
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_defaults() {
        let config = CatConfig::default();
        assert_eq!(config.common.prf, PseudoRandomFunction::Sha256);
        assert_eq!(config.service.header_prefix, "CAT");
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CAT_ROOT_KEY", "from-env"),
            ("CAT_SERVICE_TYPE", "search"),
            ("CAT_PRF", "sha384"),
        ]
        .into_iter()
        .collect();

        let mut config = CatConfig::from_toml(SAMPLE).unwrap();
        config
            .apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.ca.root_key.expose(), "from-env");
        assert_eq!(config.service.service_type, "search");
        assert_eq!(config.common.prf, PseudoRandomFunction::Sha384);
        assert_eq!(config.service.service_name, "billing-1");
    }

    #[test]
    fn test_invalid_prf_override() {
        let mut config = CatConfig::default();
        let result = config.apply_overrides(|name| (name == "CAT_PRF").then(|| "md5".to_string()));
        assert!(matches!(result, Err(Error::InvalidSetting { name: "prf", .. })));
    }

    #[test]
    fn test_missing_root_key() {
        let mut config = CatConfig::default();
        config.common.ca_name = "ca".to_string();
        assert!(matches!(
            config.validate_for_ca(),
            Err(Error::MissingSetting("ca.root_key"))
        ));

        config.ca.root_key = SecretString::new("root");
        assert!(config.validate_for_ca().is_ok());
    }

    #[test]
    fn test_bootstrap_requires_urls() {
        let mut config = CatConfig::from_toml(SAMPLE).unwrap();
        assert!(matches!(
            config.validate_for_bootstrap(),
            Err(Error::MissingSetting("service.certificate_url"))
        ));

        config.service.certificate_url = "http://ca/certificate".to_string();
        config.service.verification_key_url = "http://ca/verification-key".to_string();
        assert!(config.validate_for_bootstrap().is_ok());
    }

    #[test]
    fn test_unreadable_file() {
        let path = std::env::temp_dir().join(format!("cat-missing-{}.toml", uuid::Uuid::new_v4()));
        assert!(matches!(CatConfig::from_file(path), Err(Error::Io(_))));
    }
}
