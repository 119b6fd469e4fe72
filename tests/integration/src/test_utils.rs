//! Fixtures shared by the end-to-end tests

use cat_ca_server::{load_or_create_authority, router, AppState};
use cat_core::{CatConfig, EntityRecord, SecretString};
use cat_identity::InMemoryDirectory;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const ROOT_SECRET: &str = "secret";
pub const CA_NAME: &str = "cat-ca";
pub const SERVICE_TYPE: &str = "billing";
pub const ENTITY_NAME: &str = "svc-1";

/// Install a test subscriber once per process.
pub fn init_tracing() {
    let _ = cat_core::logging::try_init("debug");
}

/// CA configuration with `billing/svc-1` registered.
pub fn ca_config() -> CatConfig {
    let mut config = CatConfig::default();
    config.common.ca_name = CA_NAME.to_string();
    config.ca.root_key = SecretString::new(ROOT_SECRET);
    config.ca.organization = "CAT Test".to_string();
    config.server.entities = vec![EntityRecord {
        entity_type: SERVICE_TYPE.to_string(),
        name: ENTITY_NAME.to_string(),
    }];
    config
}

/// Service configuration pointing at a CA served from `base_url`.
pub fn service_config(base_url: &str, service_name: &str) -> CatConfig {
    let mut config = CatConfig::default();
    config.common.ca_name = CA_NAME.to_string();
    config.service.service_type = SERVICE_TYPE.to_string();
    config.service.service_name = service_name.to_string();
    config.service.certificate_url = format!("{}/certificate", base_url);
    config.service.verification_key_url = format!("{}/verification-key", base_url);
    config.service.request_timeout_secs = 5;
    config
}

/// A CA server bound to an ephemeral local port.
pub struct TestCa {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl TestCa {
    pub async fn spawn(config: &CatConfig) -> Self {
        let directory = InMemoryDirectory::from_records(&config.server.entities);
        let authority =
            load_or_create_authority(config, Arc::new(directory)).expect("CA should initialise");
        let app = router(Arc::new(AppState::new(config, authority)));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("listener has an address");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { addr, handle }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestCa {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
