use anyhow::Context;
use cat_core::{logging, CatConfig};
use cat_identity::InMemoryDirectory;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use cat_ca_server::{load_or_create_authority, router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CatConfig::load().context("loading configuration")?;
    logging::init_from_settings(&config.log);

    let directory = InMemoryDirectory::from_records(&config.server.entities);
    info!(entities = directory.len(), "Entity directory seeded");

    let authority = load_or_create_authority(&config, Arc::new(directory))?;
    info!(ca = %authority.subject(), "Certificate authority ready");

    let state = Arc::new(AppState::new(&config, authority));
    let app = router(state);

    let listener = TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    info!("CAT CA listening on {}", config.server.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
