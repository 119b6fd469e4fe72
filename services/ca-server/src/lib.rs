//! HTTP surface of the CAT certificate authority.
//!
//! | Route                    | Purpose                                   |
//! |--------------------------|-------------------------------------------|
//! | `GET /certificate`       | CA certificate, base64 DER                |
//! | `POST /certificate`      | Issue a client certificate for a CSR      |
//! | `POST /verification-key` | Verification key, client certificate auth |
//! | `POST /creation-key`     | Creation key for an authenticated user    |
//! | `GET /health`            | Liveness                                  |

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::{load_or_create_authority, AppState};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/certificate",
            get(handlers::get_certificate).post(handlers::issue_certificate),
        )
        .route("/verification-key", post(handlers::verification_key))
        .route("/creation-key", post(handlers::creation_key))
        .with_state(state)
}
