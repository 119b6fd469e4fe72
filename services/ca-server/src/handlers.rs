use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::Json,
};
use cat_identity::{AuthorityError, Certificate, CertificateSigningRequest};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CsrRequest {
    pub csr: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CertificateResponse {
    pub certificate: String,
}

#[derive(Debug, Deserialize)]
pub struct VerificationKeyRequest {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerificationKeyResponse {
    pub verification_key: String,
}

#[derive(Debug, Deserialize)]
pub struct CreationKeyRequest {
    pub service: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreationKeyResponse {
    pub creation_key: String,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "cat-ca",
        "ca_ready": state.authority.is_ready(),
        "timestamp": Utc::now().to_rfc3339()
    }))
}

pub async fn get_certificate(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CertificateResponse>, ApiError> {
    let certificate = state.authority.ca_certificate()?;
    Ok(Json(CertificateResponse {
        certificate: certificate.to_base64(),
    }))
}

pub async fn issue_certificate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CsrRequest>, JsonRejection>,
) -> Result<Json<CertificateResponse>, ApiError> {
    let Json(request) = payload?;
    let csr = CertificateSigningRequest::from_base64(&request.csr).map_err(AuthorityError::from)?;

    let certificate = state.authority.issue_client_certificate(&csr).map_err(|err| {
        warn!(code = err.code(), subject = %csr.subject(), "Certificate request rejected");
        err
    })?;
    Ok(Json(CertificateResponse {
        certificate: certificate.to_base64(),
    }))
}

/// `Authorization: <scheme> <base64 certificate>`; the scheme is not checked.
fn client_certificate(headers: &HeaderMap) -> Result<Certificate, ApiError> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(ApiError::AuthenticationFailed {
            code: "missing_auth_header",
        })?
        .to_str()
        .map_err(|_| ApiError::AuthenticationFailed {
            code: "invalid_auth_header",
        })?;

    let mut parts = value.split_whitespace();
    let encoded = match (parts.next(), parts.next(), parts.next()) {
        (Some(_scheme), Some(encoded), None) => encoded,
        _ => {
            return Err(ApiError::AuthenticationFailed {
                code: "invalid_auth_header",
            })
        }
    };

    Certificate::from_base64(encoded).map_err(|err| ApiError::AuthenticationFailed { code: err.code() })
}

pub async fn verification_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<VerificationKeyRequest>, JsonRejection>,
) -> Result<Json<VerificationKeyResponse>, ApiError> {
    let certificate = client_certificate(&headers).map_err(|err| {
        warn!(code = err.code(), "Verification key request not authenticated");
        err
    })?;
    let Json(request) = payload?;

    match state
        .authority
        .verification_key(&certificate, &request.entity_type, &request.name)
    {
        Ok(key) => {
            info!(
                service_type = %request.entity_type,
                entity = %request.name,
                "Verification key issued"
            );
            Ok(Json(VerificationKeyResponse {
                verification_key: key.as_hex().to_string(),
            }))
        }
        Err(AuthorityError::Certificate(err)) => {
            Err(ApiError::AuthenticationFailed { code: err.code() })
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn creation_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreationKeyRequest>, JsonRejection>,
) -> Result<Json<CreationKeyResponse>, ApiError> {
    let identity = headers
        .get(state.authenticated_user_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::AuthenticationFailed {
            code: "not_authenticated",
        })?;
    let Json(request) = payload?;

    let key = state.authority.creation_key(&request.service, identity)?;
    Ok(Json(CreationKeyResponse {
        creation_key: key.as_hex().to_string(),
    }))
}
