//! Certificate endpoints.
//!
//! - `GET /`: issue form
//! - `POST /generate`: issue a certificate for a form-encoded `name`
//! - `GET /download/{id}`: the PDF as an attachment
//! - `GET /verify/{id}`: public verification page

use axum::{
    extract::{Path, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{Html, IntoResponse},
    routing::{get, post},
    Form, Router,
};
use certify_id::CertificateId;
use serde::Deserialize;
use tracing::{error, warn};

use super::error::ApiError;
use super::pages;
use crate::name::CertificateName;
use crate::service::ServiceError;
use crate::state::AppState;

/// Create certificate routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/generate", post(generate))
        .route("/download/{id}", get(download))
        .route("/verify/{id}", get(verify))
}

/// Form submitted to `/generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateForm {
    #[serde(default)]
    pub name: String,
}

fn not_found() -> ApiError {
    ApiError::not_found("certificate_not_found", "Certificate not found.")
}

/// Unknown and malformed ids are indistinguishable to the caller.
fn parse_id(raw: &str) -> Result<CertificateId, ApiError> {
    CertificateId::parse(raw).map_err(|_| not_found())
}

async fn index() -> Html<String> {
    Html(pages::index())
}

/// Issue a certificate.
///
/// POST /generate
async fn generate(
    State(state): State<AppState>,
    Form(form): Form<GenerateForm>,
) -> Result<Html<String>, ApiError> {
    let name = CertificateName::parse(&form.name)
        .map_err(|e| ApiError::bad_request("invalid_name", format!("Invalid name: {e}.")))?;

    let issued = state.service().issue(name).await.map_err(|e| {
        error!(error = %e, "Failed to issue certificate");
        match e {
            ServiceError::Write(_) => ApiError::internal("write_failed", "Error writing file."),
            ServiceError::Save(_) => ApiError::internal("save_failed", "Error saving certificate."),
            _ => ApiError::internal("generate_failed", "Error generating certificate."),
        }
    })?;

    Ok(Html(pages::generated(
        &issued.download_url,
        &issued.verification_url,
        &issued.qr_data_url,
    )))
}

/// Download the certificate PDF.
///
/// GET /download/{id}
async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;

    let pdf = state.service().download(&id).await.map_err(|e| match e {
        ServiceError::NotFound => not_found(),
        e => {
            error!(certificate_id = %id, error = %e, "Failed to download certificate");
            ApiError::internal("download_failed", "Error downloading certificate.")
        }
    })?;

    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{id}.pdf\"")),
        ],
        pdf,
    ))
}

/// Show the verification page.
///
/// GET /verify/{id}
async fn verify(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let id = parse_id(&id)?;

    let record = state.service().verify(&id).await.map_err(|e| match e {
        ServiceError::NotFound => not_found(),
        e => {
            warn!(certificate_id = %id, error = %e, "Failed to verify certificate");
            ApiError::internal("verify_failed", "Error verifying certificate.")
        }
    })?;

    Ok(Html(pages::verification(&record)))
}
