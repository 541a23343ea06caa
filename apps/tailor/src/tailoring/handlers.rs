//! Axum route handlers for the Tailoring API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::models::document::ResumeFile;
use crate::pipeline::validator::{validate, ValidationReport};
use crate::pipeline::RunReport;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TailorRequest {
    /// Full CV file: a top-level `cv` key plus any renderer settings.
    pub cv_yaml: String,
    pub job_ad: String,
}

#[derive(Debug, Serialize)]
pub struct TailorResponse {
    pub cv_yaml: String,
    pub report: RunReport,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub cv_yaml: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/tailor
///
/// Runs the full pipeline and returns the tailored file with the run report.
/// Step failures are reported in `report`; only unusable input is an error.
pub async fn handle_tailor(
    State(state): State<AppState>,
    Json(request): Json<TailorRequest>,
) -> Result<Json<TailorResponse>, AppError> {
    if request.cv_yaml.trim().is_empty() {
        return Err(AppError::Validation("cv_yaml cannot be empty".to_string()));
    }
    let ResumeFile { cv, extra } = ResumeFile::from_yaml_str(&request.cv_yaml)?;

    let run = state.pipeline.run(cv, &request.job_ad).await?;
    let report = run.report();
    info!(
        "Tailoring run {} returned {} errors, {} warnings",
        report.run_id,
        report.errors.len(),
        report.warnings.len()
    );

    let tailored = ResumeFile {
        cv: run.document,
        extra,
    };
    Ok(Json(TailorResponse {
        cv_yaml: tailored.to_yaml_string()?,
        report,
    }))
}

/// POST /api/v1/validate
///
/// Structural check of a CV file without any model calls.
pub async fn handle_validate(
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidationReport>, AppError> {
    let file = ResumeFile::from_yaml_str(&request.cv_yaml)?;
    Ok(Json(validate(&file.cv)))
}
