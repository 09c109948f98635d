//! Job status, abort and audit endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::storage::{AuditRecord, ReportRegistration};
use crate::types::{JobId, StatusReport, StatusSnapshot};

const DEFAULT_AUDIT_LIMIT: usize = 50;
const MAX_AUDIT_LIMIT: usize = 1000;

/// GET /api/jobs - Status of every active job
pub async fn list_jobs(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.monitor().render_status_report())
}

/// GET /api/jobs/:id - Status of one active job
pub async fn get_job(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Json<StatusSnapshot>> {
    let job = state.monitor().get_job(JobId(id)).ok_or(Error::JobNotFound(id))?;
    Ok(Json(job.snapshot()))
}

#[derive(Debug, Serialize)]
pub struct AbortResponse {
    pub job_id: JobId,
    pub status: String,
    pub message: String,
}

/// POST /api/jobs/:id/abort - Mark a job ABORTED and cancel it
pub async fn abort_job(State(state): State<AppState>, Path(id): Path<u64>) -> Result<Json<AbortResponse>> {
    let job_id = JobId(id);
    state.monitor().abort_job(job_id)?;
    let status = state
        .monitor()
        .get_job(job_id)
        .map(|job| job.status().to_string())
        .unwrap_or_else(|| "ABORTED".to_string());

    Ok(Json(AbortResponse {
        job_id,
        status,
        message: "Abort requested; the report stops at its next cancellation check".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
    pub job_id: Option<u64>,
}

/// GET /api/audit - Recent audit rows, or every row for one job
pub async fn recent_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditRecord>>> {
    let database = state.services().database.clone();
    let rows = tokio::task::spawn_blocking(move || match query.job_id {
        Some(job_id) => database.audit_for_job(job_id),
        None => database.recent_audit(query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT).min(MAX_AUDIT_LIMIT)),
    })
    .await
    .map_err(|e| Error::Internal(format!("Audit query task failed: {}", e)))??;
    Ok(Json(rows))
}

#[derive(Debug, Serialize)]
pub struct ReportsResponse {
    /// Classes with an implementation in this process
    pub implemented: Vec<String>,
    /// Classes known to the report database
    pub registered: Vec<ReportRegistration>,
}

/// GET /api/reports - Implemented and registered report classes
pub async fn list_reports(State(state): State<AppState>) -> Result<Json<ReportsResponse>> {
    let database = state.services().database.clone();
    let registered = tokio::task::spawn_blocking(move || database.list_reports())
        .await
        .map_err(|e| Error::Internal(format!("Report registry task failed: {}", e)))??;
    Ok(Json(ReportsResponse {
        implemented: state.services().factory.keys(),
        registered,
    }))
}
