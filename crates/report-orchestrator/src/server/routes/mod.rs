//! Routes for the administrative surface

pub mod admin;
pub mod jobs;

use axum::{
    routing::{get, post},
    Router,
};
use crate::server::state::AppState;

/// JSON API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:id", get(jobs::get_job))
        .route("/jobs/:id/abort", post(jobs::abort_job))
        .route("/audit", get(jobs::recent_audit))
        .route("/reports", get(jobs::list_reports))
        .route("/info", get(info))
}

/// Operator routes: status page, monitor lifecycle, banned list
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(admin::status_page))
        .route("/monitor", get(admin::monitor_state))
        .route("/monitor/start", post(admin::start_monitor))
        .route("/monitor/stop", post(admin::stop_monitor))
        .route("/banned", get(admin::list_banned).post(admin::add_banned))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "report-orchestrator",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Queued report runs with admission control and multi-channel delivery",
        "endpoints": {
            "GET /api/jobs": "Status of every active job",
            "GET /api/jobs/:id": "Status of one active job",
            "POST /api/jobs/:id/abort": "Abort an active job",
            "GET /api/audit": "Recent audit rows",
            "GET /api/reports": "Registered report classes",
            "GET /admin/status": "HTML status table",
            "GET /admin/monitor": "Whether the broker consumer is running",
            "POST /admin/monitor/start": "Start consuming from the broker",
            "POST /admin/monitor/stop": "Stop consuming from the broker",
            "GET /admin/banned": "Banned recipient list",
            "POST /admin/banned": "Append an email to the banned list"
        }
    }))
}
