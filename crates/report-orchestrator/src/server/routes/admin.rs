//! Operator endpoints: status page, monitor lifecycle, banned list

use axum::{
    extract::State,
    response::Html,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::StatusReport;

/// GET /admin/status - HTML status table
pub async fn status_page(State(state): State<AppState>) -> Html<String> {
    Html(render_status_html(&state.monitor().render_status_report()))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_status_html(report: &StatusReport) -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><head><title>Report jobs</title></head><body>",
    );
    html.push_str(&format!(
        "<h1>Active jobs: {} of {}</h1><p>As of {}</p>",
        report.active,
        report.ceiling,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str(
        "<table border=\"1\"><tr><th>ID</th><th>Report</th><th>User</th><th>Status</th>\
         <th>Elapsed</th><th>Max (h)</th><th>Files</th><th>Action</th></tr>",
    );
    for row in &report.rows {
        let (h, m, s) = row.elapsed_hms();
        html.push_str(&format!(
            "<tr{}><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}:{:02}:{:02}</td>\
             <td>{:.2}</td><td>{}</td><td>{}</td></tr>",
            if row.is_overdue() { " style=\"background:#fdd\"" } else { "" },
            row.job_id,
            escape(&row.report_name),
            escape(&row.user),
            row.status,
            h,
            m,
            s,
            row.max_run_time_hours(),
            row.files_produced,
            escape(&row.current_action),
        ));
    }
    html.push_str("</table></body></html>");
    html
}

#[derive(Debug, Serialize)]
pub struct MonitorState {
    pub running: bool,
    pub active: usize,
    pub ceiling: usize,
}

async fn monitor_state_of(state: &AppState) -> MonitorState {
    MonitorState {
        running: state.monitor().is_running().await,
        active: state.monitor().active_count(),
        ceiling: state.monitor().ceiling(),
    }
}

/// GET /admin/monitor
pub async fn monitor_state(State(state): State<AppState>) -> Json<MonitorState> {
    Json(monitor_state_of(&state).await)
}

/// POST /admin/monitor/start
pub async fn start_monitor(State(state): State<AppState>) -> Result<Json<MonitorState>> {
    state.start_monitor().await?;
    Ok(Json(monitor_state_of(&state).await))
}

/// POST /admin/monitor/stop - Stop consuming; running jobs finish on their own
pub async fn stop_monitor(State(state): State<AppState>) -> Result<Json<MonitorState>> {
    state.stop_monitor().await?;
    Ok(Json(monitor_state_of(&state).await))
}

#[derive(Debug, Serialize)]
pub struct BannedResponse {
    pub source: String,
    pub emails: Vec<String>,
}

/// GET /admin/banned
pub async fn list_banned(State(state): State<AppState>) -> Result<Json<BannedResponse>> {
    let banned = state.services().banned.clone();
    let response = tokio::task::spawn_blocking(move || -> Result<BannedResponse> {
        let mut emails = banned.load()?.emails();
        emails.sort();
        Ok(BannedResponse {
            source: banned.describe(),
            emails,
        })
    })
    .await
    .map_err(|e| Error::Internal(format!("Banned list task failed: {}", e)))??;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct AddBannedRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct AddBannedResponse {
    pub email: String,
    pub added: bool,
}

/// POST /admin/banned - Append an email; the list is never shrunk here
pub async fn add_banned(
    State(state): State<AppState>,
    Json(request): Json<AddBannedRequest>,
) -> Result<Json<AddBannedResponse>> {
    let email = request.email.trim().to_string();
    if !email.contains('@') {
        return Err(Error::Config(format!("'{}' is not an email address", email)));
    }
    let banned = state.services().banned.clone();
    let to_add = email.clone();
    let added = tokio::task::spawn_blocking(move || banned.append(&to_add))
        .await
        .map_err(|e| Error::Internal(format!("Banned list task failed: {}", e)))??;
    tracing::info!("Banned list append {}: {}", email, if added { "added" } else { "already present" });
    Ok(Json(AddBannedResponse { email, added }))
}
