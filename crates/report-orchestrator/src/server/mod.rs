//! Administrative HTTP surface and process lifecycle

pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::processing::notices;
use state::AppState;

/// Owns the monitor lifecycle, the overdue watchdog and the admin server
pub struct ServerSupervisor {
    config: OrchestratorConfig,
    state: AppState,
}

impl ServerSupervisor {
    pub async fn new(config: OrchestratorConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness))
            .nest("/api", routes::api_routes())
            .nest("/admin", routes::admin_routes())
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new());

        if self.config.server.enable_cors {
            router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            router
        }
    }

    /// Start the watchdog, the monitor (when configured) and serve until shutdown
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| crate::error::Error::Config(format!("Invalid address: {}", e)))?;

        let watchdog = tokio::spawn(run_overdue_watchdog(self.state.clone()));

        if self.config.broker.autostart {
            self.state.start_monitor().await?;
        } else {
            tracing::info!("Broker autostart disabled; start via POST /admin/monitor/start");
        }

        let router = self.build_router();
        tracing::info!("Starting admin server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| crate::error::Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| crate::error::Error::Internal(format!("Server error: {}", e)))?;

        self.state.set_ready(false);
        if self.state.monitor().is_running().await {
            self.state.stop_monitor().await?;
        }
        watchdog.abort();
        tracing::info!(
            "Admin server stopped; {} job(s) still running",
            self.state.monitor().active_count()
        );
        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Warn about, and mail operators once for, every job past its declared max run time
pub async fn run_overdue_watchdog(state: AppState) {
    let mut ticker = tokio::time::interval(state.config().jobs.watchdog_interval());
    loop {
        ticker.tick().await;
        check_overdue(&state).await;
    }
}

async fn check_overdue(state: &AppState) {
    let operators = state.services().operators();
    for job in state.monitor().overdue_jobs() {
        if !job.mark_overdue_alerted() {
            continue;
        }
        let row = job.snapshot();
        tracing::warn!(
            "Job {} ('{}') is overdue: {}s elapsed, {}s declared",
            row.job_id,
            row.report_name,
            row.elapsed_secs,
            row.max_run_time_secs
        );
        if operators.is_empty() {
            continue;
        }
        let email = notices::overdue(&row, &operators);
        let mailer = state.services().mailer.clone();
        match tokio::task::spawn_blocking(move || mailer.send(&email)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Overdue alert for job {} not sent: {}", row.job_id, e),
            Err(e) => tracing::error!("Overdue alert task failed: {}", e),
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check endpoint
async fn readiness(state: axum::extract::State<AppState>) -> axum::http::StatusCode {
    if state.is_ready() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::testing::Harness;
    use crate::report::ReportFactory;
    use crate::types::{JobHandle, JobId};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_watchdog_alerts_once_per_job() {
        let harness = Harness::new(2, ReportFactory::new());
        let state = AppState::from_services(harness.services.clone());

        let job = Arc::new(JobHandle::new(JobId(11), Duration::from_millis(1)));
        harness.services.monitor.add_job(job);
        tokio::time::sleep(Duration::from_millis(5)).await;

        check_overdue(&state).await;
        check_overdue(&state).await;

        let sent = harness.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("overdue"));
    }
}
