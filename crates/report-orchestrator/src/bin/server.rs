//! Report orchestrator binary
//!
//! Run with: cargo run -p report-orchestrator --bin report-orchestrator-server
//! Set REPORT_ORCHESTRATOR_CONFIG to a TOML file to override the defaults.

use report_orchestrator::{OrchestratorConfig, ServerSupervisor};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "report_orchestrator=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                   Report Orchestrator                     ║
║        Queued report runs with multi-channel delivery     ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let config = OrchestratorConfig::from_env()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Broker: {} (queue {})", redact_uri(&config.broker.uri), config.broker.queue);
    tracing::info!("  - Concurrency ceiling: {}", config.admission.ceiling);
    tracing::info!("  - Database: {}", config.database.path.display());
    tracing::info!("  - Work dir: {}", config.jobs.work_dir.display());
    tracing::info!("  - Mail relay: {}:{}", config.mail.smtp_host, config.mail.smtp_port);

    let server = ServerSupervisor::new(config).await?;

    println!("\nServer starting...");
    println!("  Admin: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  GET  /api/jobs             - Active jobs");
    println!("  POST /api/jobs/:id/abort   - Abort a job");
    println!("  GET  /admin/status         - HTML status table");
    println!("  POST /admin/monitor/start  - Start consuming");
    println!("  POST /admin/monitor/stop   - Stop consuming");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}

/// Hide the password part of an AMQP URI
fn redact_uri(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let userinfo = &uri[scheme_end + 3..at];
            let user = userinfo.split(':').next().unwrap_or_default();
            format!("{}://{}:***@{}", &uri[..scheme_end], user, &uri[at + 1..])
        }
        _ => uri.to_string(),
    }
}
