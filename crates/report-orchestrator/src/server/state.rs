//! Application state for the orchestrator server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::broker;
use crate::config::OrchestratorConfig;
use crate::delivery::{DeliveryChannels, FtpTransfer, ReqwestNotifier, SmtpMailer};
use crate::error::Result;
use crate::processing::{JobMonitor, JobServices, QueueListener};
use crate::report::ReportFactory;
use crate::storage::ReportDb;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Everything jobs share: config, database, channels, monitor
    services: Arc<JobServices>,
    /// Consumer-side entry point for broker deliveries
    listener: Arc<QueueListener>,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create state with the production delivery channels and built-in reports
    pub async fn new(config: OrchestratorConfig) -> Result<Self> {
        tracing::info!("Initializing orchestrator state...");

        let database = Arc::new(ReportDb::new(&config.database.path)?);
        tracing::info!("Report database opened at {:?}", config.database.path);

        let channels = DeliveryChannels {
            mailer: Arc::new(SmtpMailer::new(&config.mail)?),
            transfer: Arc::new(FtpTransfer::new()),
            notifier: Arc::new(ReqwestNotifier::new()?),
        };
        tracing::info!("Mail relay {}:{}", config.mail.smtp_host, config.mail.smtp_port);

        Self::with_parts(config, database, ReportFactory::with_builtin_reports(), channels)
    }

    /// Create state from explicit parts
    pub fn with_parts(
        config: OrchestratorConfig,
        database: Arc<ReportDb>,
        factory: ReportFactory,
        channels: DeliveryChannels,
    ) -> Result<Self> {
        for key in factory.keys() {
            if database.report_id(&key)?.is_none() {
                database.register_report(&key, &key)?;
            }
        }

        let services = Arc::new(JobServices::new(config, database, factory, channels));
        Ok(Self::from_services(services))
    }

    /// State around already-built services
    pub fn from_services(services: Arc<JobServices>) -> Self {
        let listener = Arc::new(QueueListener::new(services.clone()));
        Self {
            inner: Arc::new(AppStateInner {
                services,
                listener,
                ready: RwLock::new(true),
            }),
        }
    }

    pub fn services(&self) -> &Arc<JobServices> {
        &self.inner.services
    }

    pub fn monitor(&self) -> &Arc<JobMonitor> {
        &self.inner.services.monitor
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.services.config
    }

    /// Start consuming from the broker
    pub async fn start_monitor(&self) -> Result<()> {
        let listener = self.inner.listener.clone();
        let broker = self.config().broker.clone();
        self.monitor()
            .start(move |stop| broker::run_consumer(broker, listener, stop))
            .await
    }

    pub async fn stop_monitor(&self) -> Result<()> {
        self.monitor().stop().await
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
