//! Job orchestration: admission, per-job state machine and delivery
//!
//! The [`QueueListener`] turns broker deliveries into jobs once the
//! [`JobMonitor`] has capacity; each job then runs to completion in a
//! [`JobProcessor`] on its own blocking worker thread.

mod listener;
mod monitor;
pub mod notices;
mod processor;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{DataSourceConfig, OrchestratorConfig};
use crate::delivery::{DeliveryChannels, FileTransfer, HttpNotifier, MailTransport};
use crate::report::ReportFactory;
use crate::storage::{banned_source, BannedListSource, ReportDb};
use crate::types::Recipient;

pub use listener::{DeliveryAcker, DeliveryOutcome, QueueListener};
pub use monitor::{AdmissionSlot, JobMonitor};
pub use processor::JobProcessor;

/// Everything a job needs from the running service, shared by every job
pub struct JobServices {
    pub config: Arc<OrchestratorConfig>,
    pub database: Arc<ReportDb>,
    pub banned: Arc<dyn BannedListSource>,
    pub factory: Arc<ReportFactory>,
    pub mailer: Arc<dyn MailTransport>,
    pub transfer: Arc<dyn FileTransfer>,
    pub notifier: Arc<dyn HttpNotifier>,
    pub monitor: Arc<JobMonitor>,
    pub data_sources: Arc<HashMap<String, DataSourceConfig>>,
}

impl JobServices {
    pub fn new(
        config: OrchestratorConfig,
        database: Arc<ReportDb>,
        factory: ReportFactory,
        channels: DeliveryChannels,
    ) -> Self {
        let banned = banned_source(&config.banned_list, database.clone());
        let monitor = Arc::new(JobMonitor::new(config.admission.ceiling));
        let data_sources = Arc::new(config.data_sources.clone());

        tracing::info!(
            "Job services ready: ceiling {}, banned list from {}, {} data source(s), reports {:?}",
            config.admission.ceiling,
            banned.describe(),
            data_sources.len(),
            factory.keys()
        );

        Self {
            config: Arc::new(config),
            database,
            banned,
            factory: Arc::new(factory),
            mailer: channels.mailer,
            transfer: channels.transfer,
            notifier: channels.notifier,
            monitor,
            data_sources,
        }
    }

    /// Configured operator addresses
    pub fn operators(&self) -> Vec<Recipient> {
        self.config
            .mail
            .operators
            .iter()
            .map(|email| Recipient::operator(email.as_str()))
            .collect()
    }
}
