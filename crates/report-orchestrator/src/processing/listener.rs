//! Bridges broker deliveries to jobs under the admission ceiling

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{JobProcessor, JobServices};
use crate::error::Result;
use crate::types::JobId;

/// Acknowledgement handle for one delivery
#[async_trait]
pub trait DeliveryAcker: Send + Sync {
    async fn ack(&self) -> Result<()>;

    /// Negative acknowledgement
    async fn reject(&self, requeue: bool) -> Result<()>;
}

/// What became of one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// A job was started and the delivery acknowledged
    Dispatched(JobId),
    /// Empty body; left unacknowledged
    EmptyBody,
    /// Stop raised while waiting for capacity; neither acked nor rejected
    Cancelled,
    /// Dispatch failed; rejected with requeue
    Requeued,
}

pub struct QueueListener {
    services: Arc<JobServices>,
}

impl QueueListener {
    pub fn new(services: Arc<JobServices>) -> Self {
        Self { services }
    }

    /// Handle one delivery: wait for capacity, start the job, acknowledge.
    ///
    /// Acknowledgement does not wait for the job to finish.
    pub async fn on_delivery(
        &self,
        body: &[u8],
        delivery_tag: u64,
        acker: &dyn DeliveryAcker,
        stop: &CancellationToken,
    ) -> DeliveryOutcome {
        let monitor = &self.services.monitor;
        if monitor.active_count() >= monitor.ceiling() {
            tracing::debug!("Delivery {} waiting for capacity ({} active)", delivery_tag, monitor.active_count());
        }

        let slot = tokio::select! {
            biased;
            _ = stop.cancelled() => {
                tracing::info!("Delivery {} released unacknowledged: stopping", delivery_tag);
                return DeliveryOutcome::Cancelled;
            }
            slot = monitor.acquire_slot() => slot,
        };
        let slot = match slot {
            Ok(slot) => slot,
            Err(e) => {
                tracing::error!("Delivery {}: admission failed: {}", delivery_tag, e);
                self.reject(acker, delivery_tag).await;
                return DeliveryOutcome::Requeued;
            }
        };

        let text = decode_body(body, delivery_tag);
        if text.trim().is_empty() {
            tracing::error!("Delivery {} has an empty body; leaving it unacknowledged", delivery_tag);
            return DeliveryOutcome::EmptyBody;
        }

        let processor = match JobProcessor::new(self.services.clone(), text) {
            Ok(processor) => processor,
            Err(e) => {
                tracing::error!("Delivery {}: could not create job: {}", delivery_tag, e);
                self.reject(acker, delivery_tag).await;
                return DeliveryOutcome::Requeued;
            }
        };
        let job_id = processor.job().id();
        tokio::task::spawn_blocking(move || processor.run(slot));

        if let Err(e) = acker.ack().await {
            tracing::error!("Job {}: ack of delivery {} failed: {}", job_id, delivery_tag, e);
        }
        tracing::info!("Delivery {} dispatched as job {}", delivery_tag, job_id);
        DeliveryOutcome::Dispatched(job_id)
    }

    async fn reject(&self, acker: &dyn DeliveryAcker, delivery_tag: u64) {
        if let Err(e) = acker.reject(true).await {
            tracing::error!("Reject of delivery {} failed: {}", delivery_tag, e);
        }
    }
}

/// Body as text; invalid UTF-8 is replaced and logged, and the parser decides
fn decode_body(body: &[u8], delivery_tag: u64) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(e) => {
            tracing::warn!(
                "Delivery {} is not valid UTF-8 ({}); invalid bytes replaced",
                delivery_tag,
                e
            );
            String::from_utf8_lossy(body).into_owned()
        }
    }
}
