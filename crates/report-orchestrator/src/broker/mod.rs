//! AMQP consumer feeding the queue listener
//!
//! One session is one connection and one channel with a bounded prefetch.
//! When a session drops, the consumer waits `reconnect_delay_secs` and opens
//! a new one, until the stop signal is raised.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties};
use tokio_util::sync::CancellationToken;

use crate::config::BrokerConfig;
use crate::error::Result;
use crate::processing::{DeliveryAcker, DeliveryOutcome, QueueListener};

/// `DeliveryAcker` over a lapin delivery
pub struct LapinAcker {
    acker: Acker,
}

impl LapinAcker {
    pub fn new(acker: Acker) -> Self {
        Self { acker }
    }
}

#[async_trait]
impl DeliveryAcker for LapinAcker {
    async fn ack(&self) -> Result<()> {
        self.acker.ack(BasicAckOptions::default()).await?;
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<()> {
        self.acker
            .nack(BasicNackOptions {
                requeue,
                ..Default::default()
            })
            .await?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Stopped,
    Closed,
}

/// Consume until `stop` is cancelled, reconnecting after failures
pub async fn run_consumer(config: BrokerConfig, listener: Arc<QueueListener>, stop: CancellationToken) {
    tracing::info!("Broker consumer starting for queue '{}'", config.queue);
    loop {
        if stop.is_cancelled() {
            break;
        }
        match consume_session(&config, &listener, &stop).await {
            Ok(SessionEnd::Stopped) => break,
            Ok(SessionEnd::Closed) => tracing::warn!("Broker consumer stream closed"),
            Err(e) => tracing::error!("Broker session failed: {}", e),
        }

        tracing::info!("Reconnecting to broker in {:?}", config.reconnect_delay());
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = tokio::time::sleep(config.reconnect_delay()) => {}
        }
    }
    tracing::info!("Broker consumer stopped");
}

async fn consume_session(
    config: &BrokerConfig,
    listener: &QueueListener,
    stop: &CancellationToken,
) -> Result<SessionEnd> {
    let connection = tokio::select! {
        _ = stop.cancelled() => return Ok(SessionEnd::Stopped),
        connection = Connection::connect(&config.uri, ConnectionProperties::default()) => connection?,
    };
    let channel = connection.create_channel().await?;
    channel
        .basic_qos(config.prefetch.max(1), BasicQosOptions::default())
        .await?;
    channel
        .queue_declare(
            &config.queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;
    let mut consumer = channel
        .basic_consume(
            &config.queue,
            &config.consumer_tag,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;
    tracing::info!(
        "Consuming '{}' as '{}' (prefetch {})",
        config.queue,
        config.consumer_tag,
        config.prefetch.max(1)
    );

    let end = loop {
        let next = tokio::select! {
            _ = stop.cancelled() => break SessionEnd::Stopped,
            next = consumer.next() => next,
        };
        match next {
            Some(Ok(delivery)) => {
                let acker = LapinAcker::new(delivery.acker);
                let outcome = listener
                    .on_delivery(&delivery.data, delivery.delivery_tag, &acker, stop)
                    .await;
                if outcome == DeliveryOutcome::Cancelled {
                    break SessionEnd::Stopped;
                }
            }
            Some(Err(e)) => return Err(e.into()),
            None => break SessionEnd::Closed,
        }
    };

    if let Err(e) = channel.close(200, "consumer stopping").await {
        tracing::debug!("Channel close failed: {}", e);
    }
    if let Err(e) = connection.close(200, "consumer stopping").await {
        tracing::debug!("Connection close failed: {}", e);
    }
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::testing::Harness;
    use crate::report::ReportFactory;
    use std::time::Duration;

    #[tokio::test]
    async fn test_consumer_exits_on_stop_while_unreachable() {
        let harness = Harness::new(1, ReportFactory::new());
        let listener = Arc::new(QueueListener::new(harness.services.clone()));
        let config = BrokerConfig {
            uri: "amqp://127.0.0.1:1/%2f".to_string(),
            reconnect_delay_secs: 60,
            ..Default::default()
        };
        let stop = CancellationToken::new();

        let consumer = tokio::spawn(run_consumer(config, listener, stop.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.cancel();

        tokio::time::timeout(Duration::from_secs(5), consumer)
            .await
            .unwrap()
            .unwrap();
    }
}
