use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::config::DigestConfig;
use crate::digest::DigestQueue;
use crate::metrics::{DigestMetrics, DIGEST_PENDING_BUCKETS};
use crate::notification::OutboundSender;

/// Background task that sends digest emails once their bucket is due.
///
/// Fire times live on the bucket keys, so a missed tick only delays the
/// send until the next one.
pub struct DigestFlushTask {
    config: DigestConfig,
    queue: Arc<DigestQueue>,
    outbound: Arc<dyn OutboundSender>,
    shutdown: broadcast::Receiver<()>,
}

impl DigestFlushTask {
    pub fn new(
        config: DigestConfig,
        queue: Arc<DigestQueue>,
        outbound: Arc<dyn OutboundSender>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            queue,
            outbound,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut timer = tokio::time::interval(Duration::from_secs(self.config.flush_interval.max(1)));
        timer.tick().await;

        tracing::info!(
            flush_interval_secs = self.config.flush_interval,
            sender = self.outbound.name(),
            "Digest flush task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Digest flush task received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    self.flush_due().await;
                }
            }
        }

        tracing::info!("Digest flush task stopped");
    }

    /// Send every due bucket once. Returns how many digests were sent.
    pub async fn flush_due(&self) -> usize {
        let due = self.queue.drain_due(Utc::now());
        let mut sent = 0;

        for bucket in &due {
            match self.outbound.send_digest(bucket).await {
                Ok(()) => {
                    sent += 1;
                    DigestMetrics::record_flushed();
                }
                Err(e) => {
                    DigestMetrics::record_flush_failure();
                    tracing::warn!(
                        bucket = %bucket.key,
                        items = bucket.notifications.len(),
                        error = %e,
                        "Failed to send digest"
                    );
                }
            }
        }

        DIGEST_PENDING_BUCKETS.set(self.queue.stats().pending_buckets as i64);

        if !due.is_empty() {
            tracing::info!(due = due.len(), sent = sent, "Flushed digest buckets");
        }
        sent
    }
}
