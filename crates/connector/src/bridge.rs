//! Publisher bridge: normalizes inbound frames and republishes each
//! record to the bus keyed by trading pair.
//!
//! Subject pattern: {topic}.{pair}, e.g. ohlcv.realtime.BTC-USD
//!
//! Records are handed to a single publish worker through a bounded
//! queue, so submission order matches receipt order and unacknowledged
//! work is capped. Per-event failures (decode, missing pair,
//! serialization, publish) are logged and swallowed; one bad record
//! must never stop the stream.

use std::str::FromStr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, trace, warn};

use tickbridge_middleware::{
    sanitize_subject_token, ProducerHandle, SubjectBuilder, Transport, TransportError,
};

use crate::error::WriterError;
use crate::events::{decode_batch, RawFeedEvent};
use crate::message::Message;
use crate::record::NormalizedRecord;
use crate::traits::Writer;

pub const DEFAULT_MAX_IN_FLIGHT: usize = 1024;

/// Bounded wait for outstanding publishes during close
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// What to do with a new record when the in-flight cap is reached.
///
/// Records already queued cannot be revoked, so the policy applies to
/// the incoming record: either wait for a slot (backpressure reaches
/// the receive path) or shed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    Block,
    DropNew,
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(OverflowPolicy::Block),
            "drop" | "drop-new" | "drop_new" => Ok(OverflowPolicy::DropNew),
            other => Err(format!("unknown overflow policy: {}", other)),
        }
    }
}

/// Resolution of one submitted publish.
#[derive(Debug)]
pub struct PublishOutcome {
    pub subject: String,
    pub pair: String,
    pub result: Result<(), TransportError>,
}

/// One record waiting for the publish worker.
struct PendingPublish {
    transport: Arc<dyn Transport>,
    subject: Arc<str>,
    pair: String,
    payload: Bytes,
}

pub struct PublisherBridge {
    producer: ProducerHandle,
    subjects: SubjectBuilder,
    queue_tx: mpsc::Sender<PendingPublish>,
    policy: OverflowPolicy,
    /// Records enqueued but not yet resolved
    pending: Arc<AtomicI64>,
    published: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
}

impl PublisherBridge {
    /// Bridge that connects to NATS lazily on first publish.
    pub fn new(
        nats_url: impl Into<String>,
        topic: impl Into<String>,
        max_in_flight: usize,
        policy: OverflowPolicy,
    ) -> Self {
        Self::with_producer(ProducerHandle::new(nats_url), topic, max_in_flight, policy)
    }

    /// Bridge over an explicit producer handle. Tests seed this with an
    /// in-memory transport via [`ProducerHandle::preconnected`].
    pub fn with_producer(
        producer: ProducerHandle,
        topic: impl Into<String>,
        max_in_flight: usize,
        policy: OverflowPolicy,
    ) -> Self {
        let pending = Arc::new(AtomicI64::new(0));
        let published = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));

        let outcome_tx = Self::spawn_outcome_logger(Arc::clone(&published), Arc::clone(&failed));
        let (queue_tx, queue_rx) = mpsc::channel(max_in_flight);
        Self::spawn_publish_worker(queue_rx, outcome_tx, Arc::clone(&pending));

        Self {
            producer,
            subjects: SubjectBuilder::new(topic),
            queue_tx,
            policy,
            pending,
            published,
            failed,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Single consumer of the publish queue: submits in receipt order,
    /// which is what per-key ordering on the bus relies on.
    fn spawn_publish_worker(
        mut rx: mpsc::Receiver<PendingPublish>,
        outcome_tx: mpsc::Sender<PublishOutcome>,
        pending: Arc<AtomicI64>,
    ) {
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let result = job.transport.publish(&job.subject, job.payload).await;
                let _ = outcome_tx
                    .send(PublishOutcome {
                        subject: job.subject.to_string(),
                        pair: job.pair,
                        result,
                    })
                    .await;
                pending.fetch_sub(1, Ordering::SeqCst);
            }
        });
    }

    /// Outcomes are observed here one by one for logging and counters,
    /// never re-raised into the receive path.
    fn spawn_outcome_logger(
        published: Arc<AtomicU64>,
        failed: Arc<AtomicU64>,
    ) -> mpsc::Sender<PublishOutcome> {
        let (tx, mut rx) = mpsc::channel::<PublishOutcome>(256);
        tokio::spawn(async move {
            while let Some(outcome) = rx.recv().await {
                match outcome.result {
                    Ok(()) => {
                        published.fetch_add(1, Ordering::SeqCst);
                        trace!(subject = %outcome.subject, pair = %outcome.pair, "Publish acknowledged");
                    }
                    Err(e) => {
                        failed.fetch_add(1, Ordering::SeqCst);
                        error!(
                            subject = %outcome.subject,
                            pair = %outcome.pair,
                            error = %e,
                            "Publish failed"
                        );
                    }
                }
            }
        });
        tx
    }

    /// Acquire the live broker connection, creating it exactly once.
    pub async fn ensure_ready(&self) -> Result<Arc<dyn Transport>, TransportError> {
        self.producer.ensure_ready().await
    }

    /// Count of acknowledged publishes
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    /// Count of publishes that resolved with an error
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    /// Count of records shed before submission (keyless or over the cap)
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    async fn publish_record(&self, record: NormalizedRecord) {
        let transport = match self.producer.ensure_ready().await {
            Ok(transport) => transport,
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                error!(pair = %record.pair, error = %e, "Broker unavailable, record not published");
                return;
            }
        };

        let payload = match serde_json::to_vec(&record) {
            Ok(payload) => payload,
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                error!(pair = %record.pair, error = %e, "Record serialization failed");
                return;
            }
        };

        let key = sanitize_subject_token(&record.pair);
        if key.is_empty() {
            self.dropped.fetch_add(1, Ordering::SeqCst);
            warn!(pair = %record.pair, "Pair sanitizes to an empty key, dropping record");
            return;
        }

        let job = PendingPublish {
            transport,
            subject: self.subjects.record(&key),
            pair: record.pair,
            payload: Bytes::from(payload),
        };

        match self.policy {
            OverflowPolicy::Block => {
                if self.queue_tx.send(job).await.is_ok() {
                    self.pending.fetch_add(1, Ordering::SeqCst);
                }
            }
            OverflowPolicy::DropNew => {
                // Counted before the send so the worker can never observe
                // a job it has dequeued ahead of the increment.
                self.pending.fetch_add(1, Ordering::SeqCst);
                match self.queue_tx.try_send(job) {
                    Ok(()) => {}
                    Err(TrySendError::Full(job)) => {
                        self.pending.fetch_sub(1, Ordering::SeqCst);
                        self.dropped.fetch_add(1, Ordering::SeqCst);
                        warn!(
                            subject = %job.subject,
                            pair = %job.pair,
                            "In-flight cap reached, dropping record"
                        );
                    }
                    Err(TrySendError::Closed(_)) => {
                        self.pending.fetch_sub(1, Ordering::SeqCst);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Writer for PublisherBridge {
    async fn write(&mut self, msg: &Message) -> Result<(), WriterError> {
        let events = match decode_batch(&msg.data) {
            Ok(events) => events,
            Err(e) => {
                warn!(feed = %msg.feed, error = %e, "Dropping undecodable frame");
                return Ok(());
            }
        };

        for event in &events {
            match event {
                RawFeedEvent::Status { status, message } => {
                    debug!(status = %status, message = ?message, "Feed status message");
                }
                RawFeedEvent::Other => {
                    trace!("Skipping unknown event kind");
                }
                _ => match NormalizedRecord::from_event(event) {
                    Some(record) => self.publish_record(record).await,
                    None => {
                        self.dropped.fetch_add(1, Ordering::SeqCst);
                        warn!(feed = %msg.feed, "Dropping keyless event (no pair)");
                    }
                },
            }
        }

        Ok(())
    }

    async fn close(&mut self) -> Result<(), WriterError> {
        // Bounded wait for queued publishes to resolve
        let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
        while self.pending.load(Ordering::SeqCst) > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let left = self.pending.load(Ordering::SeqCst);
        if left > 0 {
            warn!(pending = left, "Timed out waiting for in-flight publishes to drain");
        }

        if let Some(transport) = self.producer.get() {
            transport
                .flush()
                .await
                .map_err(|e| WriterError::WriteFailed(format!("flush failed: {}", e)))?;
        }
        trace!(
            published = self.published_count(),
            failed = self.failed_count(),
            dropped = self.dropped_count(),
            "Publisher bridge closing"
        );
        Ok(())
    }
}
