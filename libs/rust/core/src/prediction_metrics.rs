//! Running prediction statistics and the background task that feeds them.
//!
//! Successful predictions hand their confidence to [`MetricsRecorder`], which applies updates
//! on a single worker in dispatch order. A snapshot taken while updates are queued may not
//! include them yet.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MetricsSnapshot {
    #[serde(rename = "predictions")]
    pub prediction_count: u64,
    #[serde(rename = "errors")]
    pub error_count: u64,
    #[serde(rename = "avg_confidence")]
    pub running_mean_confidence: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct MetricsAggregator {
    state: Mutex<MetricsSnapshot>,
}

impl MetricsAggregator {
    pub fn new() -> Self { Self::default() }

    pub fn record_success(&self, confidence: f64) {
        let mut st = self.state.lock();
        st.prediction_count += 1;
        let n = st.prediction_count as f64;
        st.running_mean_confidence = (st.running_mean_confidence * (n - 1.0) + confidence) / n;
    }

    pub fn record_error(&self) { self.state.lock().error_count += 1; }

    pub fn mark_updated(&self, at: DateTime<Utc>) { self.state.lock().last_updated = Some(at); }

    pub fn snapshot(&self) -> MetricsSnapshot { self.state.lock().clone() }
}

enum Update {
    Confidence(f64),
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget handle onto the metrics worker.
#[derive(Clone)]
pub struct MetricsRecorder {
    tx: mpsc::UnboundedSender<Update>,
}

impl MetricsRecorder {
    /// Spawn the worker on the current runtime. It exits once every handle is dropped.
    pub fn spawn(aggregator: Arc<MetricsAggregator>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Update>();
        let handle = tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                match update {
                    Update::Confidence(c) => aggregator.record_success(c),
                    Update::Flush(done) => { let _ = done.send(()); }
                }
            }
            debug!("metrics recorder stopped");
        });
        (Self { tx }, handle)
    }

    /// Queue a success update without waiting.
    pub fn dispatch(&self, confidence: f64) {
        if self.tx.send(Update::Confidence(confidence)).is_err() {
            warn!(confidence, "metrics worker gone, update lost");
        }
    }

    /// Wait until every update dispatched before this call has been applied.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Update::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}
