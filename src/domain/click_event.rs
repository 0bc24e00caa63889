//! Click events and the bounded queue that carries them off the redirect path.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

/// A single redirect that should be counted.
#[derive(Debug, Clone)]
pub struct ClickEvent {
    pub code: String,
    pub occurred_at: DateTime<Utc>,
}

impl ClickEvent {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Producer side of the click queue.
///
/// Never blocks: when the queue is full the click is dropped, logged and counted.
#[derive(Debug, Clone)]
pub struct ClickSender {
    tx: mpsc::Sender<ClickEvent>,
}

impl ClickSender {
    /// Creates a queue holding at most `capacity` pending clicks.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ClickEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueues a click. Returns `false` if it was dropped.
    pub fn record(&self, code: &str) -> bool {
        match self.tx.try_send(ClickEvent::new(code)) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(code = %event.code, "Click queue full, dropping click");
                metrics::counter!("click_events_dropped_total").increment(1);
                false
            }
            Err(TrySendError::Closed(event)) => {
                warn!(code = %event.code, "Click queue closed, dropping click");
                metrics::counter!("click_events_dropped_total").increment(1);
                false
            }
        }
    }

    /// Free slots left in the queue.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }

    pub fn max_capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
