//! Confirmation queue for newly extracted items.
//!
//! Each mutation is presented to the user one at a time before it is
//! committed to the list: the card appears, holds, fades out, and only then
//! does the commit callback run. Cancellation is checked between every phase
//! so a shut-down session never commits a half-presented item.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::item::MutationRecord;

/// Phase durations for one confirmation card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmTiming {
    /// Card fade-in
    pub appear: Duration,
    /// Card fully visible
    pub hold: Duration,
    /// Card fade-out; the commit runs after this elapses
    pub fade: Duration,
}

impl Default for ConfirmTiming {
    fn default() -> Self {
        Self {
            appear: Duration::from_millis(300),
            hold: Duration::from_millis(5000),
            fade: Duration::from_millis(300),
        }
    }
}

/// Presentation state reported to the display callback.
#[derive(Debug, Clone, PartialEq)]
pub enum CardState {
    /// A card became visible for this mutation
    Showing(MutationRecord),
    /// The visible card started fading out
    Fading,
    /// No card is visible
    Hidden,
}

/// Callback invoked when a card changes presentation state.
pub type DisplayCallback = Arc<dyn Fn(CardState) + Send + Sync>;

/// Callback invoked to commit a confirmed mutation.
pub type CommitCallback = Arc<
    dyn Fn(MutationRecord) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync,
>;

/// Sequential confirmation queue.
///
/// Mutations are enqueued in arrival order and presented strictly one at a
/// time. Dropping all handles or cancelling the token stops the worker
/// between phases without committing the in-flight item.
pub struct ConfirmationQueue {
    tx: mpsc::UnboundedSender<MutationRecord>,
    cancel: CancellationToken,
}

impl ConfirmationQueue {
    /// Spawn the worker task and return the queue handle.
    pub fn spawn(
        timing: ConfirmTiming,
        on_display: DisplayCallback,
        on_commit: CommitCallback,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(run_worker(timing, rx, cancel.clone(), on_display, on_commit));
        Self { tx, cancel }
    }

    /// Enqueue a batch of mutations for presentation.
    pub fn enqueue(&self, records: Vec<MutationRecord>) {
        for record in records {
            // Send fails only after shutdown
            let _ = self.tx.send(record);
        }
    }

    /// Stop the worker. In-flight and queued items are never committed.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ConfirmationQueue {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    timing: ConfirmTiming,
    mut rx: mpsc::UnboundedReceiver<MutationRecord>,
    cancel: CancellationToken,
    on_display: DisplayCallback,
    on_commit: CommitCallback,
) {
    loop {
        let record = tokio::select! {
            _ = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(record) => record,
                None => break,
            },
        };

        on_display(CardState::Showing(record.clone()));

        // Appear, hold, fade; cancellation between phases abandons the item.
        if sleep_or_cancel(timing.appear, &cancel).await {
            break;
        }
        if sleep_or_cancel(timing.hold, &cancel).await {
            break;
        }
        on_display(CardState::Fading);
        if sleep_or_cancel(timing.fade, &cancel).await {
            break;
        }

        debug!("Committing confirmed item: {}", record.name);
        on_commit(record).await;
        on_display(CardState::Hidden);
    }
    on_display(CardState::Hidden);
}

/// Returns true when cancelled before the duration elapses.
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
