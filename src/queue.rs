use std::sync::Arc;

use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex,
};

use crate::models::ClickEvent;

/// Create the click queue with room for `capacity` pending events.
///
/// The producer half goes to the request path, the consumer half to the
/// worker pool. Dropping every [`ClickQueue`] closes the queue; workers then
/// drain what is left and stop.
///
/// Panics if `capacity` is zero.
pub fn click_queue(capacity: usize) -> (ClickQueue, ClickReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        ClickQueue { tx },
        ClickReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer half of the click queue.
#[derive(Clone, Debug)]
pub struct ClickQueue {
    tx: mpsc::Sender<ClickEvent>,
}

impl ClickQueue {
    /// Offer an event without waiting.
    ///
    /// Returns `false` when the queue is full or already closed. The event is
    /// dropped in that case and the caller is expected to log the loss.
    pub fn enqueue(&self, event: ClickEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Events currently waiting for a worker.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// Consumer half of the click queue, shared by every worker.
#[derive(Clone, Debug)]
pub struct ClickReceiver {
    rx: Arc<Mutex<mpsc::Receiver<ClickEvent>>>,
}

impl ClickReceiver {
    /// Wait for the next event. `None` once the queue is closed and empty.
    pub async fn dequeue(&self) -> Option<ClickEvent> {
        self.rx.lock().await.recv().await
    }
}
