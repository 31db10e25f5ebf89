use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;

use crate::{models::NewClick, queue::ClickReceiver, store::ClickStore};

/// How a worker retries a failed click write.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Fixed pause between two attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(200),
        }
    }
}

/// Fixed set of tasks draining the click queue into the click store.
///
/// There is no cancellation signal: the pool stops once every producer handle
/// of the queue has been dropped and the remaining events are written.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `worker_count` workers with the default retry policy.
    pub fn start(
        worker_count: usize,
        queue: ClickReceiver,
        store: Arc<dyn ClickStore>,
    ) -> Self {
        Self::start_with_policy(worker_count, queue, store, RetryPolicy::default())
    }

    pub fn start_with_policy(
        worker_count: usize,
        queue: ClickReceiver,
        store: Arc<dyn ClickStore>,
        policy: RetryPolicy,
    ) -> Self {
        tracing::info!("Starting {} click worker(s)", worker_count);

        let handles = (0..worker_count)
            .map(|worker_id| {
                let queue = queue.clone();
                let store = store.clone();
                tokio::spawn(async move { run_worker(worker_id, queue, store, policy).await })
            })
            .collect();

        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Wait for the workers to finish draining the (already closed) queue.
    ///
    /// Returns `false` if `grace` elapsed first. Workers still running at that
    /// point are left to the runtime shutdown.
    pub async fn drain(self, grace: Duration) -> bool {
        let worker_count = self.handles.len();
        let join_all = async {
            for (worker_id, handle) in self.handles.into_iter().enumerate() {
                if let Err(e) = handle.await {
                    tracing::error!(worker_id, "Click worker panicked: {}", e);
                }
            }
        };

        match tokio::time::timeout(grace, join_all).await {
            Ok(()) => {
                tracing::info!("All {} click worker(s) drained", worker_count);
                true
            }
            Err(_) => {
                tracing::warn!(
                    "Click workers still busy after {:?}, pending clicks may be lost",
                    grace
                );
                false
            }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    queue: ClickReceiver,
    store: Arc<dyn ClickStore>,
    policy: RetryPolicy,
) {
    while let Some(event) = queue.dequeue().await {
        let click = NewClick::from(event);
        persist_with_retry(store.as_ref(), &click, policy).await;
    }
    tracing::debug!(worker_id, "Click queue closed, worker exiting");
}

/// Write one click, retrying up to `policy.max_attempts` times. Failures end
/// in a log line, never in an error for the caller.
async fn persist_with_retry(store: &dyn ClickStore, click: &NewClick, policy: RetryPolicy) -> bool {
    for attempt in 1..=policy.max_attempts {
        match store.create_click(click).await {
            Ok(()) => {
                tracing::debug!(link_id = click.link_id, "Click recorded");
                return true;
            }
            Err(e) if attempt < policy.max_attempts => {
                tracing::warn!(
                    link_id = click.link_id,
                    "Failed to save click (attempt {}/{}): {}",
                    attempt,
                    policy.max_attempts,
                    e
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                tracing::error!(
                    link_id = click.link_id,
                    "Click lost after {} attempts: {}",
                    policy.max_attempts,
                    e
                );
            }
        }
    }
    false
}
