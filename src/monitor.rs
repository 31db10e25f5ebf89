use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::{error::ProbeError, models::Link, store::LinkStore};

/// Upper bound on a single destination probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// ── Probing ────────────────────────────────────────────────────────────────

/// Issues a lightweight existence check against a destination URL.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Send a HEAD request and return the response status code.
    async fn head(&self, url: &str, timeout: Duration) -> Result<u16, ProbeError>;
}

/// [`Probe`] backed by a shared reqwest client.
#[derive(Clone, Debug)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("linkpulse-monitor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn head(&self, url: &str, timeout: Duration) -> Result<u16, ProbeError> {
        let resp = self
            .client
            .head(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout { timeout }
                } else {
                    ProbeError::Request(e)
                }
            })?;

        Ok(resp.status().as_u16())
    }
}

/// 2xx and 3xx count as reachable, everything else does not.
pub fn is_accessible(status: u16) -> bool {
    (200..400).contains(&status)
}

// ── State changes ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BecameInaccessible,
    BecameAccessible,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::BecameInaccessible => f.write_str("ACCESSIBLE -> INACCESSIBLE"),
            Transition::BecameAccessible => f.write_str("INACCESSIBLE -> ACCESSIBLE"),
        }
    }
}

/// Emitted when a link's observed accessibility differs from the previous
/// poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub link_id: i64,
    pub short_code: String,
    pub original_url: String,
    pub transition: Transition,
}

fn format_state(accessible: bool) -> &'static str {
    if accessible {
        "ACCESSIBLE"
    } else {
        "INACCESSIBLE"
    }
}

// ── Monitor ────────────────────────────────────────────────────────────────

/// Periodically probes every link destination and reports when one goes up
/// or down.
///
/// Observed states live in a lock-guarded table keyed by link id. Entries
/// are added on first sight and never removed; a deleted link just stops
/// being visited.
pub struct AvailabilityMonitor {
    links: Arc<dyn LinkStore>,
    probe: Arc<dyn Probe>,
    interval: Duration,
    probe_timeout: Duration,
    states: Mutex<HashMap<i64, bool>>,
}

impl AvailabilityMonitor {
    pub fn new(links: Arc<dyn LinkStore>, probe: Arc<dyn Probe>, interval: Duration) -> Self {
        Self {
            links,
            probe,
            interval,
            probe_timeout: PROBE_TIMEOUT,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn the polling loop. It runs until the returned handle is aborted.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Check once right away, then once per interval.
    ///
    /// A tick that overruns the interval delays the next one instead of
    /// overlapping with it.
    pub async fn run(&self) {
        tracing::info!("Starting URL monitor with an interval of {:?}", self.interval);

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.check_all().await;
        }
    }

    /// Probe every known link once and return the transitions seen.
    ///
    /// Failing to list links abandons this tick only.
    pub async fn check_all(&self) -> Vec<StateChange> {
        tracing::debug!("Checking destination availability");

        let links = match self.links.list_links().await {
            Ok(links) => links,
            Err(e) => {
                tracing::error!("Failed to list links for monitoring: {}", e);
                return Vec::new();
            }
        };

        let mut changes = Vec::new();
        for link in &links {
            if let Some(change) = self.check_link(link).await {
                changes.push(change);
            }
        }

        tracing::info!(
            links = links.len(),
            changes = changes.len(),
            "Availability check finished"
        );
        changes
    }

    /// Last observed accessibility of a link, if it has been probed.
    #[cfg(test)]
    pub async fn observed(&self, link_id: i64) -> Option<bool> {
        self.states.lock().await.get(&link_id).copied()
    }

    async fn check_link(&self, link: &Link) -> Option<StateChange> {
        let accessible = match self.probe.head(&link.original_url, self.probe_timeout).await {
            Ok(status) => is_accessible(status),
            Err(e) => {
                tracing::debug!(url = %link.original_url, "Probe failed: {}", e);
                false
            }
        };

        // Read and write in one critical section so a late writer can't slip
        // in between.
        let previous = self.states.lock().await.insert(link.id, accessible);

        let Some(previous) = previous else {
            tracing::info!(
                code = %link.short_code,
                url = %link.original_url,
                "Initial state: {}",
                format_state(accessible)
            );
            return None;
        };

        if previous == accessible {
            return None;
        }

        let transition = if accessible {
            Transition::BecameAccessible
        } else {
            Transition::BecameInaccessible
        };

        match transition {
            Transition::BecameInaccessible => tracing::warn!(
                code = %link.short_code,
                url = %link.original_url,
                "Destination became unreachable ({})",
                transition
            ),
            Transition::BecameAccessible => tracing::info!(
                code = %link.short_code,
                url = %link.original_url,
                "Destination is reachable again ({})",
                transition
            ),
        }

        Some(StateChange {
            link_id: link.id,
            short_code: link.short_code.clone(),
            original_url: link.original_url.clone(),
            transition,
        })
    }
}
