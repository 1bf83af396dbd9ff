/// Concurrency gate bounding how many downloads run I/O at once.
///
/// Wraps a tokio Semaphore and counts held permits so the cap can be observed.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Default number of simultaneous downloads.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Shared counting permit pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    /// Semaphore enforcing the limit.
    semaphore: Arc<Semaphore>,
    /// Permits currently held.
    active: Arc<AtomicUsize>,
    /// Highest value `active` has reached.
    peak: Arc<AtomicUsize>,
    /// Max concurrent holders.
    limit: usize,
}

impl ConcurrencyGate {
    /// Create a gate with the given limit. A zero limit is raised to one.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            limit,
        }
    }

    /// Wait for a free slot. Returns `None` if the semaphore was closed underneath us.
    pub async fn acquire(&self) -> Option<GatePermit> {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => {
                warn!("Concurrency gate closed, no permit issued");
                return None;
            }
        };

        let now = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        debug!("Gate permit acquired ({}/{})", now, self.limit);

        Some(GatePermit {
            active: self.active.clone(),
            _permit: permit,
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Permits held right now.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Highest number of permits ever held at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

/// A held slot. Dropping it frees the slot, whatever path the holder exits by.
#[derive(Debug)]
pub struct GatePermit {
    active: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        // Counter goes down before the semaphore permit is returned.
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}
