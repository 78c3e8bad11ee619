use crate::{Error, Result};
use core::time::Duration;
use std::path::PathBuf;

/// Default number of workers in each of the saver and fetcher pools.
pub const DEFAULT_WORKERS: usize = 4;

/// Default upper bound of the random pause taken before claiming a message
/// when peers may be racing for the same files.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(5);

/// Default time to wait for each worker to acknowledge shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Store configuration.
///
/// Built once at startup and handed to [`Store::open`](crate::Store::open).
/// The store keeps its own copy; nothing can change it afterwards.
///
/// Changing `workers` between runs changes which fetcher a queue is pinned
/// to. That is harmless for data on disk but any two processes that are meant
/// to serialize through the same worker must agree on it.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Storage root holding the `new`, `delay`, `queues` and `remove` folders.
    pub root: PathBuf,
    /// Workers per pool.
    pub workers: usize,
    /// Expected number of *other* processes sharing the storage root. Zero
    /// selects the single-node fetch path.
    pub peers: usize,
    /// Upper bound of the de-synchronisation pause before a contended claim.
    pub max_jitter: Duration,
    /// Time to wait for each worker to acknowledge shutdown.
    pub shutdown_timeout: Duration,
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            workers: DEFAULT_WORKERS,
            peers: 0,
            max_jitter: DEFAULT_MAX_JITTER,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub const fn with_peers(mut self, peers: usize) -> Self {
        self.peers = peers;
        self
    }

    #[must_use]
    pub const fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::InvalidConfig {
                reason: "storage root must not be empty".to_string(),
            });
        }

        if self.workers == 0 {
            return Err(Error::InvalidConfig {
                reason: "workers must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
