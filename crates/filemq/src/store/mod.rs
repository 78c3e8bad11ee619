//! The storage engine.
//!
//! [`Store`] persists, retrieves and retires messages using directory moves as
//! its only atomicity primitive. It owns:
//!
//! - the [`Layout`] of the storage root,
//! - a **saver** [`WorkerPool`], fed round-robin,
//! - a **fetcher** [`WorkerPool`], pinned by `crc32(queue) mod workers` so that
//!   fetches of one queue are strictly serialized,
//! - the in-process [`StoreStats`] counters.
//!
//! Queue management and message deletion are a single filesystem call each
//! and run on the caller's thread. Saves and fetches are a synchronous round
//! trip through a worker: the caller waits for a free slot on the worker's
//! channel, then for the one reply on its private response channel.

mod config;
mod file;
mod layout;
mod lifecycle;
mod message;
mod pool;
mod request;
mod stats;
mod worker;

#[cfg(test)]
mod tests;

pub use config::*;
pub use file::FetchPolicy;
pub use layout::*;
pub use message::*;
pub use pool::{WorkerPool, pinned_worker};
pub use request::*;
pub use stats::*;
pub use worker::PoolKind;

use crate::{Error, Result};
use std::{fs, io, sync::Arc};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use worker::WorkerContext;

/// Filesystem-backed message store.
pub struct Store {
    config: StoreConfig,
    layout: Arc<Layout>,
    savers: WorkerPool,
    fetchers: WorkerPool,
    stats: StoreStats,
}

impl Store {
    /// Validates `config`, creates the storage folders and starts both worker
    /// pools.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] for an empty root or zero workers.
    /// - [`Error::Io`] if a folder cannot be created or a worker thread
    ///   cannot be spawned.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let layout = Arc::new(Layout::new(&config.root));
        layout.prepare()?;

        let fetch = FetchPolicy {
            peers: config.peers,
            max_jitter: config.max_jitter,
        };
        // One token for both pools: shutting down either refuses work on both.
        let shutdown_token = CancellationToken::new();

        let savers = WorkerPool::spawn(
            config.workers,
            &WorkerContext {
                kind: PoolKind::Saver,
                layout: Arc::clone(&layout),
                fetch,
            },
            shutdown_token.clone(),
            config.shutdown_timeout,
        )?;
        let fetchers = WorkerPool::spawn(
            config.workers,
            &WorkerContext {
                kind: PoolKind::Fetcher,
                layout: Arc::clone(&layout),
                fetch,
            },
            shutdown_token,
            config.shutdown_timeout,
        )?;

        tracing::info!(
            root = %config.root.display(),
            workers = config.workers,
            peers = config.peers,
            "Store opened"
        );

        Ok(Self {
            config,
            layout,
            savers,
            fetchers,
            stats: StoreStats::default(),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Creates `queues/<queue>`. Creating an existing queue succeeds.
    pub fn save_queue(&self, queue: &Queue) -> Result<()> {
        let path = self.layout.queue_path(queue);
        match fs::create_dir(&path) {
            Ok(()) => {
                tracing::debug!(queue = %queue, "Queue created");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(Error::io(format!("creating queue {queue}"), e)),
        }
    }

    /// Returns whether `queue` exists, i.e. whether its directory does.
    pub fn load_queue(&self, queue: &Queue) -> bool {
        self.layout.queue_path(queue).is_dir()
    }

    /// Removes `queues/<queue>` and every message still available in it.
    ///
    /// Messages of this queue already in `new/` or `delay/` are left where
    /// they are; [`Layout::promote_new`] and [`Layout::requeue_delayed`]
    /// route them to `remove/` once they find the queue gone. Deleting a
    /// missing queue succeeds.
    pub fn delete_queue(&self, queue: &Queue) -> Result<()> {
        match fs::remove_dir_all(self.layout.queue_path(queue)) {
            Ok(()) => {
                tracing::debug!(queue = %queue, "Queue deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(format!("deleting queue {queue}"), e)),
        }
    }

    /// Durably writes `message` to `new/<queue>:<message>` through one of the
    /// savers.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] or [`Error::PartialWrite`] if the file could not be
    ///   fully written and synced. No file is left behind in that case.
    /// - [`Error::ServiceShutdown`] or [`Error::ChannelError`] if no saver
    ///   could take the request.
    pub async fn save_message(&self, queue: &Queue, message: Message) -> Result<()> {
        let (response, rx) = oneshot::channel();
        self.savers
            .send_to_next_worker(WorkRequest::Save {
                queue: queue.clone(),
                message,
                response,
            })
            .await?;

        let result = rx.await.map_err(|_| Error::ChannelError {
            context: "saver dropped the response channel".to_string(),
        })?;
        self.stats.record_save(result.is_ok());
        result
    }

    /// Claims the next available message of `queue` through the fetcher the
    /// queue is pinned to.
    ///
    /// Returns `Ok(None)` when nothing could be claimed: the queue is empty,
    /// a peer won the race, or the file could not be read. The caller may
    /// retry. A message a peer claimed at the same moment is still returned;
    /// see [`FetchOutcome::Duplicate`].
    ///
    /// # Errors
    ///
    /// [`Error::ServiceShutdown`] or [`Error::ChannelError`] if no fetcher
    /// could take the request.
    pub async fn load_next_message(&self, queue: &Queue) -> Result<Option<Message>> {
        let (response, rx) = oneshot::channel();
        self.fetchers
            .send_pinned(
                &queue.id,
                WorkRequest::Fetch {
                    queue: queue.clone(),
                    response,
                },
            )
            .await?;

        let outcome = rx.await.map_err(|_| Error::ChannelError {
            context: "fetcher dropped the response channel".to_string(),
        })?;
        self.stats.record_fetch(&outcome);
        Ok(outcome.into_message())
    }

    /// Moves a message into `remove/`, wherever it currently is.
    ///
    /// Tries `queues/<queue>/<id>`, then `delay/<queue>:<id>`, then
    /// `new/<queue>:<id>`, stopping at the first rename that succeeds.
    /// Returns the state the message was found in.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the message is in none of the three folders.
    /// - [`Error::Io`] if a rename fails for any reason other than the source
    ///   being absent. The message stays where it was.
    pub fn delete_message(&self, queue: &Queue, message_id: &str) -> Result<MessageState> {
        for from in [
            MessageState::Available,
            MessageState::Delayed,
            MessageState::New,
        ] {
            match self
                .layout
                .transition(queue, message_id, from, MessageState::PendingRemoval)
            {
                Ok(()) => {
                    tracing::debug!(queue = %queue, %message_id, "Message deleted from {from}");
                    return Ok(from);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::io(
                        format!("deleting message {message_id} of queue {queue} from {from}"),
                        e,
                    ));
                }
            }
        }

        Err(Error::NotFound {
            what: format!("message {message_id} in queue {queue}"),
        })
    }

    /// Shuts down both worker pools.
    ///
    /// New saves and fetches are refused immediately; requests a worker is
    /// already processing complete first.
    pub async fn shutdown(&self) -> Result<()> {
        self.savers.shutdown().await?;
        self.fetchers.shutdown().await
    }
}
