//! Fixed-size pools of worker threads.
//!
//! This module defines [`WorkerPool`], which owns the request side of a set
//! of single-slot channels, one per worker thread. Work is placed either
//! round-robin (saves, which never collide) or pinned by a checksum of the
//! queue id (fetches, so that every fetch of one queue passes through the same
//! worker and is therefore serialized).
//!
//! The pool is sized once at startup and never resized: resizing would change
//! which worker each queue is pinned to.

use super::{
    WorkRequest,
    worker::{PoolKind, WorkerContext, worker_loop},
};
use crate::{Error, Result};
use core::time::Duration;
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};
use tokio::{
    sync::{mpsc, oneshot},
    time::timeout,
};
use tokio_util::sync::CancellationToken;

/// Returns the worker a key is pinned to: `crc32(key) mod workers`.
///
/// An empty pool pins every key to index 0, which no worker answers to.
pub fn pinned_worker(key: &str, workers: usize) -> usize {
    (crc32fast::hash(key.as_bytes()) as usize)
        .checked_rem(workers)
        .unwrap_or(0)
}

/// A pool of worker threads that process [`WorkRequest`]s.
pub struct WorkerPool {
    kind: PoolKind,
    workers: Vec<mpsc::Sender<WorkRequest>>,
    next_worker: AtomicUsize,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
}

impl WorkerPool {
    /// Spawns `size` named worker threads, each behind a channel of
    /// capacity 1.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a thread cannot be spawned. Threads that were
    /// already started stop once the partially built pool is dropped.
    pub(crate) fn spawn(
        size: usize,
        ctx: &WorkerContext,
        shutdown_token: CancellationToken,
        shutdown_timeout: Duration,
    ) -> Result<Self> {
        let mut workers = Vec::with_capacity(size);

        for worker_id in 0..size {
            // One request at a time per worker: the caller's send completes
            // only when the worker is free to take it.
            let (tx, rx) = mpsc::channel(1);
            let ctx = ctx.clone();
            let name = format!("filemq-{}-{worker_id}", ctx.kind.as_str());

            thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(worker_id, rx, ctx))
                .map_err(|e| Error::io(format!("spawning {name}"), e))?;

            workers.push(tx);
        }

        tracing::debug!("Started {size} {} workers", ctx.kind.as_str());

        Ok(Self {
            kind: ctx.kind,
            workers,
            next_worker: AtomicUsize::new(0),
            shutdown_token,
            shutdown_timeout,
        })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Returns the index of the next worker to receive work (round-robin).
    pub fn next_worker_index(&self) -> usize {
        self.next_worker
            .fetch_add(1, Ordering::Relaxed)
            .checked_rem(self.workers.len())
            .unwrap_or(0)
    }

    /// Returns the worker every request for `key` is pinned to.
    pub fn pinned_worker_index(&self, key: &str) -> usize {
        pinned_worker(key, self.workers.len())
    }

    /// Sends a request to the next worker in round-robin order.
    pub async fn send_to_next_worker(&self, request: WorkRequest) -> Result<()> {
        self.send_to_worker(self.next_worker_index(), request).await
    }

    /// Sends a request to the worker `key` is pinned to.
    pub async fn send_pinned(&self, key: &str, request: WorkRequest) -> Result<()> {
        self.send_to_worker(self.pinned_worker_index(key), request)
            .await
    }

    /// Waits for a free slot on worker `worker_idx` and hands it the request.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The pool is shutting down (`shutdown_token` was cancelled).
    /// - `worker_idx` is out of range for this pool.
    /// - The worker's channel is closed.
    pub(crate) async fn send_to_worker(
        &self,
        worker_idx: usize,
        request: WorkRequest,
    ) -> Result<()> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        let Some(worker) = self.workers.get(worker_idx) else {
            return Err(Error::ChannelError {
                context: format!(
                    "{} {worker_idx} out of range for a pool of {}",
                    self.kind.as_str(),
                    self.workers.len()
                ),
            });
        };

        match worker.send(request).await {
            Ok(()) => Ok(()),
            Err(_) => Err(Error::ChannelError {
                context: format!("{} {worker_idx} channel closed", self.kind.as_str()),
            }),
        }
    }

    /// Shuts down all workers in the pool.
    ///
    /// - Cancels the shared [`CancellationToken`] to refuse new work.
    /// - Sends a [`WorkRequest::Shutdown`] to each worker. It queues behind
    ///   any request the worker is still processing.
    /// - Waits up to `shutdown_timeout` per worker for the acknowledgement.
    pub async fn shutdown(&self) -> Result<()> {
        let kind = self.kind.as_str();
        self.shutdown_token.cancel();

        tracing::debug!("Notifying all {kind} workers to shut down");
        let mut shutdown_handles = Vec::with_capacity(self.workers.len());

        for (i, worker) in self.workers.iter().enumerate() {
            let (tx, rx) = oneshot::channel();
            if let Err(e) = worker.send(WorkRequest::Shutdown { response: tx }).await {
                tracing::error!("Failed to send shutdown to {kind} {i}: {e}");
            } else {
                shutdown_handles.push((i, rx));
            }
        }

        for (i, rx) in shutdown_handles {
            match timeout(self.shutdown_timeout, rx).await {
                Ok(Ok(())) => tracing::trace!("{kind} {i} shutdown acknowledged"),
                Ok(Err(e)) => tracing::error!("{kind} {i} returned error: {e}"),
                Err(_) => tracing::warn!("{kind} {i} shutdown timed out"),
            }
        }

        tracing::info!("{kind} pool shutdown complete");
        Ok(())
    }
}
