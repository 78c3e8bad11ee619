use super::{
    Layout, WorkRequest,
    file::{FetchPolicy, fetch_request_from_file, save_request_to_file},
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Which pool a worker belongs to. Used for thread names and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolKind {
    Saver,
    Fetcher,
}

impl PoolKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Saver => "saver",
            Self::Fetcher => "fetcher",
        }
    }
}

/// Everything a worker needs besides its request channel.
#[derive(Clone, Debug)]
pub(crate) struct WorkerContext {
    pub kind: PoolKind,
    pub layout: Arc<Layout>,
    pub fetch: FetchPolicy,
}

/// Worker thread body: a strict FIFO serializer of the requests sent to it.
///
/// Runs on a dedicated OS thread for the lifetime of the pool. Each iteration
/// takes one request, performs its filesystem work synchronously and answers
/// on the request's own response channel before taking the next one.
///
/// The loop exits on [`WorkRequest::Shutdown`] or once every sender is gone.
///
/// # Request Types
///
/// - [`WorkRequest::Save`] - [`save_request_to_file`].
/// - [`WorkRequest::Fetch`] - [`fetch_request_from_file`].
/// - [`WorkRequest::Shutdown`] - acknowledge and stop.
pub(crate) fn worker_loop(
    worker_id: usize,
    mut rx: mpsc::Receiver<WorkRequest>,
    ctx: WorkerContext,
) {
    let kind = ctx.kind.as_str();
    tracing::trace!("{kind} {worker_id} started");

    while let Some(work) = rx.blocking_recv() {
        match work {
            WorkRequest::Save {
                queue,
                message,
                response,
            } => {
                let result = save_request_to_file(&ctx.layout, &queue, &message);
                if let Err(e) = &result {
                    tracing::warn!(queue = %queue, message_id = %message.id, "Save failed: {e}");
                }
                if response.send(result).is_err() {
                    tracing::debug!("{kind} {worker_id}: caller went away before save reply");
                }
            }
            WorkRequest::Fetch { queue, response } => {
                let outcome = fetch_request_from_file(&ctx.layout, &queue, ctx.fetch);
                if let Err(unsent) = response.send(outcome) {
                    if let Some(message) = unsent.into_message() {
                        // Already claimed; it stays in `delay/` until the
                        // mover requeues it.
                        tracing::warn!(
                            queue = %queue,
                            message_id = %message.id,
                            "{kind} {worker_id}: caller went away before fetch reply"
                        );
                    }
                }
            }
            WorkRequest::Shutdown { response } => {
                tracing::debug!("{kind} {worker_id} received shutdown signal");

                if response.send(()).is_err() {
                    tracing::error!("{kind} {worker_id} failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    tracing::trace!("{kind} {worker_id} stopped");
}
