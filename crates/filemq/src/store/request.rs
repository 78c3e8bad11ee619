use super::{Message, Queue};
use crate::Result;
use tokio::sync::oneshot;

/// A unit of work handed to a saver or fetcher.
///
/// Every request owns a fresh one-shot response channel created by the caller
/// for this call alone. The worker answers exactly once and the caller is the
/// only receiver, so callers sharing a worker never see each other's replies.
#[derive(Debug)]
pub enum WorkRequest {
    /// Persist `message` into `new/<queue>:<message>`.
    Save {
        queue: Queue,
        message: Message,
        response: oneshot::Sender<Result<()>>,
    },
    /// Claim the next available message of `queue`.
    Fetch {
        queue: Queue,
        response: oneshot::Sender<FetchOutcome>,
    },
    /// Stop the worker after acknowledging.
    Shutdown { response: oneshot::Sender<()> },
}

/// What a fetch attempt produced.
///
/// Only `Delivered` and `Duplicate` carry a message. The rest all mean "no
/// message right now"; the caller may retry.
#[derive(Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The message was claimed and read.
    Delivered(Message),
    /// A peer renamed the file first, but it was already open here so its
    /// content is still returned. Delivery is at-least-once; consumers dedupe
    /// by message id.
    Duplicate(Message),
    /// The queue has no available message.
    Empty,
    /// The chosen file vanished before it could be opened; a peer claimed or
    /// removed it.
    RaceLost,
    /// The file could not be read, or the queue could not be listed.
    Unreadable,
}

impl FetchOutcome {
    pub fn into_message(self) -> Option<Message> {
        match self {
            Self::Delivered(message) | Self::Duplicate(message) => Some(message),
            Self::Empty | Self::RaceLost | Self::Unreadable => None,
        }
    }
}
