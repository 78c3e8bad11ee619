//! Polling implementations of the folder transitions owned by the mover and
//! the reaper.
//!
//! These honour the same folder contract as any external daemon would, so
//! they can run next to one (or on several hosts at once): every move is a
//! single rename and a rename that fails because a peer moved the file first
//! is simply skipped.

use super::{
    Layout, MessageState,
    file::list_names,
    layout::split_scoped_name,
};
use crate::{Error, Result};
use core::time::Duration;
use std::{fs, path::Path, time::SystemTime};

impl Layout {
    /// Moves saved messages from `new/` into their queue.
    ///
    /// Files modified less than `min_age` ago are left alone so a save that is
    /// still writing is never queued. Messages whose queue no longer exists
    /// are sent to `remove/`.
    ///
    /// Returns the number of messages queued.
    pub fn promote_new(&self, min_age: Duration) -> Result<usize> {
        self.sweep_into_queues(MessageState::New, min_age)
    }

    /// Returns messages claimed more than `visibility_timeout` ago to their
    /// queue so they can be delivered again.
    ///
    /// Messages whose queue no longer exists are sent to `remove/`. Returns
    /// the number of messages requeued.
    pub fn requeue_delayed(&self, visibility_timeout: Duration) -> Result<usize> {
        self.sweep_into_queues(MessageState::Delayed, visibility_timeout)
    }

    fn sweep_into_queues(&self, from: MessageState, min_age: Duration) -> Result<usize> {
        let folder = match from {
            MessageState::New => self.new_folder(),
            MessageState::Delayed => self.delay_folder(),
            MessageState::Available | MessageState::PendingRemoval => return Ok(0),
        };
        let names =
            list_names(folder, usize::MAX).map_err(|e| Error::io(format!("listing {from}"), e))?;
        let mut queued = 0;

        for name in names {
            let Some((queue, message_id)) = split_scoped_name(&name) else {
                tracing::warn!(%name, "Skipping malformed message name");
                continue;
            };

            if !is_older_than(&folder.join(&name), min_age) {
                continue;
            }

            let to = if self.queue_path(&queue).is_dir() {
                MessageState::Available
            } else {
                MessageState::PendingRemoval
            };

            match self.transition(&queue, message_id, from, to) {
                Ok(()) if to == MessageState::Available => queued += 1,
                Ok(()) => tracing::debug!(queue = %queue, %message_id, "Orphaned message removed"),
                Err(e) => tracing::debug!(queue = %queue, %message_id, "Skipping {from}: {e}"),
            }
        }

        Ok(queued)
    }

    /// Unlinks every message waiting in `remove/`. Returns how many were
    /// deleted.
    pub fn reap(&self) -> Result<usize> {
        let names = list_names(self.remove_folder(), usize::MAX)
            .map_err(|e| Error::io("listing removed messages", e))?;
        let mut reaped = 0;

        for name in names {
            match fs::remove_file(self.remove_folder().join(&name)) {
                Ok(()) => reaped += 1,
                Err(e) => tracing::debug!(%name, "Skipping reap: {e}"),
            }
        }

        Ok(reaped)
    }
}

fn is_older_than(path: &Path, age: Duration) -> bool {
    if age.is_zero() {
        return true;
    }

    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|elapsed| elapsed >= age)
}
