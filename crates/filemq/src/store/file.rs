//! The filesystem half of every save and fetch.
//!
//! Each step is one filesystem call (create, write, fsync, rename, remove) and
//! the result of that call is the only source of truth. Nothing here takes a
//! lock; fetches for one queue are already serialized by the fetcher pool.

use super::{FetchOutcome, Layout, Message, MessageState, Queue};
use crate::{Error, Result};
use core::time::Duration;
use rand::{Rng, rng};
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Write},
    path::{Path, PathBuf},
    time::SystemTime,
};

/// How fetchers behave when other processes share the storage root.
#[derive(Clone, Copy, Debug)]
pub struct FetchPolicy {
    pub peers: usize,
    pub max_jitter: Duration,
}

/// A writer that can force its data to stable storage.
pub(crate) trait DurableWrite: Write {
    fn sync(&mut self) -> io::Result<()>;
}

impl DurableWrite for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

/// Persists `message` as `new/<queue>:<message>`.
///
/// On any failure the file is removed again, so a truncated message is never
/// left where the mover could pick it up.
pub(crate) fn save_request_to_file(
    layout: &Layout,
    queue: &Queue,
    message: &Message,
) -> Result<()> {
    let path = layout.message_path(MessageState::New, queue, &message.id);

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .map_err(|e| Error::io(format!("opening {}", path.display()), e))?;

    write_durably(&path, &mut file, &message.content)
}

/// Writes the whole payload and syncs it, or removes `path` and fails.
pub(crate) fn write_durably<W: DurableWrite>(
    path: &Path,
    writer: &mut W,
    content: &[u8],
) -> Result<()> {
    let mut written = 0;

    while written < content.len() {
        match writer.write(&content[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                discard(path);
                return Err(Error::io(format!("writing {}", path.display()), e));
            }
        }
    }

    if written < content.len() {
        discard(path);
        return Err(Error::PartialWrite {
            written,
            expected: content.len(),
        });
    }

    if let Err(e) = writer.sync() {
        discard(path);
        return Err(Error::io(format!("syncing {}", path.display()), e));
    }

    Ok(())
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(path = %path.display(), "Failed to remove incomplete message: {e}");
    }
}

/// Lists at most `limit` file names in `dir`, in directory order.
///
/// A missing directory lists as empty.
pub(crate) fn list_names(dir: &Path, limit: usize) -> io::Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    Ok(entries
        .filter_map(core::result::Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .take(limit)
        .collect())
}

/// Claims the next message of `queue`.
///
/// With no peers this takes the first directory entry. Otherwise it lists up
/// to `peers + 1` entries, pauses briefly when the listing is small enough
/// that peers are likely to pick the same file, then claims one entry chosen
/// at random.
pub(crate) fn fetch_request_from_file(
    layout: &Layout,
    queue: &Queue,
    policy: FetchPolicy,
) -> FetchOutcome {
    if policy.peers == 0 {
        return fetch_first_from_file(layout, queue);
    }

    let dir = layout.queue_path(queue);
    let mut names = match list_names(&dir, policy.peers + 1) {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(queue = %queue, "Failed to list queue: {e}");
            return FetchOutcome::Unreadable;
        }
    };

    if names.is_empty() {
        return FetchOutcome::Empty;
    }

    if contended(names.len(), policy) {
        let pause = rng().random_range(Duration::ZERO..=policy.max_jitter);
        tracing::trace!(queue = %queue, ?pause, "Contended queue, pausing before claim");
        std::thread::sleep(pause);
    }

    let candidate = names.swap_remove(rng().random_range(0..names.len()));
    claim(layout, queue, &candidate)
}

/// Whether a listing of `listed` entries is small enough that peers are
/// likely to pick the same file, and jitter is enabled.
pub(crate) fn contended(listed: usize, policy: FetchPolicy) -> bool {
    listed <= policy.peers && !policy.max_jitter.is_zero()
}

/// Claims `message_id` from `queues/<queue>/` into `delay/`.
///
/// The file is opened first and renamed while the handle is still held. If the
/// open fails a peer got there earlier. If the rename fails a peer claimed the
/// same file between our open and rename; its content is still readable
/// through our handle, so it is returned as a duplicate delivery.
pub(crate) fn claim(layout: &Layout, queue: &Queue, message_id: &str) -> FetchOutcome {
    let path = layout.message_path(MessageState::Available, queue, message_id);

    let mut file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!(queue = %queue, %message_id, "Lost race for message: {e}");
            return FetchOutcome::RaceLost;
        }
    };

    let claimed = layout.transition(
        queue,
        message_id,
        MessageState::Available,
        MessageState::Delayed,
    );
    let duplicate = match claimed {
        Ok(()) => {
            mark_claimed(&file, &path);
            false
        }
        Err(e) => {
            tracing::debug!(queue = %queue, %message_id, "Message claimed by a peer first: {e}");
            true
        }
    };

    let Some(content) = read_all(&mut file, &path) else {
        return FetchOutcome::Unreadable;
    };

    let message = Message::new(message_id, content);
    if duplicate {
        FetchOutcome::Duplicate(message)
    } else {
        FetchOutcome::Delivered(message)
    }
}

/// Single-node fetch: first entry, read, then move to `delay/`.
pub(crate) fn fetch_first_from_file(layout: &Layout, queue: &Queue) -> FetchOutcome {
    let dir = layout.queue_path(queue);
    let message_id = match list_names(&dir, 1) {
        Ok(mut names) => match names.pop() {
            Some(name) => name,
            None => return FetchOutcome::Empty,
        },
        Err(e) => {
            tracing::warn!(queue = %queue, "Failed to list queue: {e}");
            return FetchOutcome::Unreadable;
        }
    };

    let path: PathBuf = dir.join(&message_id);
    let mut file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to open message: {e}");
            return FetchOutcome::Unreadable;
        }
    };

    let Some(content) = read_all(&mut file, &path) else {
        return FetchOutcome::Unreadable;
    };

    match layout.transition(
        queue,
        &message_id,
        MessageState::Available,
        MessageState::Delayed,
    ) {
        Ok(()) => mark_claimed(&file, &path),
        Err(e) => {
            tracing::warn!(queue = %queue, %message_id, "Failed to move message to delay: {e}");
        }
    }

    FetchOutcome::Delivered(Message::new(message_id, content))
}

fn read_all(file: &mut File, path: &Path) -> Option<Vec<u8>> {
    let mut content = Vec::new();
    match file.read_to_end(&mut content) {
        Ok(_) => Some(content),
        Err(e) => {
            tracing::warn!(path = %path.display(), "Failed to read message: {e}");
            None
        }
    }
}

/// Stamps the claim time as the file's mtime, which is what the visibility
/// timeout in [`Layout::requeue_delayed`] is measured from.
fn mark_claimed(file: &File, path: &Path) {
    if let Err(e) = file.set_modified(SystemTime::now()) {
        tracing::warn!(path = %path.display(), "Failed to stamp claim time: {e}");
    }
}
