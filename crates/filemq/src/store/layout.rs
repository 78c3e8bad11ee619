use super::{MessageState, Queue};
use crate::{Error, Result};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub const NEW_FOLDER: &str = "new";
pub const DELAY_FOLDER: &str = "delay";
pub const QUEUES_FOLDER: &str = "queues";
pub const REMOVE_FOLDER: &str = "remove";

/// Separates the queue id from the message id in file names outside the
/// `queues/<queue>/` directories.
pub const NAME_SEPARATOR: char = ':';

/// Directory layout of a storage root.
///
/// ```text
/// <root>/
///   new/<queue>:<message>       saved, waiting for the mover
///   queues/<queue>/<message>    available
///   delay/<queue>:<message>     claimed, in flight
///   remove/<queue>:<message>    waiting for the reaper
/// ```
#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
    new: PathBuf,
    delay: PathBuf,
    queues: PathBuf,
    remove: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            new: root.join(NEW_FOLDER),
            delay: root.join(DELAY_FOLDER),
            queues: root.join(QUEUES_FOLDER),
            remove: root.join(REMOVE_FOLDER),
            root,
        }
    }

    /// Creates the root and its four folders. Existing folders are kept.
    pub fn prepare(&self) -> Result<()> {
        for dir in [&self.root, &self.new, &self.delay, &self.queues, &self.remove] {
            fs::create_dir_all(dir)
                .map_err(|e| Error::io(format!("creating {}", dir.display()), e))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn new_folder(&self) -> &Path {
        &self.new
    }

    pub fn delay_folder(&self) -> &Path {
        &self.delay
    }

    pub fn queues_folder(&self) -> &Path {
        &self.queues
    }

    pub fn remove_folder(&self) -> &Path {
        &self.remove
    }

    pub fn queue_path(&self, queue: &Queue) -> PathBuf {
        self.queues.join(&queue.id)
    }

    /// Where a message lives in the given state.
    pub fn message_path(&self, state: MessageState, queue: &Queue, message_id: &str) -> PathBuf {
        match state {
            MessageState::New => self.new.join(scoped_name(queue, message_id)),
            MessageState::Available => self.queue_path(queue).join(message_id),
            MessageState::Delayed => self.delay.join(scoped_name(queue, message_id)),
            MessageState::PendingRemoval => self.remove.join(scoped_name(queue, message_id)),
        }
    }

    /// Moves a message between states with a single rename.
    pub fn transition(
        &self,
        queue: &Queue,
        message_id: &str,
        from: MessageState,
        to: MessageState,
    ) -> io::Result<()> {
        fs::rename(
            self.message_path(from, queue, message_id),
            self.message_path(to, queue, message_id),
        )
    }
}

/// `<queue>:<message>`, the file name used outside `queues/<queue>/`.
pub fn scoped_name(queue: &Queue, message_id: &str) -> String {
    format!("{}{NAME_SEPARATOR}{message_id}", queue.id)
}

/// Splits `<queue>:<message>` at the first separator.
pub fn split_scoped_name(name: &str) -> Option<(Queue, &str)> {
    let (queue, message_id) = name.split_once(NAME_SEPARATOR)?;
    if queue.is_empty() || message_id.is_empty() {
        return None;
    }
    Some((Queue::new(queue), message_id))
}
