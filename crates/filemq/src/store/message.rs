use core::fmt;

/// A named, independently addressable sequence of messages.
///
/// A queue exists exactly when its directory exists under the queues root.
/// The store does not validate the id; the front-end's route pattern does.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Queue {
    pub id: String,
}

impl Queue {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// A message id and its opaque payload.
///
/// The id is assigned once at creation and the payload never changes after it
/// has been persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub content: Vec<u8>,
}

impl Message {
    pub fn new(id: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

/// Lifecycle state of a message. Each state is a folder and each transition
/// is a rename between folders, so a message is in exactly one state at a
/// time.
///
/// ```text
/// New --(mover)--> Available --(fetch)--> Delayed --(delete)--> PendingRemoval --(reaper)--> gone
///  |                   |                     |
///  +-------------------+------(delete)-------+----------------> PendingRemoval
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageState {
    /// `new/<queue>:<message>`: saved, not yet queued.
    New,
    /// `queues/<queue>/<message>`: available for delivery.
    Available,
    /// `delay/<queue>:<message>`: claimed by a consumer, in flight.
    Delayed,
    /// `remove/<queue>:<message>`: waiting for physical deletion.
    PendingRemoval,
}

impl MessageState {
    pub const fn folder(self) -> &'static str {
        match self {
            Self::New => super::NEW_FOLDER,
            Self::Available => super::QUEUES_FOLDER,
            Self::Delayed => super::DELAY_FOLDER,
            Self::PendingRemoval => super::REMOVE_FOLDER,
        }
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder())
    }
}
