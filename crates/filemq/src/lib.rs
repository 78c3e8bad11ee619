//! A message-queue storage engine built on a shared filesystem.
//!
//! Queues are directories, messages are files, and every state transition of a
//! message is a single atomic rename. Several processes may share one storage
//! root; the engine tolerates the races this creates and delivers each message
//! *at least once*.
//!
//! ## Components
//!
//! - [`Store`] - owns the directory layout, the saver and fetcher worker pools
//!   and the message lifecycle.
//! - [`RequestRouter`] - maps a `(verb, path)` pair to a named endpoint and
//!   extracts path variables.
//! - [`IdGenerator`] - mints quasi-temporal, globally unique message ids in
//!   the canonical hyphenated UUID layout.

mod error;
mod id;
mod router;
mod store;

pub use crate::error::*;
pub use crate::id::*;
pub use crate::router::*;
pub use crate::store::*;
