//! Message identifier generation.
//!
//! Two forms share one output shape, the canonical hyphenated UUID string:
//!
//! - a *time-based* form (UUID version 1) built from 100-nanosecond ticks
//!   since the Gregorian calendar reform, a random clock sequence and a
//!   per-process hardware node id, so identifiers sort roughly by creation
//!   time;
//! - a *random* form (UUID version 4) used when no hardware node id can be
//!   found, or when ordering is not needed.

mod clock;
mod form;
mod generator;
mod interface;
mod node;
mod thread_random;


pub use clock::*;
pub use form::*;
pub use generator::*;
pub use interface::*;
pub use node::*;
pub use thread_random::*;
