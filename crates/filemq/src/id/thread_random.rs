use super::RandSource;
use rand::{Rng, rng};

/// A `RandSource` that uses the thread-local RNG (`rand::rng()`).
///
/// The RNG is cryptographically secure (ChaCha-based) and reseeded
/// periodically from the operating system. This type stores nothing, so it is
/// freely shared across threads even though the underlying `ThreadRng` is not.
#[derive(Default, Clone, Copy, Debug)]
pub struct ThreadRandom;

impl RandSource<u16> for ThreadRandom {
    fn rand(&self) -> u16 {
        rng().random()
    }
}

impl RandSource<u128> for ThreadRandom {
    fn rand(&self) -> u128 {
        rng().random()
    }
}
