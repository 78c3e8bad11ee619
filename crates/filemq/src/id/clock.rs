use super::TimeSource;
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of 100-nanosecond ticks between the Gregorian epoch
/// (1582-10-15 00:00:00 UTC) and the Unix epoch.
pub const GREGORIAN_OFFSET_TICKS: u64 = 0x01B2_1DD2_1381_4000;

/// Mask for the 60-bit timestamp carried by a version 1 UUID.
pub const TIMESTAMP_MASK: u64 = (1 << 60) - 1;

/// Wall-clock [`TimeSource`] backed by [`SystemTime`].
///
/// A system clock set before 1970 reads as the Unix epoch rather than
/// failing; the generator keeps ids unique regardless.
#[derive(Default, Clone, Copy, Debug)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_ticks(&self) -> u64 {
        let since_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let ticks = since_unix.as_secs() * 10_000_000 + u64::from(since_unix.subsec_nanos() / 100);
        (ticks + GREGORIAN_OFFSET_TICKS) & TIMESTAMP_MASK
    }
}
