/// A trait for time sources that return a UUID timestamp.
///
/// This abstraction allows you to plug in the system clock or a mocked time
/// source in tests.
///
/// The unit is **100-nanosecond ticks** since 1582-10-15 00:00:00 UTC, the
/// origin used by version 1 UUIDs. Only the low 60 bits are encoded.
///
/// # Example
///
/// ```
/// use filemq::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_ticks(&self) -> u64 {
///         1234
///     }
/// }
///
/// assert_eq!(FixedTime.current_ticks(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in 100-nanosecond ticks since the Gregorian
    /// epoch.
    fn current_ticks(&self) -> u64;
}

/// A trait for random sources that return random integers.
///
/// The random type `T` is generic (`u16` for clock sequences, `u128` for
/// fully random identifiers).
pub trait RandSource<T> {
    /// Returns a random integer.
    fn rand(&self) -> T;
}
