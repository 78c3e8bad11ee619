use super::FetchOutcome;
use portable_atomic::{AtomicU64, Ordering};

/// In-process counters of store activity.
///
/// `races_lost` and `duplicate_deliveries` are the observable trace of peer
/// contention; they are never reported to callers as errors.
#[derive(Debug, Default)]
pub struct StoreStats {
    saved: AtomicU64,
    save_failures: AtomicU64,
    delivered: AtomicU64,
    empty: AtomicU64,
    races_lost: AtomicU64,
    duplicate_deliveries: AtomicU64,
    unreadable: AtomicU64,
}

/// A point-in-time copy of [`StoreStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub saved: u64,
    pub save_failures: u64,
    pub delivered: u64,
    pub empty: u64,
    pub races_lost: u64,
    pub duplicate_deliveries: u64,
    pub unreadable: u64,
}

impl StoreStats {
    pub(crate) fn record_save(&self, ok: bool) {
        let counter = if ok { &self.saved } else { &self.save_failures };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch(&self, outcome: &FetchOutcome) {
        let counter = match outcome {
            FetchOutcome::Delivered(_) => &self.delivered,
            FetchOutcome::Duplicate(_) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                &self.duplicate_deliveries
            }
            FetchOutcome::Empty => &self.empty,
            FetchOutcome::RaceLost => &self.races_lost,
            FetchOutcome::Unreadable => &self.unreadable,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            saved: self.saved.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            races_lost: self.races_lost.load(Ordering::Relaxed),
            duplicate_deliveries: self.duplicate_deliveries.load(Ordering::Relaxed),
            unreadable: self.unreadable.load(Ordering::Relaxed),
        }
    }
}
