//! Window projection over the memory log.

use chrono::{DateTime, Duration, Utc};

use crate::models::{Record, Snapshot, TimeBasis};
use crate::storage::MemoryLog;

/// Records whose timestamp under `basis` falls in `[now - window_days, now]`,
/// newest first (ties by dedup key).
pub fn select_window(
    log: &MemoryLog,
    window_days: u32,
    basis: TimeBasis,
    now: DateTime<Utc>,
) -> Vec<Record> {
    let start = now - Duration::days(i64::from(window_days));
    let mut selected: Vec<Record> = log
        .records()
        .filter(|r| {
            let ts = r.timestamp(basis);
            ts >= start && ts <= now
        })
        .cloned()
        .collect();
    selected.sort_by(|a, b| {
        b.timestamp(basis)
            .cmp(&a.timestamp(basis))
            .then_with(|| a.dedup_key.cmp(&b.dedup_key))
    });
    selected
}

/// Project a window of the log into a snapshot stamped `now`.
pub fn project(
    log: &MemoryLog,
    window_days: u32,
    basis: TimeBasis,
    now: DateTime<Utc>,
) -> Snapshot {
    Snapshot::from_records(select_window(log, window_days, basis, now), window_days, now)
}
