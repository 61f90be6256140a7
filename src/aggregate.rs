use std::time::Duration;

use indexmap::IndexMap;

use crate::{
    tags::TagSet,
    timer::{Timer, TimerFilter, TimerStore},
};

/// A deduplicated timer produced by [`aggregate`].
///
/// Tags are held in canonical (name-sorted) order, which is the order they
/// are serialized in.
#[derive(Clone, Debug)]
pub struct AggregatedTimer {
    pub(crate) tags: TagSet,
    pub(crate) value: Duration,
    pub(crate) hit_count: u32,
    pub(crate) ru_utime: Duration,
    pub(crate) ru_stime: Duration,
}

impl AggregatedTimer {
    /// Returns the tags, in canonical order.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Returns the summed value of the merged timers.
    pub fn value(&self) -> Duration {
        self.value
    }

    /// Returns the summed hit count of the merged timers.
    pub fn hit_count(&self) -> u32 {
        self.hit_count
    }

    /// Returns the summed user CPU time of the merged timers.
    pub fn ru_utime(&self) -> Duration {
        self.ru_utime
    }

    /// Returns the summed system CPU time of the merged timers.
    pub fn ru_stime(&self) -> Duration {
        self.ru_stime
    }
}

/// Merges timers whose tag sets canonicalize to the same byte string.
///
/// Merging sums values, hit counts, and CPU deltas; a timer that already
/// represents a batch contributes its whole hit count, not one. When
/// `only_stopped` is set, running timers are excluded entirely. Output order
/// is the first-seen order of each distinct canonical key.
pub fn aggregate(store: &TimerStore, only_stopped: bool) -> Vec<AggregatedTimer> {
    let filter = if only_stopped { TimerFilter::StoppedOnly } else { TimerFilter::All };

    let mut merged: IndexMap<Vec<u8>, AggregatedTimer> = IndexMap::new();
    for (_, timer) in store.iter(filter) {
        merge_into(&mut merged, timer);
    }

    merged.into_values().collect()
}

fn merge_into(merged: &mut IndexMap<Vec<u8>, AggregatedTimer>, timer: &Timer) {
    // Stores guarantee non-empty tag sets, so a key always exists.
    let Some(key) = timer.tags().canonical() else {
        return;
    };

    match merged.get_mut(&key) {
        Some(entry) => {
            entry.value += timer.value();
            entry.hit_count += timer.hit_count();
            entry.ru_utime += timer.ru_utime();
            entry.ru_stime += timer.ru_stime();
        }
        None => {
            merged.insert(
                key,
                AggregatedTimer {
                    tags: timer.tags().sorted(),
                    value: timer.value(),
                    hit_count: timer.hit_count(),
                    ru_utime: timer.ru_utime(),
                    ru_stime: timer.ru_stime(),
                },
            );
        }
    }
}
