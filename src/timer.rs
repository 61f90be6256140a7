use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use crate::{error::InputError, tags::TagSet};

/// Opaque user data attached to a timer.
///
/// The core never interprets it; it only carries it for the lifetime of the
/// timer so the embedding layer can read it back.
pub type TimerData = BTreeMap<String, String>;

/// A user/system CPU time reading, supplied by the embedding layer.
///
/// The core does not read process resource usage itself: the embedding takes
/// a reading when a timer starts and another when it stops, and the timer
/// accumulates the delta.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuTime {
    /// User CPU time.
    pub utime: Duration,
    /// System CPU time.
    pub stime: Duration,
}

impl CpuTime {
    fn delta_since(&self, earlier: &CpuTime) -> CpuTime {
        CpuTime {
            utime: self.utime.saturating_sub(earlier.utime),
            stime: self.stime.saturating_sub(earlier.stime),
        }
    }
}

/// Converts a duration to whole-plus-fractional seconds as encoded on the
/// wire: seconds plus whole microseconds over one million.
pub(crate) fn duration_to_secs(value: Duration) -> f32 {
    value.as_secs() as f32 + value.subsec_micros() as f32 / 1_000_000.0
}

/// Converts fractional seconds to a duration, truncating below microsecond
/// precision.
///
/// # Errors
///
/// Returns an error if the value is negative, infinite, or NaN.
pub(crate) fn secs_to_duration(value: f64) -> Result<Duration, InputError> {
    if !value.is_finite() || value < 0.0 {
        return Err(InputError::InvalidValue { value });
    }

    let micros = (value * 1_000_000.0) as u64;
    Ok(Duration::from_micros(micros))
}

/// A single tagged duration measurement within a request.
///
/// A timer is either running (its value still growing) or stopped (its value
/// frozen). The tag set is never empty.
#[derive(Clone, Debug)]
pub struct Timer {
    tags: TagSet,
    value: Duration,
    started_at: Option<Instant>,
    hit_count: u32,
    ru_utime: Duration,
    ru_stime: Duration,
    cpu_baseline: Option<CpuTime>,
    data: Option<TimerData>,
}

impl Timer {
    fn running(tags: TagSet, cpu: Option<CpuTime>) -> Self {
        Timer {
            tags,
            value: Duration::ZERO,
            started_at: Some(Instant::now()),
            hit_count: 1,
            ru_utime: Duration::ZERO,
            ru_stime: Duration::ZERO,
            cpu_baseline: cpu,
            data: None,
        }
    }

    fn stopped(tags: TagSet, value: Duration) -> Self {
        Timer {
            tags,
            value,
            started_at: None,
            hit_count: 1,
            ru_utime: Duration::ZERO,
            ru_stime: Duration::ZERO,
            cpu_baseline: None,
            data: None,
        }
    }

    /// Returns `true` if the timer is still running.
    pub fn started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Returns the timer's value.
    ///
    /// For a running timer this is computed live: the accumulated value plus
    /// the time elapsed since it was (re)started.
    pub fn value(&self) -> Duration {
        match self.started_at {
            Some(started_at) => self.value + started_at.elapsed(),
            None => self.value,
        }
    }

    /// Returns the number of hits this timer represents.
    pub fn hit_count(&self) -> u32 {
        self.hit_count
    }

    /// Returns the accumulated user CPU time delta.
    pub fn ru_utime(&self) -> Duration {
        self.ru_utime
    }

    /// Returns the accumulated system CPU time delta.
    pub fn ru_stime(&self) -> Duration {
        self.ru_stime
    }

    /// Returns the timer's tags.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Returns the attached user data, if any.
    pub fn data(&self) -> Option<&TimerData> {
        self.data.as_ref()
    }

    /// Upserts tags from `tags` into the timer's tag set.
    pub fn merge_tags(&mut self, tags: TagSet) {
        self.tags.merge(tags);
    }

    /// Replaces the timer's tag set.
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement set is empty, leaving the existing
    /// tags untouched.
    pub fn replace_tags(&mut self, tags: TagSet) -> Result<(), InputError> {
        if tags.is_empty() {
            return Err(InputError::EmptyTagSet);
        }
        self.tags = tags;
        Ok(())
    }

    /// Merges entries into the attached user data, creating it if absent.
    pub fn merge_data(&mut self, data: TimerData) {
        self.data.get_or_insert_with(TimerData::new).extend(data);
    }

    /// Replaces the attached user data; `None` removes it.
    pub fn replace_data(&mut self, data: Option<TimerData>) {
        self.data = data;
    }

    fn stop(&mut self, cpu: Option<CpuTime>) -> Result<(), InputError> {
        let started_at = self.started_at.take().ok_or(InputError::AlreadyStopped)?;
        self.value += started_at.elapsed();

        if let (Some(baseline), Some(current)) = (self.cpu_baseline.take(), cpu) {
            let delta = current.delta_since(&baseline);
            self.ru_utime += delta.utime;
            self.ru_stime += delta.stime;
        }

        Ok(())
    }
}

/// A handle to a timer in a [`TimerStore`].
///
/// Handles are only meaningful for the store that issued them and become
/// dangling once the timer is deleted or the store is cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerId(usize);

/// Filter for iterating over the timers in a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerFilter {
    /// Every live timer.
    All,
    /// Only timers that are still running.
    RunningOnly,
    /// Only timers that have been stopped.
    StoppedOnly,
}

impl TimerFilter {
    fn matches(&self, timer: &Timer) -> bool {
        match self {
            TimerFilter::All => true,
            TimerFilter::RunningOnly => timer.started(),
            TimerFilter::StoppedOnly => !timer.started(),
        }
    }
}

/// The per-request collection of live timers.
///
/// Timers live in an arena indexed by [`TimerId`]; deletion leaves a hole so
/// existing handles stay valid. The store is scoped to one logical request
/// and is not synchronized: a multi-threaded embedding must add its own
/// locking around mutation.
#[derive(Debug, Default)]
pub struct TimerStore {
    slots: Vec<Option<Timer>>,
}

impl TimerStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new running timer.
    ///
    /// `cpu` is the embedding's CPU time reading at start, used as the
    /// baseline for the delta accumulated at stop.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag set is empty; no timer is created.
    pub fn start(&mut self, tags: TagSet, cpu: Option<CpuTime>) -> Result<TimerId, InputError> {
        if tags.is_empty() {
            return Err(InputError::EmptyTagSet);
        }
        Ok(self.push(Timer::running(tags, cpu)))
    }

    /// Adds an already-measured, stopped timer with the given value in
    /// seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag set is empty or the value is not a finite
    /// non-negative number; no timer is created.
    pub fn add(&mut self, tags: TagSet, value: f64) -> Result<TimerId, InputError> {
        self.add_batch(tags, value, 1)
    }

    /// Adds a stopped timer representing a pre-aggregated batch of
    /// `hit_count` measurements totalling `value` seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag set is empty or the value is not a finite
    /// non-negative number; no timer is created.
    pub fn add_batch(
        &mut self,
        tags: TagSet,
        value: f64,
        hit_count: u32,
    ) -> Result<TimerId, InputError> {
        if tags.is_empty() {
            return Err(InputError::EmptyTagSet);
        }
        let value = secs_to_duration(value)?;
        let mut timer = Timer::stopped(tags, value);
        timer.hit_count = hit_count;
        Ok(self.push(timer))
    }

    fn push(&mut self, timer: Timer) -> TimerId {
        // Reuse the first free slot, if any.
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(timer);
                return TimerId(idx);
            }
        }

        self.slots.push(Some(timer));
        TimerId(self.slots.len() - 1)
    }

    /// Stops a running timer, freezing its value and accumulating the CPU
    /// delta against the baseline taken at start.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is dangling or the timer is already
    /// stopped.
    pub fn stop(&mut self, id: TimerId, cpu: Option<CpuTime>) -> Result<(), InputError> {
        self.get_mut(id)?.stop(cpu)
    }

    /// Stops every running timer. Already-stopped timers are left as they
    /// are.
    pub fn stop_all(&mut self, cpu: Option<CpuTime>) {
        for timer in self.slots.iter_mut().flatten() {
            if timer.started() {
                // Cannot fail: we just checked it is running.
                let _ = timer.stop(cpu);
            }
        }
    }

    /// Deletes a timer, releasing its slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is dangling.
    pub fn delete(&mut self, id: TimerId) -> Result<(), InputError> {
        let slot = self.slots.get_mut(id.0).ok_or(InputError::UnknownTimer)?;
        if slot.take().is_none() {
            return Err(InputError::UnknownTimer);
        }
        Ok(())
    }

    /// Returns a reference to a timer.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is dangling.
    pub fn get(&self, id: TimerId) -> Result<&Timer, InputError> {
        self.slots.get(id.0).and_then(Option::as_ref).ok_or(InputError::UnknownTimer)
    }

    /// Returns a mutable reference to a timer.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is dangling.
    pub fn get_mut(&mut self, id: TimerId) -> Result<&mut Timer, InputError> {
        self.slots.get_mut(id.0).and_then(Option::as_mut).ok_or(InputError::UnknownTimer)
    }

    /// Iterates over live timers matching `filter`, in creation order.
    pub fn iter(&self, filter: TimerFilter) -> impl Iterator<Item = (TimerId, &Timer)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|t| (TimerId(idx), t)))
            .filter(move |(_, t)| filter.matches(t))
    }

    /// Returns the number of live timers.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Returns `true` if there are no live timers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every timer.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Removes stopped timers, keeping running ones alive.
    pub fn retain_running(&mut self) {
        for slot in self.slots.iter_mut() {
            if matches!(slot, Some(t) if !t.started()) {
                *slot = None;
            }
        }
    }
}
