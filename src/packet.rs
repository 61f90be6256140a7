use indexmap::IndexMap;

use crate::{
    aggregate::AggregatedTimer,
    client::RequestSnapshot,
    proto,
    timer::duration_to_secs,
};

/// A string-interning table scoped to one packet build.
///
/// Ids are dense, assigned from zero in first-seen order, so the id doubles
/// as the string's index in the serialized dictionary.
#[derive(Debug, Default)]
pub(crate) struct Dictionary {
    ids: IndexMap<String, u32>,
}

impl Dictionary {
    fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `s`, assigning the next id if it has not been seen
    /// before.
    fn id_of(&mut self, s: &str) -> u32 {
        if let Some(id) = self.ids.get(s) {
            return *id;
        }

        let id = self.ids.len() as u32;
        self.ids.insert(s.to_string(), id);
        id
    }

    fn into_strings(self) -> Vec<String> {
        self.ids.into_keys().collect()
    }
}

/// Assembles the wire message for one flush.
///
/// Interning order is fixed: the snapshot's global tags first (name, then
/// value, per tag), then each aggregated timer's tags in canonical order.
/// Per-timer tag references are flattened into one pair of arrays, sliced by
/// `timer_tag_count`, so the message keeps a fixed number of top-level
/// fields no matter how many timers there are.
pub(crate) fn build_packet(
    snapshot: &RequestSnapshot,
    timers: &[AggregatedTimer],
) -> proto::Request {
    let mut dict = Dictionary::new();

    let mut tag_name = Vec::with_capacity(snapshot.tags.len());
    let mut tag_value = Vec::with_capacity(snapshot.tags.len());
    for tag in snapshot.tags.iter() {
        tag_name.push(dict.id_of(tag.name()));
        tag_value.push(dict.id_of(tag.value()));
    }

    let mut timer_hit_count = Vec::with_capacity(timers.len());
    let mut timer_value = Vec::with_capacity(timers.len());
    let mut timer_ru_utime = Vec::with_capacity(timers.len());
    let mut timer_ru_stime = Vec::with_capacity(timers.len());
    let mut timer_tag_count = Vec::with_capacity(timers.len());
    let mut timer_tag_name = Vec::new();
    let mut timer_tag_value = Vec::new();

    for timer in timers {
        for tag in timer.tags().iter() {
            timer_tag_name.push(dict.id_of(tag.name()));
            timer_tag_value.push(dict.id_of(tag.value()));
        }

        timer_tag_count.push(timer.tags().len() as u32);
        timer_hit_count.push(timer.hit_count());
        timer_value.push(duration_to_secs(timer.value()));
        timer_ru_utime.push(duration_to_secs(timer.ru_utime()));
        timer_ru_stime.push(duration_to_secs(timer.ru_stime()));
    }

    proto::Request {
        hostname: snapshot.hostname.clone(),
        server_name: snapshot.server_name.clone(),
        script_name: snapshot.script_name.clone(),
        request_count: snapshot.request_count,
        document_size: snapshot.document_size,
        memory_peak: snapshot.memory_peak,
        request_time: duration_to_secs(snapshot.request_time),
        ru_utime: duration_to_secs(snapshot.ru_utime),
        ru_stime: duration_to_secs(snapshot.ru_stime),
        timer_hit_count,
        timer_value,
        timer_tag_count,
        timer_tag_name,
        timer_tag_value,
        dictionary: dict.into_strings(),
        status: snapshot.status,
        memory_footprint: Some(snapshot.memory_footprint),
        tag_name,
        tag_value,
        timer_ru_utime,
        timer_ru_stime,
        schema: snapshot.schema.clone(),
    }
}
