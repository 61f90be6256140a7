use std::time::Duration;

use prost::Message as _;

use crate::{
    aggregate::aggregate,
    builder::ClientBuilder,
    forwarder::{CollectorPool, SendOutcome},
    packet::build_packet,
    tags::TagSet,
    timer::{CpuTime, TimerStore},
};

/// The per-request scalar fields captured by the embedding layer at flush
/// time.
///
/// The core treats every field as an opaque input: resource usage, sizes and
/// timings are whatever the embedding measured. Immutable once captured.
#[derive(Clone, Debug, Default)]
pub struct RequestSnapshot {
    /// Name of the host the request was served on.
    pub hostname: String,
    /// Name of the (virtual) server that handled the request.
    pub server_name: String,
    /// Name of the script or handler that produced the response.
    pub script_name: String,
    /// Request schema, e.g. `https`.
    pub schema: Option<String>,
    /// Number of requests served by this worker so far.
    pub request_count: u32,
    /// Size of the produced document, in bytes.
    pub document_size: u32,
    /// Peak memory usage, in bytes.
    pub memory_peak: u32,
    /// Total memory footprint of the process, in bytes.
    pub memory_footprint: u32,
    /// Wall-clock time spent serving the request.
    pub request_time: Duration,
    /// User CPU time consumed by the request.
    pub ru_utime: Duration,
    /// System CPU time consumed by the request.
    pub ru_stime: Duration,
    /// Response status code, if one applies.
    pub status: Option<u32>,
    /// Tags describing the whole request.
    pub tags: TagSet,
}

/// The embedding layer's side of a flush.
///
/// The core calls [`snapshot`][Self::snapshot] once per flush to obtain the
/// request's scalar fields, and [`reset`][Self::reset] afterwards when the
/// flush was requested with [`FlushOptions::reset`] so the embedding can
/// restart its own counters.
pub trait SnapshotSource {
    /// Captures the current request snapshot.
    fn snapshot(&self) -> RequestSnapshot;

    /// Returns the current CPU time reading, used to close out timers that
    /// are stopped implicitly by the flush.
    fn cpu_time(&self) -> Option<CpuTime> {
        None
    }

    /// Resets the embedding's per-request counters after a flush.
    fn reset(&mut self) {}
}

/// Flags controlling one flush.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlushOptions {
    /// Aggregate and send only stopped timers, leaving running timers
    /// untouched. When unset, running timers are stopped first and sent
    /// along with the rest.
    pub only_stopped: bool,
    /// Invoke [`SnapshotSource::reset`] once the flush is done.
    pub reset: bool,
}

/// What one flush did.
///
/// A flush has no fatal error path: transport problems degrade delivery and
/// are reported here, never propagated as a failure of the instrumented
/// workload.
#[derive(Debug)]
pub struct FlushReport {
    /// Number of aggregated timers in the packet.
    pub timers_flushed: usize,
    /// The per-collector send tally.
    pub outcome: SendOutcome,
}

/// The per-request instrumentation client.
///
/// Owns the timer store and the collector pool, and drives the flush
/// pipeline: stop, aggregate, encode, fan out. All operations run
/// synchronously on the caller's thread; the only blocking points are the
/// resolver and socket calls inside [`flush`][Self::flush].
pub struct Client {
    store: TimerStore,
    pool: CollectorPool,
}

impl Client {
    pub(crate) fn new(pool: CollectorPool) -> Self {
        Client { store: TimerStore::new(), pool }
    }

    /// Creates a builder for configuring a `Client`.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Returns the timer store.
    pub fn timers(&self) -> &TimerStore {
        &self.store
    }

    /// Returns the timer store for mutation.
    pub fn timers_mut(&mut self) -> &mut TimerStore {
        &mut self.store
    }

    /// Finalizes the current request's measurements and transmits them.
    ///
    /// Unless [`FlushOptions::only_stopped`] is set, every running timer is
    /// stopped first. Timers whose canonical tag strings match are merged,
    /// the packet is encoded once, and the same datagram is sent to every
    /// resolvable collector. Flushed timers are removed from the store;
    /// under `only_stopped`, running timers survive and keep running.
    pub fn flush(&mut self, source: &mut dyn SnapshotSource, options: FlushOptions) -> FlushReport {
        if !options.only_stopped {
            self.store.stop_all(source.cpu_time());
        }

        let merged = aggregate(&self.store, options.only_stopped);

        let outcome = if self.pool.is_empty() {
            SendOutcome::default()
        } else {
            let snapshot = source.snapshot();
            let packet = build_packet(&snapshot, &merged);
            self.pool.send(&packet.encode_to_vec())
        };

        if options.only_stopped {
            self.store.retain_running();
        } else {
            self.store.clear();
        }

        if options.reset {
            source.reset();
        }

        FlushReport { timers_flushed: merged.len(), outcome }
    }
}

#[cfg(test)]
mod tests {
    use std::{net::UdpSocket, time::Duration};

    use prost::Message as _;

    use super::{FlushOptions, RequestSnapshot, SnapshotSource};
    use crate::{proto, tags::TagSet, Client};

    struct StubSource {
        resets: usize,
    }

    impl StubSource {
        fn new() -> Self {
            StubSource { resets: 0 }
        }
    }

    impl SnapshotSource for StubSource {
        fn snapshot(&self) -> RequestSnapshot {
            RequestSnapshot {
                hostname: "web01".to_string(),
                server_name: "example.com".to_string(),
                script_name: "/checkout".to_string(),
                request_count: 7,
                document_size: 512,
                request_time: Duration::from_millis(42),
                status: Some(200),
                tags: TagSet::from_pairs([("env", "prod")]).unwrap(),
                ..RequestSnapshot::default()
            }
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    fn tags(name: &str) -> TagSet {
        TagSet::from_pairs([("group", name)]).unwrap()
    }

    #[test]
    fn flush_with_no_collectors_is_a_noop_send() {
        let mut client = Client::builder().build();
        client.timers_mut().add(tags("mysql"), 1.0).unwrap();

        let report = client.flush(&mut StubSource::new(), FlushOptions::default());
        assert_eq!(report.timers_flushed, 1);
        assert!(report.outcome.is_clean());
        assert_eq!(report.outcome.attempted, 0);
        assert!(client.timers().is_empty());
    }

    #[test]
    fn flush_stops_and_drops_everything_by_default() {
        let mut client = Client::builder().build();
        client.timers_mut().start(tags("running"), None).unwrap();
        let stopped = client.timers_mut().start(tags("stopped"), None).unwrap();
        client.timers_mut().stop(stopped, None).unwrap();

        let report = client.flush(&mut StubSource::new(), FlushOptions::default());
        assert_eq!(report.timers_flushed, 2);
        assert!(client.timers().is_empty());
    }

    #[test]
    fn only_stopped_flush_keeps_running_timers_alive() {
        let mut client = Client::builder().build();
        let running = client.timers_mut().start(tags("running"), None).unwrap();
        let stopped = client.timers_mut().start(tags("stopped"), None).unwrap();
        client.timers_mut().stop(stopped, None).unwrap();

        let options = FlushOptions { only_stopped: true, ..FlushOptions::default() };
        let report = client.flush(&mut StubSource::new(), options);

        assert_eq!(report.timers_flushed, 1);
        assert_eq!(client.timers().len(), 1);
        assert!(client.timers().get(running).unwrap().started());
    }

    #[test]
    fn reset_flag_invokes_the_source_hook() {
        let mut client = Client::builder().build();
        let mut source = StubSource::new();

        client.flush(&mut source, FlushOptions::default());
        assert_eq!(source.resets, 0);

        client.flush(&mut source, FlushOptions { reset: true, ..FlushOptions::default() });
        assert_eq!(source.resets, 1);
    }

    #[test]
    fn flush_delivers_a_decodable_packet() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut client = Client::builder()
            .with_collectors(&format!("127.0.0.1:{port}"))
            .unwrap()
            .build();

        client.timers_mut().add(tags("mysql"), 1.5).unwrap();
        client.timers_mut().add(tags("mysql"), 2.5).unwrap();

        let report = client.flush(&mut StubSource::new(), FlushOptions::default());
        assert_eq!(report.outcome.delivered, 1);

        let mut buf = [0u8; 65_536];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        let request = proto::Request::decode(&buf[..len]).unwrap();

        assert_eq!(request.hostname, "web01");
        assert_eq!(request.script_name, "/checkout");
        assert_eq!(request.status, Some(200));
        assert_eq!(request.timer_hit_count, vec![2]);
        assert!((request.timer_value[0] - 4.0).abs() < 1e-6);
        assert_eq!(request.tag_name.len(), 1);
    }
}
