//! An in-process client for sending tagged request timing data to
//! [Pinba]-compatible collectors over UDP.
//!
//! [Pinba]: http://pinba.org
//!
//! Application code records named, tagged timers over the lifetime of one
//! logical request. At flush time, timers with identical tag sets are merged,
//! every distinct string is interned into a per-packet dictionary, and the
//! resulting Protocol Buffers message is sent to every configured collector
//! as a single UDP datagram. Delivery is strictly best effort: there are no
//! retries, no buffering across requests, and no failure mode that can
//! propagate into the instrumented workload.
//!
//! # Usage
//!
//! ```no_run
//! use pinba_client::{Client, FlushOptions, RequestSnapshot, SnapshotSource, TagSet};
//!
//! // The embedding layer supplies the request-level numbers at flush time.
//! struct RequestState;
//!
//! impl SnapshotSource for RequestState {
//!     fn snapshot(&self) -> RequestSnapshot {
//!         RequestSnapshot {
//!             hostname: "web01".to_string(),
//!             server_name: "example.com".to_string(),
//!             script_name: "/checkout".to_string(),
//!             ..RequestSnapshot::default()
//!         }
//!     }
//! }
//!
//! let mut client = Client::builder()
//!     .with_collectors("10.0.0.1:30002, 10.0.0.2")
//!     .expect("valid collector addresses")
//!     .build();
//!
//! // Record some work.
//! let tags = TagSet::from_pairs([("group", "mysql"), ("server", "db1")]).unwrap();
//! let timer = client.timers_mut().start(tags, None).unwrap();
//! // ... the measured work happens here ...
//! client.timers_mut().stop(timer, None).unwrap();
//!
//! // Aggregate, encode, and fan out to the collectors.
//! let report = client.flush(&mut RequestState, FlushOptions::default());
//! assert_eq!(report.timers_flushed, 1);
//! ```
//!
//! # Concurrency
//!
//! The client has no background threads and no internal locking: every
//! operation runs synchronously on the caller's thread, and the timer store
//! and collector resolution cache are scoped to one logical request. A
//! multi-threaded embedding must add its own synchronization around
//! mutation. Hostname resolution happens on the flush path and can block;
//! embeddings that care about tail latency should bound or isolate the
//! flush call.
//!
//! # Diagnostics
//!
//! The measurement and encoding core performs no logging. The forwarder
//! emits `tracing` events for resolution and transport problems, and every
//! flush returns a [`FlushReport`] so the embedding can decide whether and
//! how to surface degraded delivery.

#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod aggregate;
pub use self::aggregate::{aggregate, AggregatedTimer};

mod builder;
pub use self::builder::{BuildError, ClientBuilder};

mod client;
pub use self::client::{Client, FlushOptions, FlushReport, RequestSnapshot, SnapshotSource};

mod error;
pub use self::error::{AddressError, InputError};

mod forwarder;
pub use self::forwarder::{
    CollectorAddr, SendOutcome, TransportFailure, DEFAULT_COLLECTOR_PORT, MAX_COLLECTORS,
};

mod packet;
pub mod proto;

mod tags;
pub use self::tags::{Tag, TagSet};

mod timer;
pub use self::timer::{CpuTime, Timer, TimerData, TimerFilter, TimerId, TimerStore};
