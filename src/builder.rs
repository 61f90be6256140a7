use std::time::Duration;

use thiserror::Error;

use crate::{
    client::Client,
    error::AddressError,
    forwarder::{CollectorAddr, CollectorPool},
};

const DEFAULT_RESOLVE_INTERVAL: Duration = Duration::from_secs(60);

/// Errors that could occur while building a [`Client`].
#[derive(Debug, Error)]
pub enum BuildError {
    /// A collector address failed to parse.
    #[error("invalid collector address: {0}")]
    InvalidCollectorAddress(#[from] AddressError),
}

/// Builder for a [`Client`].
#[derive(Debug)]
pub struct ClientBuilder {
    collectors: Vec<CollectorAddr>,
    resolve_interval: Duration,
}

impl ClientBuilder {
    /// Sets the collectors to fan packets out to, replacing any previously
    /// configured ones.
    ///
    /// Takes a space- and/or comma-separated list of addresses; see
    /// [`CollectorAddr::parse`] for the accepted syntaxes. Entries beyond
    /// the pool capacity ([`MAX_COLLECTORS`][crate::MAX_COLLECTORS]) are
    /// dropped at build time.
    ///
    /// Defaults to no collectors, which makes every flush a silent no-op
    /// send.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry in the list fails to parse.
    pub fn with_collectors(mut self, addrs: &str) -> Result<Self, BuildError> {
        self.collectors = CollectorAddr::parse_list(addrs)?;
        Ok(self)
    }

    /// Appends a single collector.
    #[must_use]
    pub fn with_collector(mut self, addr: CollectorAddr) -> Self {
        self.collectors.push(addr);
        self
    }

    /// Sets how long a cached collector resolution stays fresh.
    ///
    /// Collector hostnames are resolved lazily at send time and the result
    /// is cached; once this interval has elapsed the next flush re-resolves.
    ///
    /// Defaults to 60 seconds.
    #[must_use]
    pub fn with_resolve_interval(mut self, interval: Duration) -> Self {
        self.resolve_interval = interval;
        self
    }

    /// Builds the client.
    pub fn build(self) -> Client {
        Client::new(CollectorPool::new(self.collectors, self.resolve_interval))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        ClientBuilder { collectors: Vec::new(), resolve_interval: DEFAULT_RESOLVE_INTERVAL }
    }
}
