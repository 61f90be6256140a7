use std::{
    fmt, io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs as _, UdpSocket},
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::error::AddressError;

/// The port collectors listen on when an address does not name one.
pub const DEFAULT_COLLECTOR_PORT: u16 = 30002;

/// Maximum number of collectors in one pool; excess configured entries are
/// dropped.
pub const MAX_COLLECTORS: usize = 8;

/// An unresolved collector endpoint: a host and a port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectorAddr {
    host: String,
    port: u16,
}

impl CollectorAddr {
    /// Parses a single collector address.
    ///
    /// Three syntaxes are accepted:
    ///
    /// - `[host]` or `[host]:port` — the bracket form, required to attach a
    ///   port to an IPv6 literal;
    /// - `host:port` — exactly one colon;
    /// - `host` — no colon at all.
    ///
    /// A bare host with more than one colon is taken as an IPv6 literal with
    /// the default port, since the port separator would be ambiguous.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty address, an unterminated `[`, trailing
    /// characters after `]` that are not a `:port`, or an unparseable port.
    pub fn parse(addr: &str) -> Result<Self, AddressError> {
        if addr.is_empty() {
            return Err(AddressError::Empty);
        }

        if let Some(rest) = addr.strip_prefix('[') {
            let (host, after) =
                rest.split_once(']').ok_or(AddressError::UnterminatedBracket)?;

            let port = match after.strip_prefix(':') {
                Some(port) => port,
                None if after.is_empty() => "",
                None => return Err(AddressError::TrailingGarbage),
            };

            return Ok(CollectorAddr { host: host.to_string(), port: parse_port(port)? });
        }

        match addr.split_once(':') {
            None => Ok(CollectorAddr { host: addr.to_string(), port: DEFAULT_COLLECTOR_PORT }),
            Some((host, port)) if !port.contains(':') => {
                Ok(CollectorAddr { host: host.to_string(), port: parse_port(port)? })
            }
            // Multiple colons without brackets: an IPv6 literal, no port.
            Some(_) => Ok(CollectorAddr { host: addr.to_string(), port: DEFAULT_COLLECTOR_PORT }),
        }
    }

    /// Parses a space- and/or comma-separated list of collector addresses.
    ///
    /// # Errors
    ///
    /// Returns the first parse failure; empty segments are skipped.
    pub fn parse_list(addrs: &str) -> Result<Vec<Self>, AddressError> {
        addrs
            .split([' ', ',', '\t'])
            .filter(|segment| !segment.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Returns the host part.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port part.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for CollectorAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

fn parse_port(port: &str) -> Result<u16, AddressError> {
    if port.is_empty() {
        return Ok(DEFAULT_COLLECTOR_PORT);
    }
    port.parse().map_err(|_| AddressError::InvalidPort { port: port.to_string() })
}

/// One configured collector with its cached resolution state.
struct Collector {
    addr: CollectorAddr,
    endpoint: Option<SocketAddr>,
    socket: Option<UdpSocket>,
    resolved_at: Option<Instant>,
}

impl Collector {
    fn new(addr: CollectorAddr) -> Self {
        Collector { addr, endpoint: None, socket: None, resolved_at: None }
    }

    fn resolution_expired(&self, interval: Duration) -> bool {
        match self.resolved_at {
            Some(resolved_at) => resolved_at.elapsed() >= interval,
            None => true,
        }
    }

    /// Resolves the address and opens a datagram socket of the matching
    /// family, caching both.
    fn resolve(&mut self) -> io::Result<()> {
        let endpoint = (self.addr.host.as_str(), self.addr.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::AddrNotAvailable, "resolver returned no addresses")
            })?;

        let bind_addr: SocketAddr = match endpoint {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(bind_addr)?;

        self.endpoint = Some(endpoint);
        self.socket = Some(socket);
        self.resolved_at = Some(Instant::now());
        Ok(())
    }
}

/// A transport failure on one collector during a fan-out.
#[derive(Debug)]
pub struct TransportFailure {
    /// The collector the send was attempted against.
    pub address: String,
    /// The underlying socket error.
    pub error: io::Error,
}

/// The per-collector tally of one fan-out.
///
/// There is no fatal variant: metrics delivery is best effort, and the worst
/// case is that nothing was delivered.
#[derive(Debug, Default)]
pub struct SendOutcome {
    /// Collectors with a usable resolved endpoint that a send was attempted
    /// against.
    pub attempted: usize,
    /// Sends that succeeded.
    pub delivered: usize,
    /// Collectors skipped because they could not be resolved.
    pub skipped: usize,
    /// Per-collector transport errors.
    pub failures: Vec<TransportFailure>,
}

impl SendOutcome {
    /// Returns `true` if every attempted send succeeded and nothing was
    /// skipped.
    pub fn is_clean(&self) -> bool {
        self.skipped == 0 && self.failures.is_empty()
    }
}

/// The set of configured collectors and their transport sockets.
///
/// Resolution is cached per collector and refreshed lazily once the
/// configured interval has elapsed; a collector that fails to resolve is
/// skipped for the current fan-out and retried on the next one. The cache is
/// read-mostly and not synchronized: a multi-threaded embedding must guard
/// `send` externally.
pub(crate) struct CollectorPool {
    collectors: Vec<Collector>,
    resolve_interval: Duration,
}

impl CollectorPool {
    pub fn new(mut addrs: Vec<CollectorAddr>, resolve_interval: Duration) -> Self {
        if addrs.len() > MAX_COLLECTORS {
            warn!(
                configured = addrs.len(),
                capacity = MAX_COLLECTORS,
                "too many collectors configured, dropping the excess"
            );
            addrs.truncate(MAX_COLLECTORS);
        }

        CollectorPool {
            collectors: addrs.into_iter().map(Collector::new).collect(),
            resolve_interval,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Sends one already-encoded payload to every resolvable collector.
    ///
    /// One `send_to` per collector, no retries. A pool with nothing
    /// resolvable degrades to a silent no-op.
    pub fn send(&mut self, payload: &[u8]) -> SendOutcome {
        let mut outcome = SendOutcome::default();

        for collector in &mut self.collectors {
            if collector.resolution_expired(self.resolve_interval) {
                if let Err(e) = collector.resolve() {
                    warn!(address = %collector.addr, error = %e, "failed to resolve collector");
                }
            }

            // A failed refresh keeps any previously cached endpoint usable.
            let (endpoint, socket) = match (collector.endpoint, collector.socket.as_ref()) {
                (Some(endpoint), Some(socket)) => (endpoint, socket),
                _ => {
                    outcome.skipped += 1;
                    continue;
                }
            };

            outcome.attempted += 1;
            match socket.send_to(payload, endpoint) {
                Ok(_) => {
                    debug!(address = %collector.addr, bytes = payload.len(), "sent packet");
                    outcome.delivered += 1;
                }
                Err(error) => {
                    warn!(address = %collector.addr, error = %error, "failed to send packet");
                    outcome
                        .failures
                        .push(TransportFailure { address: collector.addr.to_string(), error });
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::{net::UdpSocket, time::Duration};

    use super::{CollectorAddr, CollectorPool, DEFAULT_COLLECTOR_PORT, MAX_COLLECTORS};
    use crate::error::AddressError;

    #[test]
    fn parses_host_and_port() {
        let addr = CollectorAddr::parse("127.0.0.1:30002").unwrap();
        assert_eq!(addr.host(), "127.0.0.1");
        assert_eq!(addr.port(), 30002);
    }

    #[test]
    fn parses_bracketed_ipv6_with_port() {
        let addr = CollectorAddr::parse("[::1]:30002").unwrap();
        assert_eq!(addr.host(), "::1");
        assert_eq!(addr.port(), 30002);
    }

    #[test]
    fn parses_bracketed_ipv6_without_port() {
        let addr = CollectorAddr::parse("[::1]").unwrap();
        assert_eq!(addr.host(), "::1");
        assert_eq!(addr.port(), DEFAULT_COLLECTOR_PORT);
    }

    #[test]
    fn bare_host_gets_default_port() {
        let addr = CollectorAddr::parse("example.com").unwrap();
        assert_eq!(addr.host(), "example.com");
        assert_eq!(addr.port(), DEFAULT_COLLECTOR_PORT);
    }

    #[test]
    fn multiple_colons_without_brackets_is_a_bare_ipv6_host() {
        let addr = CollectorAddr::parse("a:b:c").unwrap();
        assert_eq!(addr.host(), "a:b:c");
        assert_eq!(addr.port(), DEFAULT_COLLECTOR_PORT);
    }

    #[test]
    fn empty_port_falls_back_to_default() {
        let addr = CollectorAddr::parse("[::1]:").unwrap();
        assert_eq!(addr.port(), DEFAULT_COLLECTOR_PORT);
    }

    #[test]
    fn malformed_addresses_rejected() {
        assert_eq!(CollectorAddr::parse("").unwrap_err(), AddressError::Empty);
        assert_eq!(
            CollectorAddr::parse("[::1").unwrap_err(),
            AddressError::UnterminatedBracket
        );
        assert_eq!(
            CollectorAddr::parse("[::1]x").unwrap_err(),
            AddressError::TrailingGarbage
        );
        assert_eq!(
            CollectorAddr::parse("host:notaport").unwrap_err(),
            AddressError::InvalidPort { port: "notaport".to_string() }
        );
    }

    #[test]
    fn displays_bracket_form_for_ipv6() {
        assert_eq!(CollectorAddr::parse("[::1]:30002").unwrap().to_string(), "[::1]:30002");
        assert_eq!(CollectorAddr::parse("10.0.0.1").unwrap().to_string(), "10.0.0.1:30002");
    }

    #[test]
    fn parses_mixed_separator_lists() {
        let addrs =
            CollectorAddr::parse_list("127.0.0.1:30002, 10.0.0.1 [::1]:30003").unwrap();
        assert_eq!(addrs.len(), 3);
        assert_eq!(addrs[1].host(), "10.0.0.1");
        assert_eq!(addrs[2].port(), 30003);
    }

    #[test]
    fn pool_drops_collectors_beyond_capacity() {
        let addrs: Vec<_> = (0..MAX_COLLECTORS + 4)
            .map(|i| CollectorAddr::parse(&format!("10.0.0.{i}")).unwrap())
            .collect();

        let pool = CollectorPool::new(addrs, Duration::from_secs(60));
        assert_eq!(pool.collectors.len(), MAX_COLLECTORS);
    }

    #[test]
    fn empty_pool_send_is_a_silent_noop() {
        let mut pool = CollectorPool::new(Vec::new(), Duration::from_secs(60));
        let outcome = pool.send(b"payload");

        assert!(outcome.is_clean());
        assert_eq!(outcome.attempted, 0);
        assert_eq!(outcome.delivered, 0);
    }

    #[test]
    fn unresolvable_collector_does_not_block_the_rest() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let port = receiver.local_addr().unwrap().port();

        let addrs = vec![
            CollectorAddr::parse("nonexistent.invalid:30002").unwrap(),
            CollectorAddr::parse(&format!("127.0.0.1:{port}")).unwrap(),
        ];
        let mut pool = CollectorPool::new(addrs, Duration::from_secs(60));

        let outcome = pool.send(b"hello");
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.attempted, 1);
        assert_eq!(outcome.delivered, 1);
        assert!(outcome.failures.is_empty());

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"hello");
    }

    #[test]
    fn resolution_is_cached_between_sends() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = receiver.local_addr().unwrap().port();

        let addrs = vec![CollectorAddr::parse(&format!("127.0.0.1:{port}")).unwrap()];
        let mut pool = CollectorPool::new(addrs, Duration::from_secs(3600));

        pool.send(b"one");
        let resolved_at = pool.collectors[0].resolved_at.unwrap();
        pool.send(b"two");
        assert_eq!(pool.collectors[0].resolved_at.unwrap(), resolved_at);
    }
}
