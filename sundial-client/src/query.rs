use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

use sundial_proto::Packet;

use crate::interrupt::{self, Interrupt};
use crate::series::{self, QuerySeries};
use crate::single::QueryError;

/// Terminal status of a named query.
///
/// The values are distinct powers of two so observers can accumulate them
/// bitwise; they are stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    /// The server name did not resolve to any usable address.
    ResolveError = 1,
    /// The request could not be sent.
    SendError = 2,
    /// No valid reply was received.
    ReceiveError = 4,
    /// The query timed out before completing.
    TimeoutError = 8,
    /// The caller cancelled the query.
    Cancelled = 16,
    /// A server reply was received.
    Succeeded = 32,
}

impl Status {
    /// The stable numeric encoding, usable as a bit flag.
    pub const fn as_flag(self) -> u8 {
        self as u8
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Status::Succeeded)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::ResolveError => "resolve error",
            Status::SendError => "send error",
            Status::ReceiveError => "receive error",
            Status::TimeoutError => "timeout",
            Status::Cancelled => "cancelled",
            Status::Succeeded => "succeeded",
        })
    }
}

/// Final outcome of a named query.
///
/// `address` is the endpoint the terminal exchange talked to, or `None`
/// when the query ended before resolution. `rtt` is zero when there is no
/// meaningful timing (resolution failure, overall timeout, cancellation
/// outside an exchange).
#[derive(Debug)]
pub struct QueryResult {
    /// The server string exactly as the caller supplied it.
    pub server: String,
    pub address: Option<SocketAddr>,
    pub status: Status,
    /// The server reply on success, the unsent client packet on a send
    /// error, a null packet otherwise.
    pub packet: Packet,
    pub rtt: Duration,
}

/// An ephemeral named NTP query, from server string to terminal status.
///
/// Runs as a single task (its private execution context) on the supplied
/// runtime: resolution, every exchange of the endpoint series, the overall
/// timer, and cancellation are all serialized on it, and whichever settles
/// first decides the outcome. The callback runs exactly once; afterwards
/// the weak handle expires.
pub struct Query {
    interrupt: watch::Sender<Interrupt>,
}

impl Query {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);
    pub const DEFAULT_PORT: &'static str = "123";

    /// Starts a query for `server` (`host[:port]`, port defaulting to 123),
    /// reporting to `callback` when it settles.
    pub fn start<F>(runtime: &Handle, server: &str, callback: F, timeout: Duration) -> Weak<Query>
    where
        F: FnOnce(QueryResult) + Send + 'static,
    {
        let (sender, receiver) = interrupt::channel();
        let query = Arc::new(Query { interrupt: sender });
        let weak = Arc::downgrade(&query);
        let server = server.to_string();
        runtime.spawn(async move {
            callback(run(server, timeout, receiver).await);
            drop(query);
        });
        weak
    }

    /// Cancels the query; the callback reports [`Status::Cancelled`]. Safe
    /// to call from any thread, any number of times.
    pub fn cancel(&self) {
        interrupt::raise(&self.interrupt);
    }
}

fn split_server(server: &str) -> (&str, &str) {
    match server.split_once(':') {
        Some((host, port)) => (host, port),
        None => (server, Query::DEFAULT_PORT),
    }
}

async fn resolve(host: &str, port: &str) -> io::Result<Vec<SocketAddr>> {
    let port: u16 = port.parse().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unknown service name {port:?}"),
        )
    })?;
    Ok(tokio::net::lookup_host((host, port)).await?.collect())
}

fn synthesized(server: &str, status: Status) -> QueryResult {
    QueryResult {
        server: server.to_string(),
        address: None,
        status,
        packet: Packet::default(),
        rtt: Duration::ZERO,
    }
}

async fn run(
    server: String,
    timeout: Duration,
    mut interrupt: watch::Receiver<Interrupt>,
) -> QueryResult {
    let deadline = sleep_until(Instant::now() + timeout);
    tokio::pin!(deadline);
    let body = run_resolved(&server, interrupt.clone());
    tokio::pin!(body);
    let mut armed = true;
    loop {
        tokio::select! {
            result = &mut body => return result,
            () = &mut deadline => {
                debug!(%server, ?timeout, "query timed out");
                return synthesized(&server, Status::TimeoutError);
            }
            changed = interrupt.changed(), if armed => {
                match changed {
                    Err(_) => armed = false,
                    Ok(()) => match *interrupt.borrow_and_update() {
                        Interrupt::Cancelled => {
                            debug!(%server, "query cancelled");
                            return synthesized(&server, Status::Cancelled);
                        }
                        Interrupt::None => {}
                    },
                }
            }
        }
    }
}

/// Resolution followed by the endpoint series, with the series outcome
/// translated into the flat status taxonomy. The translation is total:
/// every lower-layer outcome maps to exactly one status.
async fn run_resolved(server: &str, interrupt: watch::Receiver<Interrupt>) -> QueryResult {
    let (host, port) = split_server(server);
    let endpoints = match resolve(host, port).await {
        Ok(endpoints) if !endpoints.is_empty() => endpoints,
        Ok(_) => {
            debug!(server, "resolution yielded no addresses");
            return synthesized(server, Status::ResolveError);
        }
        Err(err) => {
            debug!(server, error = %err, "resolution failed");
            return synthesized(server, Status::ResolveError);
        }
    };
    trace!(server, count = endpoints.len(), "resolved");

    let outcome = series::run(endpoints, QuerySeries::DEFAULT_TIMEOUT, interrupt).await;
    let status = match &outcome.error {
        None => Status::Succeeded,
        Some(QueryError::Aborted) => Status::Cancelled,
        Some(QueryError::TimedOut) => Status::TimeoutError,
        Some(QueryError::Send(_)) => Status::SendError,
        Some(QueryError::Receive(_)) | Some(QueryError::MessageSize(_)) => Status::ReceiveError,
    };
    QueryResult {
        server: server.to_string(),
        address: Some(outcome.endpoint),
        status,
        packet: outcome.packet,
        rtt: outcome.rtt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_string_splits_at_first_colon() {
        assert_eq!(split_server("pool.ntp.org"), ("pool.ntp.org", "123"));
        assert_eq!(split_server("pool.ntp.org:5678"), ("pool.ntp.org", "5678"));
        assert_eq!(split_server("127.0.0.1:ntp"), ("127.0.0.1", "ntp"));
        assert_eq!(split_server("host:1:2"), ("host", "1:2"));
        assert_eq!(split_server(""), ("", "123"));
    }

    #[test]
    fn status_flags_are_distinct_powers_of_two() {
        let statuses = [
            Status::ResolveError,
            Status::SendError,
            Status::ReceiveError,
            Status::TimeoutError,
            Status::Cancelled,
            Status::Succeeded,
        ];
        let mut seen = 0u8;
        for status in statuses {
            let flag = status.as_flag();
            assert_eq!(flag.count_ones(), 1);
            assert_eq!(seen & flag, 0);
            seen |= flag;
        }
        assert_eq!(Status::ResolveError.as_flag(), 1);
        assert_eq!(Status::Succeeded.as_flag(), 32);
        assert!(Status::Succeeded.is_success());
        assert!(!Status::Cancelled.is_success());
    }

    #[test]
    fn default_timeouts_are_layered() {
        assert_eq!(Query::DEFAULT_TIMEOUT, QuerySeries::DEFAULT_TIMEOUT);
        assert!(Query::DEFAULT_TIMEOUT > crate::QuerySingle::DEFAULT_TIMEOUT);
    }
}
