use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use sundial_proto::Packet;

use crate::interrupt::{self, Interrupt};
use crate::single::{self, Exchange, QueryError, QuerySingle};

/// A series of NTP queries over an ordered endpoint list.
///
/// Endpoints are attempted strictly in order with exactly one exchange in
/// flight; a per-endpoint failure advances to the next endpoint, while a
/// success, a cancellation, the last endpoint's failure, or the series
/// timeout ends the series. Each attempt runs under
/// [`QuerySingle::DEFAULT_TIMEOUT`], so the series default leaves room for
/// at least one full attempt plus a fail-over.
pub struct QuerySeries {
    interrupt: watch::Sender<Interrupt>,
}

impl QuerySeries {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

    /// Starts querying `servers` in order, reporting the terminal exchange
    /// to `callback`. `None` (and no work) if `servers` is empty.
    pub fn start<F>(
        runtime: &Handle,
        servers: Vec<SocketAddr>,
        callback: F,
        timeout: Duration,
    ) -> Option<Weak<QuerySeries>>
    where
        F: FnOnce(Exchange) + Send + 'static,
    {
        if servers.is_empty() {
            return None;
        }
        let (sender, receiver) = interrupt::channel();
        let query = Arc::new(QuerySeries { interrupt: sender });
        let weak = Arc::downgrade(&query);
        runtime.spawn(async move {
            callback(run(servers, timeout, receiver).await);
            drop(query);
        });
        Some(weak)
    }

    /// Cancels the series and its active exchange; the callback reports
    /// [`QueryError::Aborted`]. Safe to call from any thread, any number
    /// of times.
    pub fn cancel(&self) {
        interrupt::raise(&self.interrupt);
    }
}

/// Walks the endpoint list until a terminal outcome. On the series
/// deadline the in-flight attempt is abandoned and the outcome adopts its
/// endpoint and elapsed time.
pub(crate) async fn run(
    servers: Vec<SocketAddr>,
    timeout: Duration,
    interrupt: watch::Receiver<Interrupt>,
) -> Exchange {
    let deadline = sleep_until(Instant::now() + timeout);
    tokio::pin!(deadline);
    let last = servers.len() - 1;
    for (index, &server) in servers.iter().enumerate() {
        let attempt_started = Instant::now();
        tokio::select! {
            outcome = single::run(server, QuerySingle::DEFAULT_TIMEOUT, interrupt.clone()) => {
                match &outcome.error {
                    Some(error) if !matches!(error, QueryError::Aborted) && index < last => {
                        debug!(%server, %error, "endpoint failed, trying next");
                    }
                    _ => return outcome,
                }
            }
            () = &mut deadline => {
                debug!(%server, ?timeout, "series timed out");
                return Exchange {
                    endpoint: server,
                    error: Some(QueryError::TimedOut),
                    packet: Packet::default(),
                    rtt: attempt_started.elapsed(),
                };
            }
        }
    }
    unreachable!("the endpoint list is never empty")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_endpoint_list_starts_nothing() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let handle = QuerySeries::start(
            runtime.handle(),
            Vec::new(),
            |_| panic!("callback must not run"),
            QuerySeries::DEFAULT_TIMEOUT,
        );
        assert!(handle.is_none());
    }

    #[test]
    fn series_timeout_exceeds_one_single_timeout() {
        // Leaves room for a timed-out endpoint plus a fail-over attempt.
        assert!(QuerySeries::DEFAULT_TIMEOUT > QuerySingle::DEFAULT_TIMEOUT);
        assert_eq!(QuerySeries::DEFAULT_TIMEOUT, Duration::from_millis(5000));
    }
}
