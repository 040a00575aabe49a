use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace, warn};

use sundial_proto::{NtpTimestamp, Packet};

use crate::interrupt::{self, Interrupt};

/// One byte of headroom over the fixed message length, so an oversized
/// datagram shows up as a size mismatch instead of being truncated by the
/// socket.
const RECV_BUFFER: usize = Packet::LENGTH + 1;

/// Why a query did not produce a server packet.
///
/// Transport errors are carried verbatim; the other variants are produced
/// by the query machinery itself.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The caller cancelled the query.
    #[error("query aborted")]
    Aborted,
    /// The timeout elapsed before a reply arrived.
    #[error("query timed out")]
    TimedOut,
    /// A reply arrived with the wrong byte count.
    #[error("reply was {0} bytes, expected 48")]
    MessageSize(usize),
    /// The request could not be sent.
    #[error("send failed: {0}")]
    Send(#[source] io::Error),
    /// The reply could not be received.
    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),
}

/// Outcome of one request/response exchange with one server endpoint.
///
/// On success `packet` is the server reply; on a send failure it is the
/// client request that could not be sent; otherwise it is null. `rtt` is
/// measured on the monotonic clock from just before the send.
#[derive(Debug)]
pub struct Exchange {
    pub endpoint: SocketAddr,
    pub error: Option<QueryError>,
    pub packet: Packet,
    pub rtt: Duration,
}

impl Exchange {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    fn failed(endpoint: SocketAddr, error: QueryError, packet: Packet, rtt: Duration) -> Exchange {
        Exchange {
            endpoint,
            error: Some(error),
            packet,
            rtt,
        }
    }
}

/// A single one-shot NTP query against one UDP endpoint.
///
/// The query runs as one task on the supplied runtime and reports through
/// its callback exactly once. [`QuerySingle::start`] hands back a weak
/// handle only; the task keeps the sole strong reference and releases it
/// right after the callback, so an expired handle means the outcome has
/// been delivered.
pub struct QuerySingle {
    interrupt: watch::Sender<Interrupt>,
}

impl QuerySingle {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

    /// Starts querying `server`, reporting to `callback` when the exchange
    /// settles.
    pub fn start<F>(
        runtime: &Handle,
        server: SocketAddr,
        callback: F,
        timeout: Duration,
    ) -> Weak<QuerySingle>
    where
        F: FnOnce(Exchange) + Send + 'static,
    {
        let (sender, receiver) = interrupt::channel();
        let query = Arc::new(QuerySingle { interrupt: sender });
        let weak = Arc::downgrade(&query);
        runtime.spawn(async move {
            callback(run(server, timeout, receiver).await);
            drop(query);
        });
        weak
    }

    /// Cancels the query; the callback reports [`QueryError::Aborted`].
    /// Safe to call from any thread, any number of times.
    pub fn cancel(&self) {
        interrupt::raise(&self.interrupt);
    }
}

fn interrupt_error(state: Interrupt) -> Option<QueryError> {
    match state {
        Interrupt::Cancelled => Some(QueryError::Aborted),
        Interrupt::None => None,
    }
}

/// Drives one exchange to completion. The deadline is armed before the
/// send, so the timeout covers the whole exchange.
pub(crate) async fn run(
    server: SocketAddr,
    timeout: Duration,
    mut interrupt: watch::Receiver<Interrupt>,
) -> Exchange {
    let deadline = Instant::now() + timeout;
    let packet = Packet::poll_message(NtpTimestamp::from_system_time(SystemTime::now()));
    let started = Instant::now();

    if let Some(error) = interrupt_error(*interrupt.borrow_and_update()) {
        return Exchange::failed(server, error, Packet::default(), Duration::ZERO);
    }

    let socket = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await {
        Ok(socket) => socket,
        Err(err) => {
            debug!(%server, error = %err, "could not open client socket");
            return Exchange::failed(server, QueryError::Send(err), packet, started.elapsed());
        }
    };

    if let Err(err) = socket.send_to(&packet.data(), server).await {
        debug!(%server, error = %err, "send failed");
        return Exchange::failed(server, QueryError::Send(err), packet, started.elapsed());
    }
    trace!(%server, "request sent");

    let mut buf = [0u8; RECV_BUFFER];
    let mut armed = true;
    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let rtt = started.elapsed();
                return match received {
                    Ok((len, _)) => match Packet::try_from(&buf[..len]) {
                        Ok(reply) => {
                            trace!(%server, ?rtt, "reply received");
                            Exchange { endpoint: server, error: None, packet: reply, rtt }
                        }
                        Err(_) => {
                            warn!(%server, size = len, "reply has unexpected size");
                            Exchange::failed(
                                server,
                                QueryError::MessageSize(len),
                                Packet::default(),
                                rtt,
                            )
                        }
                    },
                    Err(err) => {
                        debug!(%server, error = %err, "receive failed");
                        Exchange::failed(server, QueryError::Receive(err), Packet::default(), rtt)
                    }
                };
            }
            () = sleep_until(deadline) => {
                debug!(%server, ?timeout, "no reply within timeout");
                return Exchange::failed(
                    server,
                    QueryError::TimedOut,
                    Packet::default(),
                    started.elapsed(),
                );
            }
            changed = interrupt.changed(), if armed => {
                match changed {
                    Err(_) => armed = false,
                    Ok(()) => {
                        if let Some(error) = interrupt_error(*interrupt.borrow_and_update()) {
                            return Exchange::failed(
                                server,
                                error,
                                Packet::default(),
                                started.elapsed(),
                            );
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_three_seconds() {
        assert_eq!(QuerySingle::DEFAULT_TIMEOUT, Duration::from_millis(3000));
    }

    #[test]
    fn interrupt_translation() {
        assert!(interrupt_error(Interrupt::None).is_none());
        assert!(matches!(
            interrupt_error(Interrupt::Cancelled),
            Some(QueryError::Aborted)
        ));
    }
}
