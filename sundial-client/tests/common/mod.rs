use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// How a test server treats incoming datagrams.
pub enum Behavior {
    /// Echo each received datagram back after the delay.
    Echo(Duration),
    /// Reply with the given bytes after the delay.
    Reply(Vec<u8>, Duration),
    /// Receive and never reply.
    Silent,
}

/// A loopback UDP server driving one behavior, counting the datagrams it
/// receives.
pub struct TestServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Binds an ephemeral loopback port; must be called on a runtime.
    pub async fn start(behavior: Behavior) -> TestServer {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let task = tokio::spawn(async move {
            let mut buf = [0u8; 512];
            loop {
                let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                match &behavior {
                    Behavior::Echo(delay) => {
                        tokio::time::sleep(*delay).await;
                        let _ = socket.send_to(&buf[..len], peer).await;
                    }
                    Behavior::Reply(data, delay) => {
                        tokio::time::sleep(*delay).await;
                        let _ = socket.send_to(data, peer).await;
                    }
                    Behavior::Silent => {}
                }
            }
        });
        TestServer { addr, hits, task }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The address in `host:port` form, as a named query takes it.
    pub fn server_string(&self) -> String {
        self.addr.to_string()
    }

    /// Number of datagrams received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
