mod common;

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Runtime;

use common::{Behavior, TestServer};
use sundial_client::{Client, Status};

const WAIT: Duration = Duration::from_secs(15);

#[test]
fn concurrent_queries_each_report_once() {
    const N: usize = 4;
    let runtime = Runtime::new().unwrap();
    let servers: Vec<TestServer> = (0..N)
        .map(|_| runtime.block_on(TestServer::start(Behavior::Echo(Duration::from_millis(50)))))
        .collect();

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let client = Arc::new(
        Client::new(move |result| tx.lock().unwrap().send(result).unwrap()).unwrap(),
    );

    let threads: Vec<_> = servers
        .iter()
        .map(|server| {
            let client = Arc::clone(&client);
            let server = server.server_string();
            std::thread::spawn(move || client.query(&server))
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    let mut seen: Vec<String> = (0..N)
        .map(|_| {
            let result = rx.recv_timeout(WAIT).unwrap();
            assert_eq!(result.status, Status::Succeeded);
            assert_eq!(result.address.unwrap().to_string(), result.server);
            result.server
        })
        .collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), N);
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    for server in &servers {
        assert_eq!(server.hits(), 1);
    }
}

#[test]
fn cancel_all_then_query_again() {
    let runtime = Runtime::new().unwrap();
    let silent: Vec<TestServer> = (0..3)
        .map(|_| runtime.block_on(TestServer::start(Behavior::Silent)))
        .collect();

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let client = Client::new(move |result| tx.lock().unwrap().send(result).unwrap()).unwrap();

    for server in &silent {
        client.query_with_timeout(&server.server_string(), Duration::from_secs(30));
    }
    std::thread::sleep(Duration::from_millis(150));
    client.cancel();
    // Cancelling with nothing left in flight is fine.
    client.cancel();

    for _ in 0..silent.len() {
        let result = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(result.status, Status::Cancelled);
    }
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    // Later queries are unaffected by the earlier cancellation.
    let echo = runtime.block_on(TestServer::start(Behavior::Echo(Duration::ZERO)));
    client.query(&echo.server_string());
    let result = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(result.status, Status::Succeeded);
    assert_eq!(result.address, Some(echo.addr()));
}

#[test]
fn drop_waits_for_callbacks() {
    let runtime = Runtime::new().unwrap();
    let echo = runtime.block_on(TestServer::start(Behavior::Echo(Duration::from_millis(50))));

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let client = Client::new(move |result| tx.lock().unwrap().send(result).unwrap()).unwrap();
    client.query(&echo.server_string());
    drop(client);

    // The callback fired before the destructor returned.
    let result = rx.try_recv().unwrap();
    assert_eq!(result.status, Status::Succeeded);
    assert!(rx.try_recv().is_err());
}

#[test]
fn replacing_the_callback_affects_subsequent_queries() {
    let runtime = Runtime::new().unwrap();
    let echo = runtime.block_on(TestServer::start(Behavior::Echo(Duration::ZERO)));

    let (old_tx, old_rx) = mpsc::channel();
    let old_tx = Mutex::new(old_tx);
    let client = Client::new(move |result| old_tx.lock().unwrap().send(result).unwrap()).unwrap();

    let (new_tx, new_rx) = mpsc::channel();
    let new_tx = Mutex::new(new_tx);
    client.set_callback(move |result| new_tx.lock().unwrap().send(result).unwrap());

    client.query(&echo.server_string());
    let result = new_rx.recv_timeout(WAIT).unwrap();
    assert_eq!(result.status, Status::Succeeded);
    assert!(old_rx.recv_timeout(Duration::from_millis(200)).is_err());
}
