use std::io;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::Duration;

use tracing::debug;

use crate::query::{Query, QueryResult};

type Callback = Arc<dyn Fn(QueryResult) + Send + Sync>;

/// Count of queries whose callback has not yet been delivered.
struct Pending {
    count: Mutex<usize>,
    drained: Condvar,
}

/// Releases one pending slot; runs even if the user callback panics, so
/// the drop-time drain cannot wedge.
struct CompletionGuard(Arc<Pending>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock().unwrap();
        *count -= 1;
        if *count == 0 {
            self.0.drained.notify_all();
        }
    }
}

/// An asynchronous multi-query NTP client.
///
/// A `Client` is constructed with a callback and owns the worker runtime
/// its queries run on. Each call to [`Client::query`] starts an
/// independent named [`Query`]; once it settles, the callback registered
/// at the time the query was placed receives its [`QueryResult`]. Distinct
/// queries run concurrently and one cannot block another.
///
/// [`Client::cancel`] cancels everything in flight. Dropping the client
/// waits for every placed query to deliver its callback, then shuts the
/// runtime down — so a `Client` must be created and dropped outside of any
/// async context.
pub struct Client {
    callback: Mutex<Callback>,
    queries: Mutex<Vec<Weak<Query>>>,
    pending: Arc<Pending>,
    runtime: tokio::runtime::Runtime,
}

impl Client {
    /// Builds a client reporting through `callback`, spinning up its
    /// worker runtime.
    pub fn new<F>(callback: F) -> io::Result<Client>
    where
        F: Fn(QueryResult) + Send + Sync + 'static,
    {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("sundial-client")
            .build()?;
        Ok(Client {
            callback: Mutex::new(Arc::new(callback)),
            queries: Mutex::new(Vec::new()),
            pending: Arc::new(Pending {
                count: Mutex::new(0),
                drained: Condvar::new(),
            }),
            runtime,
        })
    }

    /// Places a query with the default timeout. Thread-safe.
    pub fn query(&self, server: &str) {
        self.query_with_timeout(server, Query::DEFAULT_TIMEOUT);
    }

    /// Places a query that is cancelled with a timeout status if it has
    /// not completed within `timeout`. Thread-safe.
    pub fn query_with_timeout(&self, server: &str, timeout: Duration) {
        let callback = Arc::clone(&self.callback.lock().unwrap());
        *self.pending.count.lock().unwrap() += 1;
        let guard = CompletionGuard(Arc::clone(&self.pending));
        let deliver = move |result: QueryResult| {
            let _guard = guard;
            callback(result);
        };

        let mut queries = self.queries.lock().unwrap();
        purge(&mut queries);
        queries.push(Query::start(
            self.runtime.handle(),
            server,
            deliver,
            timeout,
        ));
    }

    /// Replaces the callback used by subsequent queries; in-flight queries
    /// keep the callback they were placed with.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(QueryResult) + Send + Sync + 'static,
    {
        *self.callback.lock().unwrap() = Arc::new(callback);
    }

    /// Cancels every in-flight query. Thread-safe; each cancelled query
    /// still delivers its callback, with a cancelled status.
    pub fn cancel(&self) {
        let mut queries = self.queries.lock().unwrap();
        for query in queries.iter() {
            if let Some(query) = query.upgrade() {
                query.cancel();
            }
        }
        purge(&mut queries);
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // Every placed query delivers its callback before the worker
        // runtime goes away.
        let mut count = self.pending.count.lock().unwrap();
        while *count > 0 {
            debug!(in_flight = *count, "waiting for queries to settle");
            count = self.pending.drained.wait(count).unwrap();
        }
    }
}

fn purge(queries: &mut Vec<Weak<Query>>) {
    queries.retain(|query| query.strong_count() > 0);
}
