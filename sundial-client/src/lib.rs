//! Asynchronous multi-query NTPv4 client.
//!
//! The query machinery is layered, leaves first:
//!
//! - [`QuerySingle`] performs one request/response exchange with one UDP
//!   endpoint under a timeout.
//! - [`QuerySeries`] walks an ordered endpoint list, failing over on
//!   per-endpoint errors until one succeeds or the list is exhausted.
//! - [`Query`] resolves a `host[:port]` server string and drives a series
//!   over the resolved addresses, reporting one of six terminal statuses.
//! - [`Client`] owns a worker runtime and multiplexes any number of
//!   concurrent named queries behind a registered callback.
//!
//! Every layer delivers its outcome through a callback invoked exactly
//! once, hands out only weak handles, and supports idempotent
//! cancellation from any thread.

#![forbid(unsafe_code)]

mod client;
mod interrupt;
mod query;
mod series;
mod single;

pub use client::Client;
pub use query::{Query, QueryResult, Status};
pub use series::QuerySeries;
pub use single::{Exchange, QueryError, QuerySingle};
