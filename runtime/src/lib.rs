//! Async runtime for the loan-fraud analysis client.
//!
//! # Overview
//! Executes the requests built by `loanguard-core` and layers UI-facing state
//! on top:
//! - `api::Api`: one round trip per call, JSON-or-raw decoding, optional
//!   cancellation.
//! - `query::QueryCache` / `query::Query`: keyed reads with coalescing and
//!   stale-while-revalidate.
//! - `mutation::Mutation`: uncached writes with observable state.
//! - `context::AppContext`: owns the above for the application's lifetime.
//!
//! All fetching must happen inside a tokio runtime.

pub mod api;
pub mod context;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod mutation;
pub mod query;
pub mod transport;

pub use api::{cancellable, Api};
pub use context::AppContext;
pub use error::{ClientError, Result, TransportError};
pub use mutation::{Mutation, MutationState, MutationStatus};
pub use query::{Query, QueryCache, QueryConfig, QueryResult, QueryState, QueryStatus};
pub use transport::{ReqwestTransport, Transport};
