//! Synchronous API client core for the loan-fraud analysis backend.
//!
//! # Overview
//! Builds `HttpRequest` values and decodes `HttpResponse` values without
//! touching the network (host-does-IO pattern). The runtime crate executes
//! the actual HTTP round-trip, making the core fully deterministic and
//! testable.
//!
//! # Design
//! - `ApiClient` is stateless; it holds only `base_url`.
//! - Each endpoint is split into `build_*` (produces request) and a parse step
//!   (consumes response), so the I/O boundary is explicit.
//! - Response bodies become `Decoded::Json` or `Decoded::Raw`; consumers must
//!   branch on the variant.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod http;
pub mod types;

pub use client::ApiClient;
pub use config::ApiConfig;
pub use decode::Decoded;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, MultipartForm, RequestBody};
pub use types::{FeatureMap, HealthStatus};
