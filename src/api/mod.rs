//! HTTP API.
//!
//! JSON endpoints under `/api/`. Handlers parse and validate the request,
//! then run the service call on the blocking pool; generation and embedding
//! clients are synchronous.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{serve, serve_with_shutdown};
pub use types::ApiContext;
