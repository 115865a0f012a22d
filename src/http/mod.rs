//! HTTP server module
//!
//! Job submission, output download, health and metrics endpoints.

pub mod handlers;
pub mod routes;

pub use routes::create_router;
