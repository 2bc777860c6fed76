//! Catalog API crate - axum HTTP server and route handlers.
//!
//! Exposes semantic product search, ingestion, record lookup, and a health
//! check over JSON.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, serve};
pub use state::AppState;
