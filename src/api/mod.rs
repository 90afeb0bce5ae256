//! API module for HTTP and SSE endpoints
//!
//! REST access to statistics and log management, plus a server-sent event
//! stream of pipeline notifications.

pub mod http;
pub mod rest;
pub mod sse;
pub mod state;

pub use http::{create_router, serve};
pub use state::AppState;
