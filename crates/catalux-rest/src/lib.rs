//! HTTP surface of the catalog index.

pub mod handlers;
pub mod rest;
pub mod state;
pub mod telemetry;

pub use rest::build_router;
pub use state::AppState;
pub use telemetry::init_tracing;
