//! Observability module providing structured logging.
//!
//! Logs are emitted through `tracing` in a configurable format (pretty,
//! compact, JSON) with environment-based filtering.

mod tracing_init;

pub use tracing_init::*;
