//! Observability: structured logging, the status observer and the status server

pub mod health;
pub mod logging;
pub mod monitor;

pub use health::StatusServer;
pub use logging::{init_default_logging, init_logging, LogFormat};
pub use monitor::spawn_status_monitor;

// Span macros for structured logging
pub use logging::{link_span, session_span};
