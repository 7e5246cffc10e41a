//! Testing utilities and mock implementations
//!
//! Mock collaborators for exercising the link and session state machines and
//! the orchestrator without a radio or an MQTT broker.

pub mod mocks;

pub use mocks::*;
