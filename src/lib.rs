//! smarthome-link
//!
//! Connectivity orchestration for a network-attached device: a wireless
//! station link with automatic reconnection, and an MQTT session layered on
//! top of it.
//!
//! # Overview
//!
//! - [`link`] - station link events and the connect/reconnect state machine
//! - [`session`] - messaging events and the session state machine
//! - [`transport`] - the messaging collaborator, shipped as MQTT over rumqttc
//! - [`orchestrator`] - one-shot startup sequencing
//! - [`context`] - status channel, condition flags and the online indicator
//! - [`observability`] - logging, status observer and status HTTP server
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use smarthome_link::config::DeviceConfig;
//! use smarthome_link::diagnostics::ConsoleDiagnostics;
//! use smarthome_link::link::HostLink;
//! use smarthome_link::orchestrator::Orchestrator;
//! use smarthome_link::transport::mqtt::MqttSession;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DeviceConfig::load_from_file("device.toml".as_ref())?;
//! let link = Arc::new(HostLink::new("111.230.206.15:1883"));
//!
//! let running = Orchestrator::new(config, link)
//!     .start(MqttSession::new, Arc::new(ConsoleDiagnostics))
//!     .await?;
//!
//! println!("{:?}", running.context().snapshot());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod flags;
pub mod link;
pub mod observability;
pub mod orchestrator;
pub mod session;
pub mod status;
pub mod testing;
pub mod transport;

pub use config::{ConfigError, DeviceConfig};
pub use context::{ConnectivityContext, ConnectivitySnapshot};
pub use error::{ConnectivityError, ConnectivityResult, StartupStage};
pub use flags::{EventGroup, LINK_CONNECTED_BIT, SESSION_STATUS_BIT};
pub use orchestrator::{Orchestrator, RunningConnectivity};
pub use status::{ConnectivityStatus, StatusChannel};
pub use transport::mqtt::MqttSession;
