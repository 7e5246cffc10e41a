//! Messaging collaborator contract
//!
//! A [`SessionTransport`] owns the network side of a publish/subscribe
//! session, including transparent reconnection. The orchestrator only starts
//! it once and keeps a [`SessionClient`] handle for requests issued from the
//! session event handler.

use crate::session::SessionEventSender;
use rumqttc::v5::mqttbytes::QoS;
use thiserror::Error;

pub mod mqtt;

/// Messaging collaborator errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(#[from] crate::config::ConfigError),
    #[error("Subscription failed")]
    SubscriptionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Session start failed: {0}")]
    StartFailed(String),
    #[error("Session already started")]
    AlreadyStarted,
}

/// Requests that can be issued against a running session
///
/// Called from the session event handler, so implementations must not block.
pub trait SessionClient: Send + Sync {
    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), SessionError>;
}

/// Session collaborator that reports lifecycle events through a channel
pub trait SessionTransport: Send + 'static {
    type Client: SessionClient + 'static;

    /// Handle used by the event sink; valid before and after `start`
    fn client(&self) -> Self::Client;

    /// Begin connecting; all further outcomes arrive as session events
    fn start(self, events: SessionEventSender) -> Result<(), SessionError>;
}

/// Type alias for the shipped MQTT session
pub type MqttTransport = mqtt::MqttSession;
