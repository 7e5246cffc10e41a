//! Impure I/O for the MQTT session
//!
//! The polling task owns the rumqttc event loop. rumqttc reconnects on the
//! next `poll()` after an error, so reconnection is just: report the failure,
//! wait out the backoff, announce the next attempt and poll again.

use super::connection::{configure_mqtt_options, ReconnectConfig};
use super::message_handler::MessageHandler;
use crate::config::DeviceConfig;
use crate::session::{SessionEvent, SessionEventSender};
use crate::transport::{SessionClient, SessionError, SessionTransport};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, EventLoop};
use tracing::{debug, error, info};

/// Request queue depth between the handle and the event loop
const REQUEST_CAPACITY: usize = 10;

/// MQTT session that has not been started yet
pub struct MqttSession {
    client: AsyncClient,
    event_loop: EventLoop,
    reconnect_config: ReconnectConfig,
}

/// Cloneable request handle into a session
#[derive(Clone)]
pub struct MqttSessionHandle {
    client: AsyncClient,
}

impl MqttSession {
    pub fn new(config: &DeviceConfig) -> Result<Self, SessionError> {
        let mqtt_options = configure_mqtt_options(config)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        Ok(Self {
            client,
            event_loop,
            reconnect_config: ReconnectConfig::default(),
        })
    }

    pub fn with_reconnect_config(mut self, reconnect_config: ReconnectConfig) -> Self {
        self.reconnect_config = reconnect_config;
        self
    }

    async fn run(mut self, events: SessionEventSender) {
        info!("Starting MQTT event loop");
        let mut online = false;
        let mut consecutive_failures = 0u32;

        if events.send(SessionEvent::BeforeConnect).is_err() {
            return;
        }

        loop {
            match self.event_loop.poll().await {
                Ok(event) => {
                    let Some(session_event) = MessageHandler::route_mqtt_event(&event) else {
                        continue;
                    };

                    match session_event {
                        SessionEvent::Connected => {
                            online = true;
                            consecutive_failures = 0;
                        }
                        SessionEvent::Disconnected => online = false,
                        _ => {}
                    }

                    if events.send(session_event).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("MQTT event loop error: {}", e);
                    if events.send(SessionEvent::Error(e.to_string())).is_err() {
                        break;
                    }
                    if online {
                        online = false;
                        if events.send(SessionEvent::Disconnected).is_err() {
                            break;
                        }
                    }

                    consecutive_failures = consecutive_failures.saturating_add(1);
                    let delay = self
                        .reconnect_config
                        .calculate_backoff_delay(consecutive_failures);
                    debug!(
                        attempt = consecutive_failures,
                        "Reconnecting after {:?}", delay
                    );
                    tokio::time::sleep(delay).await;

                    if events.send(SessionEvent::BeforeConnect).is_err() {
                        break;
                    }
                }
            }
        }

        info!("MQTT event loop stopped, session event sink dropped");
    }
}

impl SessionTransport for MqttSession {
    type Client = MqttSessionHandle;

    fn client(&self) -> MqttSessionHandle {
        MqttSessionHandle {
            client: self.client.clone(),
        }
    }

    fn start(self, events: SessionEventSender) -> Result<(), SessionError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SessionError::StartFailed(format!("no async runtime: {e}")))?;
        runtime.spawn(self.run(events));
        Ok(())
    }
}

impl SessionClient for MqttSessionHandle {
    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), SessionError> {
        self.client
            .try_subscribe(topic, qos)
            .map_err(|e| SessionError::SubscriptionFailed(Box::new(e)))
    }
}
