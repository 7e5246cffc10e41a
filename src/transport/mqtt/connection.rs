//! Pure option building and backoff policy for the MQTT session

use crate::config::DeviceConfig;
use crate::transport::SessionError;
use rumqttc::v5::MqttOptions;
use rumqttc::Transport as RumqttcTransport;
use std::time::Duration;
use uuid::Uuid;

/// Reconnection pacing used by the session polling task
///
/// This only paces the messaging collaborator's own retries; the link state
/// machine retries without any delay.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Backoff pattern in milliseconds
    pub backoff_pattern: Vec<u64>,
    /// Delay to use after pattern is exhausted
    pub sustained_delay: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            backoff_pattern: vec![25, 50, 100, 250], // 25ms, 50ms, 100ms, 250ms pattern
            sustained_delay: 250,                    // Stay at 250ms after pattern exhausted
        }
    }
}

impl ReconnectConfig {
    /// Delay before the given (1-based) consecutive failed attempt is retried
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1) as usize;
        let millis = self
            .backoff_pattern
            .get(index)
            .copied()
            .unwrap_or(self.sustained_delay);
        Duration::from_millis(millis)
    }
}

/// Build session options from configuration
///
/// Each call generates a fresh client id so a restarted device never collides
/// with its own stale session on the broker.
pub fn configure_mqtt_options(config: &DeviceConfig) -> Result<MqttOptions, SessionError> {
    let endpoint = config.mqtt.endpoint()?;

    let suffix = Uuid::new_v4().simple().to_string();
    let client_id = format!("{}-{}", config.mqtt.client_id, &suffix[..8]);
    let mut mqtt_options = MqttOptions::new(client_id, endpoint.host, endpoint.port);

    if endpoint.tls {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if let Some(username) = config.mqtt_username() {
        let password = config
            .mqtt_password()
            .map(|secret| secret.expose().to_string())
            .unwrap_or_default();
        mqtt_options.set_credentials(username, password);
    }

    mqtt_options.set_keep_alive(Duration::from_secs(config.mqtt.keep_alive_secs));

    Ok(mqtt_options)
}
