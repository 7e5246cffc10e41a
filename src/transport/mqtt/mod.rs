//! MQTT session over rumqttc
//!
//! Split the same way as the rest of the transport code: pure pieces first,
//! I/O last.
//!
//! - [`connection`] - option building and reconnection backoff
//! - [`message_handler`] - mapping rumqttc events onto session events
//! - [`client`] - the polling task and the session handle
//!
//! # Usage
//!
//! ```rust,no_run
//! use smarthome_link::config::DeviceConfig;
//! use smarthome_link::transport::{SessionClient, SessionTransport};
//! use smarthome_link::transport::mqtt::MqttSession;
//! use rumqttc::v5::mqttbytes::QoS;
//!
//! # tokio_test::block_on(async {
//! let config = DeviceConfig::from_toml_str(r#"
//! [link]
//! ssid = "Panda"
//!
//! [mqtt]
//! broker_url = "mqtt://localhost:1883"
//! "#)?;
//!
//! let session = MqttSession::new(&config)?;
//! let client = session.client();
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! session.start(tx)?;
//!
//! while let Some(event) = rx.recv().await {
//!     println!("{event:?}");
//!     # let _ = client.subscribe("/esp8266/set", QoS::AtMostOnce);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::{MqttSession, MqttSessionHandle};
pub use connection::{configure_mqtt_options, ReconnectConfig};
pub use message_handler::MessageHandler;
