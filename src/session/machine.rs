//! Session event to action mapping
//!
//! Stateless apart from the online indicator kept in the context. The status
//! channel is emptied before each event, overwritten by the handler, and the
//! session status flag is raised afterwards. Observers clear the flag
//! themselves before waiting again.

use super::{ReceivedData, SessionEventSink};
use crate::context::ConnectivityContext;
use crate::diagnostics::DiagnosticSink;
use crate::flags::SESSION_STATUS_BIT;
use crate::status::ConnectivityStatus;
use crate::transport::SessionClient;
use rumqttc::v5::mqttbytes::QoS;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SessionStateMachine {
    topic: String,
    qos: QoS,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl SessionStateMachine {
    /// Subscribes to `topic` at QoS 0 on every connect
    pub fn new<S: Into<String>>(topic: S, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            topic: topic.into(),
            qos: QoS::AtMostOnce,
            diagnostics,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl SessionEventSink for SessionStateMachine {
    fn before_event(&mut self, ctx: &ConnectivityContext) {
        ctx.status().reset();
    }

    fn after_event(&mut self, ctx: &ConnectivityContext) {
        ctx.session_flags().set(SESSION_STATUS_BIT);
    }

    fn on_before_connect(&mut self, ctx: &ConnectivityContext) {
        debug!("Session connecting");
        ctx.status().write(ConnectivityStatus::Connecting);
    }

    fn on_connected(&mut self, ctx: &ConnectivityContext, session: &dyn SessionClient) {
        info!("Session connected");
        ctx.set_online(true);
        if let Err(e) = session.subscribe(&self.topic, self.qos) {
            warn!("Failed to subscribe to {}: {}", self.topic, e);
        }
        ctx.status().write(ConnectivityStatus::Connected);
    }

    fn on_disconnected(&mut self, ctx: &ConnectivityContext) {
        info!("Session disconnected");
        ctx.set_online(false);
        ctx.status().write(ConnectivityStatus::Disconnected);
    }

    fn on_subscribed(&mut self, ctx: &ConnectivityContext, packet_id: u16) {
        debug!(packet_id, "Subscription acknowledged");
        ctx.status().write(ConnectivityStatus::Subscribed);
    }

    fn on_unsubscribed(&mut self, ctx: &ConnectivityContext, packet_id: u16) {
        debug!(packet_id, "Unsubscription acknowledged");
        ctx.status().write(ConnectivityStatus::Unsubscribed);
    }

    fn on_published(&mut self, ctx: &ConnectivityContext, packet_id: u16) {
        debug!(packet_id, "Publish acknowledged");
        ctx.status().write(ConnectivityStatus::PublishAck);
    }

    fn on_data(&mut self, ctx: &ConnectivityContext, data: &ReceivedData) {
        debug!(
            topic_len = data.topic().len(),
            payload_len = data.payload().len(),
            "Message received"
        );
        self.diagnostics.received(data.topic(), data.payload());
        ctx.status().write(ConnectivityStatus::DataReceived);
    }

    fn on_error(&mut self, ctx: &ConnectivityContext, detail: &str) {
        warn!("Session error: {}", detail);
        ctx.status().write(ConnectivityStatus::Error);
    }
}
