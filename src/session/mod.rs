//! Messaging session events and their sink
//!
//! The messaging collaborator (see [`crate::transport`]) reports session
//! lifecycle events through an unbounded channel. A dispatcher task feeds them
//! one at a time into a [`SessionEventSink`] together with a reference to the
//! session handle, so the sink can issue requests back into the session.

pub mod machine;

use crate::context::ConnectivityContext;
use crate::transport::SessionClient;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, Instrument};

pub use machine::SessionStateMachine;

pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;
pub type SessionEventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Session lifecycle events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A connection attempt is about to be made
    BeforeConnect,
    /// Broker accepted the session
    Connected,
    /// Session lost
    Disconnected,
    Subscribed { packet_id: u16 },
    Unsubscribed { packet_id: u16 },
    /// Broker acknowledged one of our publishes
    Published { packet_id: u16 },
    Data(ReceivedData),
    /// Transport or protocol failure
    Error(String),
}

/// Inbound message with the lengths reported by the transport
///
/// The reported lengths are authoritative; the buffers may be longer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedData {
    topic: Bytes,
    topic_len: usize,
    payload: Bytes,
    payload_len: usize,
}

impl ReceivedData {
    /// Message whose buffers are exactly as long as the content
    pub fn new(topic: impl Into<Bytes>, payload: impl Into<Bytes>) -> Self {
        let topic = topic.into();
        let payload = payload.into();
        Self {
            topic_len: topic.len(),
            payload_len: payload.len(),
            topic,
            payload,
        }
    }

    /// Message whose buffers may carry bytes past the reported lengths
    pub fn with_lengths(
        topic: impl Into<Bytes>,
        topic_len: usize,
        payload: impl Into<Bytes>,
        payload_len: usize,
    ) -> Self {
        Self {
            topic: topic.into(),
            topic_len,
            payload: payload.into(),
            payload_len,
        }
    }

    pub fn topic(&self) -> &[u8] {
        &self.topic[..self.topic_len.min(self.topic.len())]
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.payload_len.min(self.payload.len())]
    }
}

/// Receiver of session lifecycle events
///
/// [`dispatch`](Self::dispatch) brackets every event with `before_event` and
/// `after_event`. Handlers never report failure back to the collaborator.
pub trait SessionEventSink: Send {
    fn before_event(&mut self, _ctx: &ConnectivityContext) {}

    fn after_event(&mut self, _ctx: &ConnectivityContext) {}

    fn on_before_connect(&mut self, ctx: &ConnectivityContext);

    fn on_connected(&mut self, ctx: &ConnectivityContext, session: &dyn SessionClient);

    fn on_disconnected(&mut self, ctx: &ConnectivityContext);

    fn on_subscribed(&mut self, ctx: &ConnectivityContext, packet_id: u16);

    fn on_unsubscribed(&mut self, ctx: &ConnectivityContext, packet_id: u16);

    fn on_published(&mut self, ctx: &ConnectivityContext, packet_id: u16);

    fn on_data(&mut self, ctx: &ConnectivityContext, data: &ReceivedData);

    fn on_error(&mut self, ctx: &ConnectivityContext, detail: &str);

    fn dispatch(
        &mut self,
        ctx: &ConnectivityContext,
        session: &dyn SessionClient,
        event: SessionEvent,
    ) {
        self.before_event(ctx);
        match event {
            SessionEvent::BeforeConnect => self.on_before_connect(ctx),
            SessionEvent::Connected => self.on_connected(ctx, session),
            SessionEvent::Disconnected => self.on_disconnected(ctx),
            SessionEvent::Subscribed { packet_id } => self.on_subscribed(ctx, packet_id),
            SessionEvent::Unsubscribed { packet_id } => self.on_unsubscribed(ctx, packet_id),
            SessionEvent::Published { packet_id } => self.on_published(ctx, packet_id),
            SessionEvent::Data(data) => self.on_data(ctx, &data),
            SessionEvent::Error(detail) => self.on_error(ctx, &detail),
        }
        self.after_event(ctx);
    }
}

/// Drain session events into `sink` until the transport drops its sender
pub async fn run_dispatcher<S, C>(
    mut sink: S,
    ctx: Arc<ConnectivityContext>,
    session: C,
    mut events: SessionEventReceiver,
) where
    S: SessionEventSink,
    C: SessionClient,
{
    while let Some(event) = events.recv().await {
        let span = crate::session_span!(event = ?event);
        async { sink.dispatch(&ctx, &session, event) }
            .instrument(span)
            .await;
    }
    debug!("Session event channel closed, dispatcher stopping");
}
