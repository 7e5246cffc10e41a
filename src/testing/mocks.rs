//! Mock implementations for testing
//!
//! Provides mock link, session and diagnostic collaborators so the state
//! machines and the orchestrator can be driven without a radio or a broker.
//! Collaborator methods are synchronous, so the mocks use `std::sync::Mutex`.

use crate::config::StoragePolicy;
use crate::context::ConnectivityContext;
use crate::diagnostics::DiagnosticSink;
use crate::link::{
    LinkDriver, LinkError, LinkEvent, LinkEventSender, LinkMode, ProtocolSet, StationConfig,
};
use crate::session::{SessionEvent, SessionEventSender};
use crate::transport::{SessionClient, SessionError, SessionTransport};
use rumqttc::v5::mqttbytes::QoS;
use std::mem::discriminant;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One recorded call into [`MockLinkDriver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCall {
    Init,
    SetStorage(StoragePolicy),
    SetMode(LinkMode),
    /// Carries the SSID only
    SetConfig(String),
    Start,
    Connect,
    SetProtocol(ProtocolSet),
}

/// Mock link driver
///
/// Records every call. When built with [`auto_connect`](Self::auto_connect)
/// it behaves like a cooperative radio: `start` emits station-start and
/// `connect` emits address-acquired.
#[derive(Debug, Default)]
pub struct MockLinkDriver {
    calls: Mutex<Vec<LinkCall>>,
    link_bit_at_connect: Mutex<Vec<bool>>,
    events: Mutex<Option<LinkEventSender>>,
    observed: Option<Arc<ConnectivityContext>>,
    fail_on: Option<LinkCall>,
    auto_connect: bool,
}

pub const MOCK_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 2);

impl MockLinkDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the link flag of `ctx` at each connect request
    pub fn observing(ctx: Arc<ConnectivityContext>) -> Self {
        Self {
            observed: Some(ctx),
            ..Default::default()
        }
    }

    pub fn auto_connect(mut self) -> Self {
        self.auto_connect = true;
        self
    }

    /// Fail every call of the same kind as `call`; payloads are ignored
    pub fn failing_on(mut self, call: LinkCall) -> Self {
        self.fail_on = Some(call);
        self
    }

    pub fn failing_connect(self) -> Self {
        self.failing_on(LinkCall::Connect)
    }

    pub fn calls(&self) -> Vec<LinkCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
        self.link_bit_at_connect.lock().unwrap().clear();
    }

    pub fn connect_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == LinkCall::Connect)
            .count()
    }

    /// Link flag state seen at each connect request, if observing
    pub fn link_bit_at_calls(&self) -> Vec<bool> {
        self.link_bit_at_connect.lock().unwrap().clone()
    }

    /// Inject an event as if the radio produced it
    pub fn emit(&self, event: LinkEvent) -> bool {
        match self.events.lock().unwrap().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    fn record(&self, call: LinkCall) -> Result<(), LinkError> {
        let fails = self
            .fail_on
            .as_ref()
            .is_some_and(|failing| discriminant(failing) == discriminant(&call));
        self.calls.lock().unwrap().push(call);
        if fails {
            Err(LinkError::Driver("mock failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl LinkDriver for MockLinkDriver {
    fn init(&self, events: LinkEventSender) -> Result<(), LinkError> {
        self.record(LinkCall::Init)?;
        *self.events.lock().unwrap() = Some(events);
        Ok(())
    }

    fn set_storage(&self, policy: StoragePolicy) -> Result<(), LinkError> {
        self.record(LinkCall::SetStorage(policy))
    }

    fn set_mode(&self, mode: LinkMode) -> Result<(), LinkError> {
        self.record(LinkCall::SetMode(mode))
    }

    fn set_config(&self, config: &StationConfig) -> Result<(), LinkError> {
        self.record(LinkCall::SetConfig(config.ssid.clone()))
    }

    fn start(&self) -> Result<(), LinkError> {
        self.record(LinkCall::Start)?;
        if self.auto_connect {
            self.emit(LinkEvent::StationStart);
        }
        Ok(())
    }

    fn connect(&self) -> Result<(), LinkError> {
        if let Some(ctx) = &self.observed {
            self.link_bit_at_connect
                .lock()
                .unwrap()
                .push(ctx.is_link_up());
        }
        self.record(LinkCall::Connect)?;
        if self.auto_connect {
            self.emit(LinkEvent::AddressAcquired(MOCK_ADDRESS));
        }
        Ok(())
    }

    fn set_protocol(&self, protocols: ProtocolSet) -> Result<(), LinkError> {
        self.record(LinkCall::SetProtocol(protocols))
    }
}

/// Mock session handle recording subscriptions
#[derive(Debug, Clone, Default)]
pub struct MockSessionClient {
    subscriptions: Arc<Mutex<Vec<(String, QoS)>>>,
    should_fail: bool,
}

impl MockSessionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.subscriptions.lock().unwrap().clone()
    }
}

impl SessionClient for MockSessionClient {
    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), SessionError> {
        self.subscriptions
            .lock()
            .unwrap()
            .push((topic.to_string(), qos));
        if self.should_fail {
            Err(SessionError::SubscriptionFailed("mock subscribe failure".into()))
        } else {
            Ok(())
        }
    }
}

/// Mock session transport
///
/// `start` consumes the transport, so tests keep a [`MockSessionProbe`] to
/// inspect it and inject events afterwards.
#[derive(Debug, Default)]
pub struct MockSessionTransport {
    client: MockSessionClient,
    probe: MockSessionProbe,
    fail_start: bool,
    auto_connect: bool,
}

/// Shared view into a [`MockSessionTransport`]
#[derive(Debug, Clone, Default)]
pub struct MockSessionProbe {
    start_count: Arc<AtomicUsize>,
    events: Arc<Mutex<Option<SessionEventSender>>>,
    client: MockSessionClient,
}

impl MockSessionTransport {
    pub fn new() -> Self {
        let client = MockSessionClient::new();
        Self {
            probe: MockSessionProbe {
                client: client.clone(),
                ..Default::default()
            },
            client,
            ..Default::default()
        }
    }

    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::new()
        }
    }

    /// Emit before-connect and connected as soon as the session starts
    pub fn auto_connect(mut self) -> Self {
        self.auto_connect = true;
        self
    }

    pub fn probe(&self) -> MockSessionProbe {
        self.probe.clone()
    }
}

impl SessionTransport for MockSessionTransport {
    type Client = MockSessionClient;

    fn client(&self) -> MockSessionClient {
        self.client.clone()
    }

    fn start(self, events: SessionEventSender) -> Result<(), SessionError> {
        self.probe.start_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(SessionError::StartFailed("mock start failure".to_string()));
        }
        if self.auto_connect {
            let _ = events.send(SessionEvent::BeforeConnect);
            let _ = events.send(SessionEvent::Connected);
        }
        *self.probe.events.lock().unwrap() = Some(events);
        Ok(())
    }
}

impl MockSessionProbe {
    pub fn start_count(&self) -> usize {
        self.start_count.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.client.subscriptions()
    }

    /// Inject an event as if the broker connection produced it
    pub fn emit(&self, event: SessionEvent) -> bool {
        match self.events.lock().unwrap().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

/// Diagnostic sink that keeps everything it is given
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    received: Mutex<Vec<(Vec<u8>, Vec<u8>)>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received_messages(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.received.lock().unwrap().clone()
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn received(&self, topic: &[u8], payload: &[u8]) {
        self.received
            .lock()
            .unwrap()
            .push((topic.to_vec(), payload.to_vec()));
    }
}
