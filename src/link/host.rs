//! Link driver backed by the host network stack
//!
//! On a host the station interface is whatever route the kernel picks towards
//! the broker. "Association" is resolving that route: a connect request binds
//! a UDP socket, connects it to the probe target and reports the local IPv4
//! address as acquired. Failure is reported as a disconnection after
//! `failure_delay`, which stands in for the scan time of a real radio.

use super::{
    DisconnectReason, LinkDriver, LinkError, LinkEvent, LinkEventSender, LinkMode, ProtocolSet,
    StationConfig,
};
use crate::config::StoragePolicy;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info};

const DEFAULT_FAILURE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct HostLinkState {
    events: Option<LinkEventSender>,
    storage: StoragePolicy,
    station: Option<StationConfig>,
    started: bool,
    protocols: Option<ProtocolSet>,
}

#[derive(Debug)]
pub struct HostLink {
    probe_target: String,
    failure_delay: Duration,
    state: Mutex<HostLinkState>,
}

impl HostLink {
    /// `probe_target` is a `host:port` reachable through the station route
    pub fn new<S: Into<String>>(probe_target: S) -> Self {
        Self {
            probe_target: probe_target.into(),
            failure_delay: DEFAULT_FAILURE_DELAY,
            state: Mutex::new(HostLinkState::default()),
        }
    }

    pub fn with_failure_delay(mut self, delay: Duration) -> Self {
        self.failure_delay = delay;
        self
    }

    /// Protocols currently advertised
    pub fn protocols(&self) -> ProtocolSet {
        self.lock()
            .map(|state| state.protocols.unwrap_or(ProtocolSet::ALL))
            .unwrap_or(ProtocolSet::ALL)
    }

    pub fn storage(&self) -> StoragePolicy {
        self.lock()
            .map(|state| state.storage)
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HostLinkState>, LinkError> {
        self.state
            .lock()
            .map_err(|_| LinkError::Driver("link state poisoned".to_string()))
    }

    fn sender(&self) -> Result<LinkEventSender, LinkError> {
        self.lock()?.events.clone().ok_or(LinkError::NotInitialized)
    }
}

impl LinkDriver for HostLink {
    fn init(&self, events: LinkEventSender) -> Result<(), LinkError> {
        let mut state = self.lock()?;
        if state.events.is_some() {
            return Err(LinkError::AlreadyInitialized);
        }
        state.events = Some(events);
        Ok(())
    }

    fn set_storage(&self, policy: StoragePolicy) -> Result<(), LinkError> {
        self.lock()?.storage = policy;
        Ok(())
    }

    fn set_mode(&self, mode: LinkMode) -> Result<(), LinkError> {
        match mode {
            LinkMode::Station => Ok(()),
            other => Err(LinkError::Unsupported(format!(
                "host link only runs in station mode, not {other:?}"
            ))),
        }
    }

    fn set_config(&self, config: &StationConfig) -> Result<(), LinkError> {
        let mut state = self.lock()?;
        if state.events.is_none() {
            return Err(LinkError::NotInitialized);
        }
        state.station = Some(config.clone());
        Ok(())
    }

    fn start(&self) -> Result<(), LinkError> {
        let events = {
            let mut state = self.lock()?;
            let events = state.events.clone().ok_or(LinkError::NotInitialized)?;
            if state.station.is_none() {
                return Err(LinkError::Driver("station config not set".to_string()));
            }
            state.started = true;
            events
        };

        events
            .send(LinkEvent::StationStart)
            .map_err(|_| LinkError::EventSinkClosed)
    }

    fn connect(&self) -> Result<(), LinkError> {
        let events = self.sender()?;
        if !self.lock()?.started {
            return Err(LinkError::Driver("link not started".to_string()));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| LinkError::Driver(format!("no async runtime: {e}")))?;

        let target = self.probe_target.clone();
        let failure_delay = self.failure_delay;
        runtime.spawn(async move {
            let event = match probe_local_address(&target).await {
                Ok(address) => LinkEvent::AddressAcquired(address),
                Err(e) => {
                    debug!("Route probe to {} failed: {}", target, e);
                    tokio::time::sleep(failure_delay).await;
                    LinkEvent::Disconnected(DisconnectReason::NO_AP_FOUND)
                }
            };
            let _ = events.send(event);
        });

        Ok(())
    }

    fn set_protocol(&self, protocols: ProtocolSet) -> Result<(), LinkError> {
        if protocols.is_empty() {
            return Err(LinkError::Unsupported("empty protocol set".to_string()));
        }
        info!("Host link advertising {}", protocols);
        self.lock()?.protocols = Some(protocols);
        Ok(())
    }
}

/// Local IPv4 address the kernel would use to reach `target`
async fn probe_local_address(target: &str) -> io::Result<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.connect(target).await?;

    match socket.local_addr()?.ip() {
        IpAddr::V4(address) if !address.is_unspecified() => Ok(address),
        other => Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no IPv4 route, local address {other}"),
        )),
    }
}
