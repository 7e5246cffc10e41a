//! Station connect/reconnect state machine
//!
//! Every disconnection loops straight back into a connect request: no backoff,
//! no retry cap. The only reason-specific behavior is narrowing the advertised
//! protocols when the access point rejects our basic rates.

use super::{DisconnectReason, LinkDriver, LinkEventSink, ProtocolSet};
use crate::context::ConnectivityContext;
use crate::error::ConnectivityError;
use crate::flags::LINK_CONNECTED_BIT;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connecting,
    Connected,
}

pub struct LinkStateMachine {
    driver: Arc<dyn LinkDriver>,
    state: watch::Sender<LinkState>,
    fallback: ProtocolSet,
}

impl LinkStateMachine {
    pub fn new(driver: Arc<dyn LinkDriver>) -> Self {
        let (state, _) = watch::channel(LinkState::Idle);
        Self {
            driver,
            state,
            fallback: ProtocolSet::BASIC_RATE_FALLBACK,
        }
    }

    /// Override the protocol set applied after a basic-rate rejection
    pub fn with_fallback(mut self, fallback: ProtocolSet) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Follow state transitions after the machine moves into its dispatcher
    pub fn subscribe_state(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }

    fn transition(&self, next: LinkState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(?previous, ?next, "Link state transition");
        }
    }

    fn request_connect(&self) {
        if let Err(e) = self.driver.connect() {
            warn!("Link connect request failed: {}", e);
        }
    }
}

impl LinkEventSink for LinkStateMachine {
    fn on_station_start(&mut self, _ctx: &ConnectivityContext) {
        info!("Station started, connecting");
        self.transition(LinkState::Connecting);
        self.request_connect();
    }

    fn on_address_acquired(&mut self, ctx: &ConnectivityContext, address: Ipv4Addr) {
        info!(%address, "Station got address");
        self.transition(LinkState::Connected);
        ctx.link_flags().set(LINK_CONNECTED_BIT);
    }

    fn on_disconnected(&mut self, ctx: &ConnectivityContext, reason: DisconnectReason) {
        error!("Disconnect reason: {}", reason);
        ctx.link_flags().clear(LINK_CONNECTED_BIT);

        match ConnectivityError::from_disconnect(reason) {
            ConnectivityError::ProtocolIncompatibility => {
                warn!("Restricting station protocols to {}", self.fallback);
                if let Err(e) = self.driver.set_protocol(self.fallback) {
                    warn!("Failed to restrict station protocols: {}", e);
                }
            }
            other => debug!("Retrying after: {}", other),
        }

        self.transition(LinkState::Connecting);
        self.request_connect();
    }
}
