//! Wireless station link layer
//!
//! The link collaborator ([`LinkDriver`]) owns the radio: association, address
//! acquisition and disconnection detection. It reports lifecycle events through
//! an unbounded channel; a dispatcher task drains that channel and hands each
//! event to a [`LinkEventSink`], one at a time and to completion.
//!
//! - [`machine`] - connect/reconnect state machine driven by link events
//! - [`host`] - driver that uses the host network stack as the station interface

pub mod host;
pub mod machine;

use crate::config::{Secret, StoragePolicy};
use crate::context::ConnectivityContext;
use std::fmt;
use std::net::Ipv4Addr;
use std::ops::BitOr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, Instrument};

pub use host::HostLink;
pub use machine::{LinkState, LinkStateMachine};

/// Sender half handed to the driver at init
pub type LinkEventSender = mpsc::UnboundedSender<LinkEvent>;
/// Receiver half drained by the dispatcher
pub type LinkEventReceiver = mpsc::UnboundedReceiver<LinkEvent>;

/// Lifecycle events produced by the link layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Station interface is up and ready to associate
    StationStart,
    /// Association completed and an address was assigned
    AddressAcquired(Ipv4Addr),
    /// Association lost or failed
    Disconnected(DisconnectReason),
}

/// 802.11 / vendor disconnection reason code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisconnectReason(pub u16);

impl DisconnectReason {
    pub const UNSPECIFIED: Self = Self(1);
    pub const AUTH_EXPIRE: Self = Self(2);
    pub const AUTH_LEAVE: Self = Self(3);
    pub const ASSOC_EXPIRE: Self = Self(4);
    pub const ASSOC_TOO_MANY: Self = Self(5);
    pub const NOT_AUTHED: Self = Self(6);
    pub const NOT_ASSOCED: Self = Self(7);
    pub const ASSOC_LEAVE: Self = Self(8);
    pub const ASSOC_NOT_AUTHED: Self = Self(9);
    pub const FOUR_WAY_HANDSHAKE_TIMEOUT: Self = Self(15);
    pub const BEACON_TIMEOUT: Self = Self(200);
    pub const NO_AP_FOUND: Self = Self(201);
    pub const AUTH_FAIL: Self = Self(202);
    pub const ASSOC_FAIL: Self = Self(203);
    pub const HANDSHAKE_TIMEOUT: Self = Self(204);
    pub const BASIC_RATE_NOT_SUPPORTED: Self = Self(205);

    pub fn code(&self) -> u16 {
        self.0
    }

    /// The access point rejected the rates we advertised
    pub fn is_basic_rate_unsupported(&self) -> bool {
        *self == Self::BASIC_RATE_NOT_SUPPORTED
    }

    pub fn name(&self) -> &'static str {
        match self.0 {
            1 => "UNSPECIFIED",
            2 => "AUTH_EXPIRE",
            3 => "AUTH_LEAVE",
            4 => "ASSOC_EXPIRE",
            5 => "ASSOC_TOO_MANY",
            6 => "NOT_AUTHED",
            7 => "NOT_ASSOCED",
            8 => "ASSOC_LEAVE",
            9 => "ASSOC_NOT_AUTHED",
            15 => "4WAY_HANDSHAKE_TIMEOUT",
            200 => "BEACON_TIMEOUT",
            201 => "NO_AP_FOUND",
            202 => "AUTH_FAIL",
            203 => "ASSOC_FAIL",
            204 => "HANDSHAKE_TIMEOUT",
            205 => "BASIC_RATE_NOT_SUPPORT",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}

/// Set of 802.11 PHY protocols the station advertises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolSet(u8);

impl ProtocolSet {
    pub const B: Self = Self(0x01);
    pub const G: Self = Self(0x02);
    pub const N: Self = Self(0x04);
    pub const LR: Self = Self(0x08);
    pub const ALL: Self = Self(0x0f);

    /// Narrowed set used after a basic-rate rejection
    pub const BASIC_RATE_FALLBACK: Self = Self(0x07);

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ProtocolSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for ProtocolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::B, "b"),
            (Self::G, "g"),
            (Self::N, "n"),
            (Self::LR, "lr"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
        write!(f, "802.11{}", names.join("/"))
    }
}

/// Radio operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    Station,
    AccessPoint,
    StationAccessPoint,
}

/// Station credentials applied before start
#[derive(Debug, Clone, PartialEq)]
pub struct StationConfig {
    pub ssid: String,
    pub passphrase: Option<Secret>,
}

/// Link collaborator errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Link layer not initialized")]
    NotInitialized,
    #[error("Link layer already initialized")]
    AlreadyInitialized,
    #[error("Unsupported link operation: {0}")]
    Unsupported(String),
    #[error("Link driver error: {0}")]
    Driver(String),
    #[error("Link event sink closed")]
    EventSinkClosed,
}

/// Link layer collaborator
///
/// Methods are called from the link event handler and must not block.
/// Outcomes of `start` and `connect` are reported as [`LinkEvent`]s.
pub trait LinkDriver: Send + Sync {
    /// Bring up address resolution and register the event channel
    fn init(&self, events: LinkEventSender) -> Result<(), LinkError>;

    fn set_storage(&self, policy: StoragePolicy) -> Result<(), LinkError>;

    fn set_mode(&self, mode: LinkMode) -> Result<(), LinkError>;

    fn set_config(&self, config: &StationConfig) -> Result<(), LinkError>;

    fn start(&self) -> Result<(), LinkError>;

    /// Request association with the configured network
    fn connect(&self) -> Result<(), LinkError>;

    /// Restrict the advertised PHY protocols
    fn set_protocol(&self, protocols: ProtocolSet) -> Result<(), LinkError>;
}

/// Receiver of link lifecycle events
///
/// Handlers run to completion on the dispatcher task and are never re-entered.
pub trait LinkEventSink: Send {
    fn on_station_start(&mut self, ctx: &ConnectivityContext);

    fn on_address_acquired(&mut self, ctx: &ConnectivityContext, address: Ipv4Addr);

    fn on_disconnected(&mut self, ctx: &ConnectivityContext, reason: DisconnectReason);

    fn dispatch(&mut self, ctx: &ConnectivityContext, event: LinkEvent) {
        match event {
            LinkEvent::StationStart => self.on_station_start(ctx),
            LinkEvent::AddressAcquired(address) => self.on_address_acquired(ctx, address),
            LinkEvent::Disconnected(reason) => self.on_disconnected(ctx, reason),
        }
    }
}

/// Drain link events into `sink` until the driver drops its sender
pub async fn run_dispatcher<S>(
    mut sink: S,
    ctx: Arc<ConnectivityContext>,
    mut events: LinkEventReceiver,
) where
    S: LinkEventSink,
{
    while let Some(event) = events.recv().await {
        let span = crate::link_span!(event = ?event);
        async { sink.dispatch(&ctx, event) }.instrument(span).await;
    }
    debug!("Link event channel closed, dispatcher stopping");
}
