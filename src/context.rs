//! Process-wide connectivity state
//!
//! One context exists per orchestrator. The link state machine is the only
//! writer of the link flags; the session state machine is the only writer of
//! the status channel, the session flags and the online indicator. Observers
//! read snapshots with no ordering guarantee between the individual fields.

use crate::flags::{EventGroup, LINK_CONNECTED_BIT};
use crate::status::{ConnectivityStatus, StatusChannel};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct ConnectivityContext {
    status: StatusChannel,
    link_flags: EventGroup,
    session_flags: EventGroup,
    online: AtomicBool,
}

/// Point-in-time view for observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivitySnapshot {
    pub link_up: bool,
    pub session_online: bool,
    pub status: Option<ConnectivityStatus>,
}

impl ConnectivityContext {
    pub fn new() -> Self {
        Self {
            status: StatusChannel::new(),
            link_flags: EventGroup::new("link"),
            session_flags: EventGroup::new("session"),
            online: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> &StatusChannel {
        &self.status
    }

    pub fn link_flags(&self) -> &EventGroup {
        &self.link_flags
    }

    pub fn session_flags(&self) -> &EventGroup {
        &self.session_flags
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    pub fn is_link_up(&self) -> bool {
        self.link_flags.is_set(LINK_CONNECTED_BIT)
    }

    pub fn snapshot(&self) -> ConnectivitySnapshot {
        ConnectivitySnapshot {
            link_up: self.is_link_up(),
            session_online: self.is_online(),
            status: self.status.current(),
        }
    }
}

impl Default for ConnectivityContext {
    fn default() -> Self {
        Self::new()
    }
}
