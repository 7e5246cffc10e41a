//! Latest-value connectivity status channel
//!
//! Holds a single status that is overwritten on every messaging event. There is
//! no history: readers only ever observe the most recent value, and a value may
//! be replaced before anyone looks at it.

use serde::Serialize;
use std::fmt;
use tokio::sync::watch;

/// Capacity of the status text buffer on the device
pub const STATUS_TEXT_CAPACITY: usize = 64;

/// Fixed status vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectivityStatus {
    Connecting,
    Connected,
    Disconnected,
    Subscribed,
    Unsubscribed,
    PublishAck,
    DataReceived,
    Error,
}

impl ConnectivityStatus {
    pub const ALL: [ConnectivityStatus; 8] = [
        ConnectivityStatus::Connecting,
        ConnectivityStatus::Connected,
        ConnectivityStatus::Disconnected,
        ConnectivityStatus::Subscribed,
        ConnectivityStatus::Unsubscribed,
        ConnectivityStatus::PublishAck,
        ConnectivityStatus::DataReceived,
        ConnectivityStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityStatus::Connecting => "CONNECTING",
            ConnectivityStatus::Connected => "CONNECTED",
            ConnectivityStatus::Disconnected => "DISCONNECTED",
            ConnectivityStatus::Subscribed => "SUBSCRIBED",
            ConnectivityStatus::Unsubscribed => "UNSUBSCRIBED",
            ConnectivityStatus::PublishAck => "PUBLISH_ACK",
            ConnectivityStatus::DataReceived => "DATA_RECEIVED",
            ConnectivityStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-slot status buffer, empty until the first write
#[derive(Debug)]
pub struct StatusChannel {
    slot: watch::Sender<Option<ConnectivityStatus>>,
}

impl StatusChannel {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot }
    }

    /// Clear the buffer ahead of handling a new event
    pub fn reset(&self) {
        self.slot.send_replace(None);
    }

    /// Overwrite the buffer
    pub fn write(&self, status: ConnectivityStatus) {
        self.slot.send_replace(Some(status));
    }

    /// Snapshot of the current value
    pub fn current(&self) -> Option<ConnectivityStatus> {
        *self.slot.borrow()
    }

    /// Current value as text, empty string when nothing has been written
    pub fn text(&self) -> &'static str {
        self.current().map_or("", |status| status.as_str())
    }

    /// Receiver that is notified on every overwrite
    pub fn subscribe(&self) -> watch::Receiver<Option<ConnectivityStatus>> {
        self.slot.subscribe()
    }
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let channel = StatusChannel::new();
        assert_eq!(channel.current(), None);
        assert_eq!(channel.text(), "");
    }

    #[test]
    fn test_write_overwrites_previous_value() {
        let channel = StatusChannel::new();
        channel.write(ConnectivityStatus::Connected);
        channel.write(ConnectivityStatus::Subscribed);

        assert_eq!(channel.current(), Some(ConnectivityStatus::Subscribed));
        assert_eq!(channel.text(), "SUBSCRIBED");
    }

    #[test]
    fn test_reset_empties_buffer() {
        let channel = StatusChannel::new();
        channel.write(ConnectivityStatus::Error);
        channel.reset();
        assert_eq!(channel.text(), "");
    }

    #[test]
    fn test_vocabulary_fits_buffer() {
        for status in ConnectivityStatus::ALL {
            assert!(!status.as_str().is_empty());
            assert!(status.as_str().len() < STATUS_TEXT_CAPACITY);
        }
    }

    #[test]
    fn test_serializes_as_vocabulary_text() {
        let json = serde_json::to_string(&ConnectivityStatus::PublishAck).unwrap();
        assert_eq!(json, "\"PUBLISH_ACK\"");
        let json = serde_json::to_string(&ConnectivityStatus::DataReceived).unwrap();
        assert_eq!(json, "\"DATA_RECEIVED\"");
    }

    #[tokio::test]
    async fn test_subscriber_sees_latest_only() {
        let channel = StatusChannel::new();
        let mut rx = channel.subscribe();

        channel.write(ConnectivityStatus::Connected);
        channel.write(ConnectivityStatus::Disconnected);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(ConnectivityStatus::Disconnected));
        assert!(!rx.has_changed().unwrap());
    }
}
