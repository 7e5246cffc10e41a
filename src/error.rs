//! Connectivity error taxonomy
//!
//! Link disconnections and protocol incompatibilities are recovered inside the
//! link state machine and only surface here for logging. Messaging errors are
//! recorded as status text. Startup failures are fatal to the orchestration.

use crate::link::DisconnectReason;
use std::fmt;
use thiserror::Error;

/// Orchestration step that failed during startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupStage {
    /// Address resolution subsystem and link event group
    LinkInit,
    /// Storage policy, mode and station credentials
    LinkConfig,
    /// Link layer start
    LinkStart,
    /// Waiting for an assigned address
    LinkWait,
    /// Session construction
    SessionInit,
    /// Session start
    SessionStart,
}

impl StartupStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartupStage::LinkInit => "link init",
            StartupStage::LinkConfig => "link config",
            StartupStage::LinkStart => "link start",
            StartupStage::LinkWait => "link wait",
            StartupStage::SessionInit => "session init",
            StartupStage::SessionStart => "session start",
        }
    }
}

impl fmt::Display for StartupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for connectivity operations
#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("Link disconnected: {reason}")]
    LinkDisconnection { reason: DisconnectReason },

    #[error("Access point rejected the advertised basic rates")]
    ProtocolIncompatibility,

    #[error("Messaging error: {message}")]
    MessagingError { message: String },

    #[error("Startup failed during {stage}")]
    StartupFailure {
        stage: StartupStage,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

impl ConnectivityError {
    /// Classify a link disconnection
    pub fn from_disconnect(reason: DisconnectReason) -> Self {
        if reason.is_basic_rate_unsupported() {
            Self::ProtocolIncompatibility
        } else {
            Self::LinkDisconnection { reason }
        }
    }

    /// Create messaging error
    pub fn messaging<S: Into<String>>(message: S) -> Self {
        Self::MessagingError {
            message: message.into(),
        }
    }

    /// Create startup failure for the given stage
    pub fn startup<E>(stage: StartupStage, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::StartupFailure {
            stage,
            source: Box::new(source),
        }
    }

    /// Whether the orchestration cannot continue after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConnectivityError::StartupFailure { .. } | ConnectivityError::ConfigError(_)
        )
    }
}

/// Result type for connectivity operations
pub type ConnectivityResult<T> = Result<T, ConnectivityError>;
