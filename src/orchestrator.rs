//! Startup sequencing
//!
//! Brings the link up, waits for it, then starts the messaging session on top
//! of it. After startup both subsystems run on their own dispatcher tasks and
//! the orchestrator has nothing left to do; there is no supervisory restart.

use crate::config::DeviceConfig;
use crate::context::ConnectivityContext;
use crate::diagnostics::DiagnosticSink;
use crate::error::{ConnectivityError, ConnectivityResult, StartupStage};
use crate::flags::{WaitOptions, LINK_CONNECTED_BIT};
use crate::link::{
    self, LinkDriver, LinkError, LinkMode, LinkState, LinkStateMachine, StationConfig,
};
use crate::session::{self, SessionStateMachine};
use crate::transport::{SessionError, SessionTransport};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

pub struct Orchestrator {
    config: DeviceConfig,
    link: Arc<dyn LinkDriver>,
    ctx: Arc<ConnectivityContext>,
}

/// Both subsystems up and running
pub struct RunningConnectivity {
    ctx: Arc<ConnectivityContext>,
    link_state: watch::Receiver<LinkState>,
    link_dispatcher: JoinHandle<()>,
    session_dispatcher: JoinHandle<()>,
}

impl Orchestrator {
    pub fn new(config: DeviceConfig, link: Arc<dyn LinkDriver>) -> Self {
        Self {
            config,
            link,
            ctx: Arc::new(ConnectivityContext::new()),
        }
    }

    /// Shared state, available before startup so observers can attach early
    pub fn context(&self) -> Arc<ConnectivityContext> {
        self.ctx.clone()
    }

    /// Run the startup sequence once
    ///
    /// `build_session` is called only after the link holds an address.
    pub async fn start<T, F>(
        self,
        build_session: F,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> ConnectivityResult<RunningConnectivity>
    where
        T: SessionTransport,
        F: FnOnce(&DeviceConfig) -> Result<T, SessionError>,
    {
        let (link_state, link_dispatcher) = self.start_link()?;

        let waited = self.wait_for_link().await;
        if let Err(e) = waited {
            link_dispatcher.abort();
            return Err(e);
        }

        match self.start_session(build_session, diagnostics) {
            Ok(session_dispatcher) => Ok(RunningConnectivity {
                ctx: self.ctx,
                link_state,
                link_dispatcher,
                session_dispatcher,
            }),
            Err(e) => {
                link_dispatcher.abort();
                Err(e)
            }
        }
    }

    fn start_link(&self) -> ConnectivityResult<(watch::Receiver<LinkState>, JoinHandle<()>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.link
            .init(tx)
            .map_err(|e| ConnectivityError::startup(StartupStage::LinkInit, e))?;

        let machine = LinkStateMachine::new(self.link.clone());
        let link_state = machine.subscribe_state();
        let dispatcher = tokio::spawn(link::run_dispatcher(machine, self.ctx.clone(), rx));

        if let Err(e) = self.configure_link() {
            dispatcher.abort();
            return Err(e);
        }

        if let Err(e) = self.link.start() {
            dispatcher.abort();
            return Err(ConnectivityError::startup(StartupStage::LinkStart, e));
        }

        Ok((link_state, dispatcher))
    }

    fn configure_link(&self) -> ConnectivityResult<()> {
        let station = StationConfig {
            ssid: self.config.link.ssid.clone(),
            passphrase: self.config.link_passphrase()?,
        };
        let stage = |e: LinkError| ConnectivityError::startup(StartupStage::LinkConfig, e);

        self.link.set_storage(self.config.link.storage).map_err(stage)?;
        self.link.set_mode(LinkMode::Station).map_err(stage)?;
        self.link.set_config(&station).map_err(stage)?;

        info!("Link configured for SSID: {}", station.ssid);
        Ok(())
    }

    async fn wait_for_link(&self) -> ConnectivityResult<()> {
        let options = WaitOptions::default().with_timeout(self.config.startup.link_timeout());
        info!("Waiting for link");
        self.ctx
            .link_flags()
            .wait(LINK_CONNECTED_BIT, options)
            .await
            .map_err(|e| ConnectivityError::startup(StartupStage::LinkWait, e))?;
        info!("Link up");
        Ok(())
    }

    fn start_session<T, F>(
        &self,
        build_session: F,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> ConnectivityResult<JoinHandle<()>>
    where
        T: SessionTransport,
        F: FnOnce(&DeviceConfig) -> Result<T, SessionError>,
    {
        let transport = build_session(&self.config)
            .map_err(|e| ConnectivityError::startup(StartupStage::SessionInit, e))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let machine =
            SessionStateMachine::new(self.config.mqtt.subscribe_topic.clone(), diagnostics);
        let dispatcher = tokio::spawn(session::run_dispatcher(
            machine,
            self.ctx.clone(),
            transport.client(),
            rx,
        ));

        if let Err(e) = transport.start(tx) {
            dispatcher.abort();
            return Err(ConnectivityError::startup(StartupStage::SessionStart, e));
        }

        info!(topic = %self.config.mqtt.subscribe_topic, "Session started");
        Ok(dispatcher)
    }
}

impl RunningConnectivity {
    pub fn context(&self) -> Arc<ConnectivityContext> {
        self.ctx.clone()
    }

    pub fn link_state(&self) -> LinkState {
        *self.link_state.borrow()
    }

    /// Stop both dispatchers; the collaborators stop on their next send
    pub fn shutdown(self) {
        self.link_dispatcher.abort();
        self.session_dispatcher.abort();
    }
}
