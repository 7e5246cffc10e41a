//! Orchestrator startup tests
//!
//! Drives the full startup sequence against mock collaborators: the link comes
//! up, the wait returns, and the session is started exactly once on top of it.

use smarthome_link::error::{ConnectivityError, StartupStage};
use smarthome_link::link::{LinkEvent, LinkState};
use smarthome_link::session::SessionEvent;
use smarthome_link::testing::mocks::{
    LinkCall, MockLinkDriver, MockSessionTransport, RecordingDiagnostics, MOCK_ADDRESS,
};
use smarthome_link::transport::SessionError;
use smarthome_link::{DeviceConfig, Orchestrator, LINK_CONNECTED_BIT};
use std::sync::Arc;
use std::time::Duration;

fn config_with(startup: &str) -> DeviceConfig {
    DeviceConfig::from_toml_str(&format!(
        r#"
[link]
ssid = "Panda"

[mqtt]
broker_url = "mqtt://localhost:1883"
subscribe_topic = "/esp8266/set"

{startup}
"#
    ))
    .unwrap()
}

async fn eventually(check: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test]
async fn test_link_up_then_session_started_once() {
    let driver = Arc::new(MockLinkDriver::new().auto_connect());
    let transport = MockSessionTransport::new().auto_connect();
    let probe = transport.probe();
    let diagnostics = Arc::new(RecordingDiagnostics::new());

    let running = Orchestrator::new(config_with(""), driver.clone())
        .start(move |_| Ok(transport), diagnostics)
        .await
        .unwrap();
    let ctx = running.context();

    assert!(ctx.link_flags().is_set(LINK_CONNECTED_BIT));
    assert_eq!(running.link_state(), LinkState::Connected);
    assert_eq!(probe.start_count(), 1);

    eventually(|| ctx.is_online()).await;
    assert_eq!(ctx.status().text(), "CONNECTED");
    assert_eq!(probe.subscriptions().len(), 1);
    assert_eq!(probe.subscriptions()[0].0, "/esp8266/set");

    running.shutdown();
}

#[tokio::test]
async fn test_session_waits_for_address() {
    let driver = Arc::new(MockLinkDriver::new());
    let transport = MockSessionTransport::new();
    let probe = transport.probe();
    let orchestrator = Orchestrator::new(config_with(""), driver.clone());
    let ctx = orchestrator.context();

    let startup = tokio::spawn(async move {
        orchestrator
            .start(move |_| Ok(transport), Arc::new(RecordingDiagnostics::new()))
            .await
            .map(|running| running.link_state())
    });

    eventually(|| driver.calls().contains(&LinkCall::Start)).await;
    assert!(driver.emit(LinkEvent::StationStart));
    eventually(|| driver.connect_count() == 1).await;

    // Associated but no address yet: the session must not start
    tokio::task::yield_now().await;
    assert_eq!(probe.start_count(), 0);
    assert!(!ctx.is_link_up());

    assert!(driver.emit(LinkEvent::AddressAcquired(MOCK_ADDRESS)));
    let state = startup.await.unwrap().unwrap();

    assert_eq!(state, LinkState::Connected);
    assert_eq!(probe.start_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_link_wait_times_out() {
    let driver = Arc::new(MockLinkDriver::new());
    let transport = MockSessionTransport::new();
    let probe = transport.probe();

    let result = Orchestrator::new(config_with("[startup]\nlink_timeout_secs = 30"), driver)
        .start(move |_| Ok(transport), Arc::new(RecordingDiagnostics::new()))
        .await;

    assert!(matches!(
        result,
        Err(ConnectivityError::StartupFailure {
            stage: StartupStage::LinkWait,
            ..
        })
    ));
    assert_eq!(probe.start_count(), 0);
}

#[tokio::test]
async fn test_link_init_failure_is_fatal() {
    let driver = Arc::new(MockLinkDriver::new().failing_on(LinkCall::Init));

    let result = Orchestrator::new(config_with(""), driver.clone())
        .start(
            |_| Ok(MockSessionTransport::new()),
            Arc::new(RecordingDiagnostics::new()),
        )
        .await;

    match result {
        Err(error) => {
            assert!(error.is_fatal());
            assert!(matches!(
                error,
                ConnectivityError::StartupFailure {
                    stage: StartupStage::LinkInit,
                    ..
                }
            ));
        }
        Ok(_) => panic!("Expected startup failure"),
    }
    assert_eq!(driver.calls(), vec![LinkCall::Init]);
}

#[tokio::test]
async fn test_link_start_failure() {
    let driver = Arc::new(MockLinkDriver::new().failing_on(LinkCall::Start));

    let result = Orchestrator::new(config_with(""), driver)
        .start(
            |_| Ok(MockSessionTransport::new()),
            Arc::new(RecordingDiagnostics::new()),
        )
        .await;

    assert!(matches!(
        result,
        Err(ConnectivityError::StartupFailure {
            stage: StartupStage::LinkStart,
            ..
        })
    ));
}

#[tokio::test]
async fn test_session_build_failure() {
    let driver = Arc::new(MockLinkDriver::new().auto_connect());

    let result = Orchestrator::new(config_with(""), driver)
        .start(
            |_| -> Result<MockSessionTransport, SessionError> {
                Err(SessionError::StartFailed("broker unreachable".to_string()))
            },
            Arc::new(RecordingDiagnostics::new()),
        )
        .await;

    assert!(matches!(
        result,
        Err(ConnectivityError::StartupFailure {
            stage: StartupStage::SessionInit,
            ..
        })
    ));
}

#[tokio::test]
async fn test_session_start_failure() {
    let driver = Arc::new(MockLinkDriver::new().auto_connect());
    let transport = MockSessionTransport::failing_start();
    let probe = transport.probe();

    let result = Orchestrator::new(config_with(""), driver)
        .start(move |_| Ok(transport), Arc::new(RecordingDiagnostics::new()))
        .await;

    assert!(matches!(
        result,
        Err(ConnectivityError::StartupFailure {
            stage: StartupStage::SessionStart,
            ..
        })
    ));
    assert_eq!(probe.start_count(), 1);
}

#[tokio::test]
async fn test_link_keeps_reconnecting_under_running_session() {
    let driver = Arc::new(MockLinkDriver::new().auto_connect());
    let transport = MockSessionTransport::new().auto_connect();
    let probe = transport.probe();

    let running = Orchestrator::new(config_with(""), driver.clone())
        .start(move |_| Ok(transport), Arc::new(RecordingDiagnostics::new()))
        .await
        .unwrap();
    let ctx = running.context();

    // The auto-connecting driver answers the retry with a fresh address
    assert!(driver.emit(LinkEvent::Disconnected(
        smarthome_link::link::DisconnectReason::BEACON_TIMEOUT
    )));
    eventually(|| driver.connect_count() == 2 && ctx.is_link_up()).await;

    assert!(probe.emit(SessionEvent::Disconnected));
    eventually(|| !ctx.is_online()).await;
    assert_eq!(ctx.status().text(), "DISCONNECTED");

    // Startup is one-shot: the session is never restarted by the orchestrator
    assert_eq!(probe.start_count(), 1);
    running.shutdown();
}
