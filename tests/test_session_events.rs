//! Session state machine behavior through the dispatcher
//!
//! Every session event must leave a status word from the fixed vocabulary and
//! raise the session status flag; connected and data events also touch the
//! session handle and the diagnostic sink.

use proptest::prelude::*;
use rumqttc::v5::mqttbytes::QoS;
use smarthome_link::session::{
    self, ReceivedData, SessionEvent, SessionEventSink, SessionStateMachine,
};
use smarthome_link::status::ConnectivityStatus;
use smarthome_link::testing::mocks::{MockSessionClient, RecordingDiagnostics};
use smarthome_link::{ConnectivityContext, SESSION_STATUS_BIT};
use std::sync::Arc;
use tokio::sync::mpsc;

const TOPIC: &str = "/esp8266/set";

fn machine() -> (SessionStateMachine, Arc<RecordingDiagnostics>) {
    let diagnostics = Arc::new(RecordingDiagnostics::new());
    (SessionStateMachine::new(TOPIC, diagnostics.clone()), diagnostics)
}

#[tokio::test]
async fn test_connected_subscribes_and_goes_online() {
    let ctx = Arc::new(ConnectivityContext::new());
    let (machine, _diagnostics) = machine();
    let client = MockSessionClient::new();
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = tokio::spawn(session::run_dispatcher(
        machine,
        ctx.clone(),
        client.clone(),
        rx,
    ));

    tx.send(SessionEvent::BeforeConnect).unwrap();
    tx.send(SessionEvent::Connected).unwrap();
    drop(tx);
    dispatcher.await.unwrap();

    assert_eq!(ctx.status().text(), "CONNECTED");
    assert!(ctx.is_online());
    assert_eq!(
        client.subscriptions(),
        vec![(TOPIC.to_string(), QoS::AtMostOnce)]
    );
}

#[tokio::test]
async fn test_data_is_bounded_by_reported_lengths() {
    let ctx = Arc::new(ConnectivityContext::new());
    let (machine, diagnostics) = machine();
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = tokio::spawn(session::run_dispatcher(
        machine,
        ctx.clone(),
        MockSessionClient::new(),
        rx,
    ));

    tx.send(SessionEvent::Data(ReceivedData::with_lengths(
        &b"t-and-more"[..],
        1,
        &b"p-and-more"[..],
        1,
    )))
    .unwrap();
    drop(tx);
    dispatcher.await.unwrap();

    assert_eq!(
        diagnostics.received_messages(),
        vec![(b"t".to_vec(), b"p".to_vec())]
    );
    assert_eq!(ctx.status().text(), "DATA_RECEIVED");
}

#[tokio::test]
async fn test_reconnect_cycle_toggles_online() {
    let ctx = Arc::new(ConnectivityContext::new());
    let (machine, _diagnostics) = machine();
    let client = MockSessionClient::new();
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = tokio::spawn(session::run_dispatcher(
        machine,
        ctx.clone(),
        client.clone(),
        rx,
    ));

    for event in [
        SessionEvent::BeforeConnect,
        SessionEvent::Connected,
        SessionEvent::Error("connection reset".to_string()),
        SessionEvent::Disconnected,
        SessionEvent::BeforeConnect,
        SessionEvent::Connected,
    ] {
        tx.send(event).unwrap();
    }
    drop(tx);
    dispatcher.await.unwrap();

    assert!(ctx.is_online());
    // Resubscribed on every connection
    assert_eq!(client.subscriptions().len(), 2);
}

fn arb_event() -> impl Strategy<Value = SessionEvent> {
    prop_oneof![
        Just(SessionEvent::BeforeConnect),
        Just(SessionEvent::Connected),
        Just(SessionEvent::Disconnected),
        any::<u16>().prop_map(|packet_id| SessionEvent::Subscribed { packet_id }),
        any::<u16>().prop_map(|packet_id| SessionEvent::Unsubscribed { packet_id }),
        any::<u16>().prop_map(|packet_id| SessionEvent::Published { packet_id }),
        (
            proptest::collection::vec(any::<u8>(), 0..16),
            0usize..24,
            proptest::collection::vec(any::<u8>(), 0..32),
            0usize..40,
        )
            .prop_map(|(topic, topic_len, payload, payload_len)| {
                SessionEvent::Data(ReceivedData::with_lengths(
                    topic,
                    topic_len,
                    payload,
                    payload_len,
                ))
            }),
        ".{0,20}".prop_map(SessionEvent::Error),
    ]
}

proptest! {
    #[test]
    fn every_event_leaves_status_and_raises_flag(
        events in proptest::collection::vec(arb_event(), 1..30)
    ) {
        let ctx = ConnectivityContext::new();
        let (mut machine, diagnostics) = machine();
        let client = MockSessionClient::new();
        let mut data_events = 0;

        for event in events {
            if matches!(event, SessionEvent::Data(_)) {
                data_events += 1;
            }
            ctx.session_flags().clear(SESSION_STATUS_BIT);
            machine.dispatch(&ctx, &client, event);

            prop_assert!(ctx.session_flags().is_set(SESSION_STATUS_BIT));
            let status = ctx.status().current();
            prop_assert!(status.is_some());
            let text = ctx.status().text();
            prop_assert!(!text.is_empty());
            prop_assert!(ConnectivityStatus::ALL.iter().any(|s| s.as_str() == text));
        }

        prop_assert_eq!(diagnostics.received_messages().len(), data_events);
    }

    #[test]
    fn diagnostics_never_see_bytes_past_reported_lengths(
        topic in proptest::collection::vec(any::<u8>(), 0..16),
        topic_len in 0usize..24,
        payload in proptest::collection::vec(any::<u8>(), 0..32),
        payload_len in 0usize..40,
    ) {
        let ctx = ConnectivityContext::new();
        let (mut machine, diagnostics) = machine();
        let data = ReceivedData::with_lengths(topic.clone(), topic_len, payload.clone(), payload_len);

        machine.dispatch(&ctx, &MockSessionClient::new(), SessionEvent::Data(data));

        let received = diagnostics.received_messages();
        prop_assert_eq!(received.len(), 1);
        prop_assert_eq!(&received[0].0[..], &topic[..topic_len.min(topic.len())]);
        prop_assert_eq!(&received[0].1[..], &payload[..payload_len.min(payload.len())]);
    }
}
