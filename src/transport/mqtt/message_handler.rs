//! Pure mapping of rumqttc events onto session events

use crate::session::{ReceivedData, SessionEvent};
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::Event;
use tracing::trace;

pub struct MessageHandler;

impl MessageHandler {
    /// Route an MQTT event to the session event it represents, if any
    ///
    /// Keep-alive traffic and everything we send ourselves map to `None`.
    pub fn route_mqtt_event(event: &Event) -> Option<SessionEvent> {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => Some(SessionEvent::Connected),
                Packet::Publish(publish) => Some(SessionEvent::Data(ReceivedData::new(
                    publish.topic.clone(),
                    publish.payload.clone(),
                ))),
                Packet::Disconnect(_) => Some(SessionEvent::Disconnected),
                Packet::SubAck(suback) => Some(SessionEvent::Subscribed {
                    packet_id: suback.pkid,
                }),
                Packet::UnsubAck(unsuback) => Some(SessionEvent::Unsubscribed {
                    packet_id: unsuback.pkid,
                }),
                Packet::PubAck(puback) => Some(SessionEvent::Published {
                    packet_id: puback.pkid,
                }),
                other => {
                    trace!(target: "mqtt_transport", "MQTT event: {:?}", other);
                    None
                }
            },
            Event::Outgoing(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rumqttc::v5::mqttbytes::v5::{ConnAck, ConnectReturnCode, Disconnect, Publish};
    use rumqttc::v5::mqttbytes::QoS;

    #[test]
    fn test_connack_routes_to_connected() {
        let connack = Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
            properties: None,
        }));
        assert_eq!(
            MessageHandler::route_mqtt_event(&connack),
            Some(SessionEvent::Connected)
        );
    }

    #[test]
    fn test_disconnect_routes_to_disconnected() {
        let disconnect = Event::Incoming(Packet::Disconnect(Disconnect {
            reason_code: rumqttc::v5::mqttbytes::v5::DisconnectReasonCode::NormalDisconnection,
            properties: None,
        }));
        assert_eq!(
            MessageHandler::route_mqtt_event(&disconnect),
            Some(SessionEvent::Disconnected)
        );
    }

    #[test]
    fn test_publish_routes_to_data() {
        let publish = Event::Incoming(Packet::Publish(Publish {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: false,
            topic: Bytes::from("/esp8266/set"),
            pkid: 0,
            payload: Bytes::from("{\"relay\":1}"),
            properties: None,
        }));

        match MessageHandler::route_mqtt_event(&publish) {
            Some(SessionEvent::Data(data)) => {
                assert_eq!(data.topic(), b"/esp8266/set");
                assert_eq!(data.payload(), b"{\"relay\":1}");
            }
            other => panic!("Expected data event, got {other:?}"),
        }
    }
}
