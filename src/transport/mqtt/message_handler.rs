//! Pure mapping from rumqttc events and errors to session events

use crate::protocol::MessageId;
use crate::session::SessionEvent;
use crate::state::FaultKind;
use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet};
use rumqttc::v5::{ConnectionError, Event};
use tracing::trace;

pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to a session event (pure routing decision).
    /// Keep-alive traffic and outgoing packets produce nothing.
    pub fn route_mqtt_event(event: &Event) -> Option<SessionEvent> {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(connack) => match &connack.code {
                    ConnectReturnCode::Success => Some(SessionEvent::Connected),
                    code => Some(SessionEvent::Error(FaultKind::BrokerRefusal {
                        code: format!("{code:?}"),
                    })),
                },
                Packet::Publish(publish) => Some(SessionEvent::DataReceived {
                    topic: String::from_utf8_lossy(&publish.topic).to_string(),
                    payload: publish.payload.to_vec(),
                }),
                Packet::PubAck(ack) => Some(SessionEvent::Delivered(MessageId(u32::from(ack.pkid)))),
                Packet::PubComp(comp) => {
                    Some(SessionEvent::Delivered(MessageId(u32::from(comp.pkid))))
                }
                Packet::SubAck(suback) => {
                    Some(SessionEvent::Subscribed(MessageId(u32::from(suback.pkid))))
                }
                Packet::Disconnect(_) => Some(SessionEvent::Disconnected),
                other => {
                    trace!(packet = ?other, "Ignoring infrastructure packet");
                    None
                }
            },
            Event::Outgoing(_) => None,
        }
    }

    /// Classify an event-loop failure (pure function)
    pub fn classify_connection_error(error: &ConnectionError) -> FaultKind {
        match error {
            ConnectionError::ConnectionRefused(code) => FaultKind::BrokerRefusal {
                code: format!("{code:?}"),
            },
            ConnectionError::Tls(e) => FaultKind::Tls {
                detail: e.to_string(),
            },
            ConnectionError::Io(e) => FaultKind::Transport {
                errno: e.raw_os_error(),
                detail: e.to_string(),
            },
            other => FaultKind::Transport {
                errno: None,
                detail: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rumqttc::v5::mqttbytes::v5::{ConnAck, Disconnect, DisconnectReasonCode, PubAck, Publish};
    use rumqttc::v5::mqttbytes::QoS;
    use std::io;

    #[test]
    fn test_connack_success_is_connected() {
        let event = Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
            properties: None,
        }));
        assert_eq!(
            MessageHandler::route_mqtt_event(&event),
            Some(SessionEvent::Connected)
        );
    }

    #[test]
    fn test_connack_refusal_is_fault() {
        let event = Event::Incoming(Packet::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::NotAuthorized,
            properties: None,
        }));
        assert!(matches!(
            MessageHandler::route_mqtt_event(&event),
            Some(SessionEvent::Error(FaultKind::BrokerRefusal { .. }))
        ));
    }

    #[test]
    fn test_publish_is_data_received() {
        let publish = Publish {
            dup: false,
            qos: QoS::AtLeastOnce,
            retain: false,
            topic: Bytes::from("deme25/8/esp32s3/commands"),
            pkid: 3,
            payload: Bytes::from("led on"),
            properties: None,
        };
        let event = Event::Incoming(Packet::Publish(publish));
        assert_eq!(
            MessageHandler::route_mqtt_event(&event),
            Some(SessionEvent::DataReceived {
                topic: "deme25/8/esp32s3/commands".to_string(),
                payload: b"led on".to_vec(),
            })
        );
    }

    #[test]
    fn test_puback_is_delivered() {
        let event = Event::Incoming(Packet::PubAck(PubAck::new(42, None)));
        assert_eq!(
            MessageHandler::route_mqtt_event(&event),
            Some(SessionEvent::Delivered(MessageId(42)))
        );
    }

    #[test]
    fn test_disconnect_is_disconnected() {
        let event = Event::Incoming(Packet::Disconnect(Disconnect {
            reason_code: DisconnectReasonCode::NormalDisconnection,
            properties: None,
        }));
        assert_eq!(
            MessageHandler::route_mqtt_event(&event),
            Some(SessionEvent::Disconnected)
        );
    }

    #[test]
    fn test_classify_io_error_keeps_errno() {
        let error = ConnectionError::Io(io::Error::from_raw_os_error(111));
        match MessageHandler::classify_connection_error(&error) {
            FaultKind::Transport { errno, .. } => assert_eq!(errno, Some(111)),
            other => panic!("unexpected fault: {other:?}"),
        }
    }

    #[test]
    fn test_classify_refusal() {
        let error = ConnectionError::ConnectionRefused(ConnectReturnCode::BadUserNamePassword);
        assert_eq!(
            MessageHandler::classify_connection_error(&error),
            FaultKind::BrokerRefusal {
                code: "BadUserNamePassword".to_string()
            }
        );
    }

    #[test]
    fn test_classify_other_error_is_transport() {
        let error = ConnectionError::RequestsDone;
        assert!(matches!(
            MessageHandler::classify_connection_error(&error),
            FaultKind::Transport { errno: None, .. }
        ));
    }
}
