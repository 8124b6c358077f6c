//! Impure I/O side of the rumqttc session client
//!
//! `init` builds the `AsyncClient`/`EventLoop` pair without touching the
//! network; `start` spawns the pump task that polls the event loop, maps
//! every event to a [`SessionEvent`] and paces its own reconnects.

use super::connection::{configure_mqtt_options, to_rumqttc_qos, ReconnectConfig};
use super::message_handler::MessageHandler;
use crate::protocol::{MessageId, Qos};
use crate::session::{ClientError, SessionClient, SessionConfig, SessionEvent, SessionFactory};
use rumqttc::v5::{AsyncClient, ConnectionError, EventLoop};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Requests rumqttc may hold before `try_publish`/`try_subscribe` reject
const REQUEST_CAPACITY: usize = 10;

/// Builds rumqttc-backed session clients
#[derive(Debug, Clone, Default)]
pub struct RumqttSessionFactory {
    reconnect: ReconnectConfig,
}

impl RumqttSessionFactory {
    pub fn new(reconnect: ReconnectConfig) -> Self {
        Self { reconnect }
    }
}

impl SessionFactory for RumqttSessionFactory {
    type Client = RumqttSession;

    fn init(
        &self,
        config: SessionConfig,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Self::Client, ClientError> {
        let mqtt_options = configure_mqtt_options(&config)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        debug!(broker = %config.broker_url, client_id = %config.credential.client_id(), "Session client initialised");

        Ok(RumqttSession {
            client,
            event_loop: Mutex::new(Some(event_loop)),
            pump: Mutex::new(None),
            events,
            reconnect: self.reconnect.clone(),
            next_id: AtomicU32::new(1),
        })
    }
}

pub struct RumqttSession {
    client: AsyncClient,
    event_loop: Mutex<Option<EventLoop>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    events: mpsc::Sender<SessionEvent>,
    reconnect: ReconnectConfig,
    next_id: AtomicU32,
}

impl RumqttSession {
    fn next_message_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Poll the event loop forever; failures are reported and retried
    async fn pump(
        mut event_loop: EventLoop,
        events: mpsc::Sender<SessionEvent>,
        reconnect: ReconnectConfig,
    ) {
        let mut connected = false;
        let mut attempt = 0u32;

        loop {
            match event_loop.poll().await {
                Ok(event) => {
                    let Some(session_event) = MessageHandler::route_mqtt_event(&event) else {
                        continue;
                    };
                    match session_event {
                        SessionEvent::Connected => {
                            connected = true;
                            attempt = 0;
                        }
                        SessionEvent::Disconnected => connected = false,
                        _ => {}
                    }
                    if events.send(session_event).await.is_err() {
                        break;
                    }
                }
                Err(ConnectionError::RequestsDone) => {
                    info!("Session client dropped, stopping event loop");
                    break;
                }
                Err(e) => {
                    attempt = attempt.saturating_add(1);
                    let fault = MessageHandler::classify_connection_error(&e);
                    error!(error = %e, attempt = attempt, "MQTT event loop error");

                    if connected {
                        connected = false;
                        if events.send(SessionEvent::Disconnected).await.is_err() {
                            break;
                        }
                    }
                    if events.send(SessionEvent::Error(fault)).await.is_err() {
                        break;
                    }

                    let delay_ms = reconnect.calculate_backoff_delay(attempt);
                    debug!(delay_ms = delay_ms, "Waiting before next connect attempt");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }
}

impl SessionClient for RumqttSession {
    fn start(&self) -> Result<(), ClientError> {
        let event_loop = self
            .event_loop
            .lock()
            .map_err(|_| ClientError::AlreadyRunning)?
            .take()
            .ok_or(ClientError::AlreadyRunning)?;

        let handle = tokio::spawn(Self::pump(
            event_loop,
            self.events.clone(),
            self.reconnect.clone(),
        ));
        if let Ok(mut pump) = self.pump.lock() {
            *pump = Some(handle);
        }
        info!("MQTT event loop started");
        Ok(())
    }

    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: Qos,
        retain: bool,
    ) -> Result<MessageId, ClientError> {
        self.client
            .try_publish(topic, to_rumqttc_qos(qos), retain, payload.to_vec())
            .map_err(|e| {
                warn!(topic = %topic, error = %e, "rumqttc rejected publish");
                ClientError::Rejected(Box::new(e))
            })?;
        Ok(self.next_message_id())
    }

    fn subscribe(&self, topic: &str, qos: Qos) -> Result<MessageId, ClientError> {
        self.client
            .try_subscribe(topic, to_rumqttc_qos(qos))
            .map_err(|e| ClientError::Rejected(Box::new(e)))?;
        Ok(self.next_message_id())
    }
}

impl Drop for RumqttSession {
    fn drop(&mut self) {
        if let Ok(mut pump) = self.pump.lock() {
            if let Some(handle) = pump.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Credential;

    fn config(url: &str) -> SessionConfig {
        SessionConfig {
            broker_url: url.to_string(),
            credential: Credential::with_client_id("ESP32S3_AABBCC"),
            trust: None,
            keep_alive: Duration::from_secs(60),
            last_will_topic: None,
        }
    }

    #[tokio::test]
    async fn test_init_does_not_connect() {
        let (tx, mut rx) = mpsc::channel(10);
        let factory = RumqttSessionFactory::default();
        let _session = factory.init(config("mqtt://localhost:1883"), tx).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_init_rejects_secure_broker_without_trust() {
        let (tx, _rx) = mpsc::channel(10);
        let factory = RumqttSessionFactory::default();
        let result = factory.init(config("mqtts://broker.local"), tx);
        assert!(matches!(result, Err(ClientError::MissingTrustAnchor(_))));
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (tx, _rx) = mpsc::channel(10);
        let factory = RumqttSessionFactory::default();
        let session = factory.init(config("mqtt://127.0.0.1:1"), tx).unwrap();

        session.start().unwrap();
        assert!(matches!(session.start(), Err(ClientError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn test_unreachable_broker_reports_transport_fault() {
        let (tx, mut rx) = mpsc::channel(10);
        let factory = RumqttSessionFactory::default();
        let session = factory.init(config("mqtt://127.0.0.1:1"), tx).unwrap();
        session.start().unwrap();

        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap();
        assert!(matches!(
            event,
            Some(SessionEvent::Error(crate::state::FaultKind::Transport { .. }))
        ));
    }

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let (tx, _rx) = mpsc::channel(10);
        let factory = RumqttSessionFactory::default();
        let session = factory.init(config("mqtt://localhost:1883"), tx).unwrap();

        let first = session.publish("t/1", b"a", Qos::AtMostOnce, false).unwrap();
        let second = session.subscribe("t/#", Qos::AtLeastOnce).unwrap();
        assert_eq!(first, MessageId(1));
        assert_eq!(second, MessageId(2));
    }
}
