//! Gate between application code and the session client
//!
//! The bridge is the only component that calls the session client's
//! `publish`/`subscribe`. Every call is checked against the current session
//! state first and fails fast with `NotReady` instead of queueing: nothing is
//! buffered across reconnects.

use super::registry::{HandlerRegistry, MessageCallback};
use crate::protocol::{validate_topic_filter, validate_topic_name, MessageId, Qos, TopicError};
use crate::session::client::{ClientError, SessionClient};
use crate::session::events::SessionLifecycle;
use crate::session::SessionError;
use crate::state::{ConnectivityState, SessionState};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tracing::{debug, trace};

/// Errors returned synchronously to publish/subscribe callers
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Session not ready - current state: {state:?}")]
    NotReady { state: SessionState },
    #[error("Invalid topic: {0}")]
    InvalidTopic(#[from] TopicError),
    #[error("Session client rejected the request: {0}")]
    Rejected(#[source] ClientError),
}

/// Cloneable handle shared by the session manager, the periodic driver and
/// any application code
pub struct DispatchBridge<C> {
    client: Arc<OnceLock<Arc<C>>>,
    state: watch::Receiver<ConnectivityState>,
    handlers: Arc<RwLock<HandlerRegistry>>,
}

impl<C> Clone for DispatchBridge<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            state: self.state.clone(),
            handlers: self.handlers.clone(),
        }
    }
}

impl<C: SessionClient> DispatchBridge<C> {
    pub fn new(state: watch::Receiver<ConnectivityState>) -> Self {
        Self {
            client: Arc::new(OnceLock::new()),
            state,
            handlers: Arc::new(RwLock::new(HandlerRegistry::new())),
        }
    }

    /// Hand the started client to the bridge; only one client per process
    pub(crate) fn attach(&self, client: Arc<C>) -> Result<(), SessionError> {
        self.client
            .set(client)
            .map_err(|_| SessionError::AlreadyStarted)
    }

    pub fn is_attached(&self) -> bool {
        self.client.get().is_some()
    }

    /// Read-only snapshot of link and session state
    pub fn current_state(&self) -> ConnectivityState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        SessionLifecycle::can_publish(&self.state.borrow().session)
    }

    /// Check connection state before operations
    fn ready_client(&self) -> Result<&Arc<C>, DispatchError> {
        let session = self.state.borrow().session.clone();
        if !SessionLifecycle::can_publish(&session) {
            return Err(DispatchError::NotReady { state: session });
        }
        self.client
            .get()
            .ok_or(DispatchError::NotReady { state: session })
    }

    /// Publish if the session is ready; never blocks, never queues
    pub fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: Qos,
        retain: bool,
    ) -> Result<MessageId, DispatchError> {
        validate_topic_name(topic)?;
        let client = self.ready_client()?;

        let id = client
            .publish(topic, payload, qos, retain)
            .map_err(DispatchError::Rejected)?;

        debug!(
            topic = %topic,
            msg_id = %id,
            qos = u8::from(qos),
            retain = retain,
            bytes = payload.len(),
            "Published message"
        );
        Ok(id)
    }

    /// Subscribe if the session is ready
    pub fn subscribe(&self, topic: &str, qos: Qos) -> Result<MessageId, DispatchError> {
        validate_topic_filter(topic)?;

        let session = self.state.borrow().session.clone();
        if !SessionLifecycle::can_subscribe(&session) {
            return Err(DispatchError::NotReady { state: session });
        }
        let client = self.ready_client()?;

        let id = client.subscribe(topic, qos).map_err(DispatchError::Rejected)?;
        debug!(topic = %topic, msg_id = %id, qos = u8::from(qos), "Subscribe issued");
        Ok(id)
    }

    /// Associate an inbound topic pattern with a handler
    pub async fn register_handler<H>(&self, pattern: &str, handler: H) -> Result<(), TopicError>
    where
        H: Fn(&str, &[u8]) + Send + Sync + 'static,
    {
        let callback: MessageCallback = Arc::new(handler);
        self.handlers.write().await.register(pattern, callback)?;
        debug!(pattern = %pattern, "Registered message handler");
        Ok(())
    }

    /// Route an inbound message to the first matching handler.
    /// Returns false when no handler matched.
    pub async fn dispatch(&self, topic: &str, payload: &[u8]) -> bool {
        // Release the lock before running the handler so it may publish.
        let resolved = {
            let handlers = self.handlers.read().await;
            handlers
                .resolve(topic)
                .map(|(pattern, callback)| (pattern.to_string(), callback.clone()))
        };

        match resolved {
            Some((pattern, callback)) => {
                trace!(topic = %topic, pattern = %pattern, "Dispatching inbound message");
                callback(topic, payload);
                true
            }
            None => {
                debug!(topic = %topic, bytes = payload.len(), "No handler for inbound message");
                false
            }
        }
    }

    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateCell;
    use crate::testing::mocks::MockSessionClient;
    use std::sync::Mutex;

    fn bridge_with_client() -> (StateCell, DispatchBridge<MockSessionClient>, Arc<MockSessionClient>) {
        let cell = StateCell::new();
        let bridge = DispatchBridge::new(cell.watch());
        let client = Arc::new(MockSessionClient::new());
        bridge.attach(client.clone()).unwrap();
        (cell, bridge, client)
    }

    #[test]
    fn test_publish_not_ready_has_no_side_effect() {
        let (cell, bridge, client) = bridge_with_client();
        cell.set_session(SessionState::Connecting);

        let result = bridge.publish("t/1", b"hello", Qos::AtLeastOnce, false);

        assert!(matches!(
            result,
            Err(DispatchError::NotReady {
                state: SessionState::Connecting
            })
        ));
        assert!(client.published().is_empty());
    }

    #[test]
    fn test_publish_without_client_is_not_ready() {
        let cell = StateCell::new();
        let bridge: DispatchBridge<MockSessionClient> = DispatchBridge::new(cell.watch());
        cell.set_session(SessionState::Ready);

        let result = bridge.publish("t/1", b"hello", Qos::AtLeastOnce, false);
        assert!(matches!(result, Err(DispatchError::NotReady { .. })));
    }

    #[test]
    fn test_publish_when_ready_returns_id() {
        let (cell, bridge, client) = bridge_with_client();
        cell.set_session(SessionState::Ready);

        let id = bridge
            .publish("t/1", b"hello", Qos::AtLeastOnce, false)
            .unwrap();

        let published = client.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, id);
        assert_eq!(published[0].1.topic, "t/1");
        assert_eq!(published[0].1.payload, b"hello");
    }

    #[test]
    fn test_publish_rejects_wildcard_topic() {
        let (cell, bridge, client) = bridge_with_client();
        cell.set_session(SessionState::Ready);

        let result = bridge.publish("t/#", b"x", Qos::AtMostOnce, false);
        assert!(matches!(result, Err(DispatchError::InvalidTopic(_))));
        assert!(client.published().is_empty());
    }

    #[test]
    fn test_publish_surfaces_client_rejection() {
        let (cell, bridge, client) = bridge_with_client();
        cell.set_session(SessionState::Ready);
        client.set_reject(true);

        let result = bridge.publish("t/1", b"x", Qos::AtLeastOnce, false);
        assert!(matches!(result, Err(DispatchError::Rejected(_))));
    }

    #[test]
    fn test_subscribe_gated() {
        let (cell, bridge, client) = bridge_with_client();

        assert!(bridge.subscribe("cmd/#", Qos::AtLeastOnce).is_err());
        assert!(client.subscribed().is_empty());

        cell.set_session(SessionState::Ready);
        assert!(bridge.subscribe("cmd/#", Qos::AtLeastOnce).is_ok());
        assert_eq!(client.subscribed().len(), 1);
    }

    #[test]
    fn test_attach_twice_is_already_started() {
        let (_cell, bridge, _client) = bridge_with_client();
        let result = bridge.attach(Arc::new(MockSessionClient::new()));
        assert!(matches!(result, Err(SessionError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_first_match() {
        let (_cell, bridge, _client) = bridge_with_client();
        let hits = Arc::new(Mutex::new(Vec::new()));

        let sink = hits.clone();
        bridge
            .register_handler("a/+/c", move |topic, payload| {
                sink.lock()
                    .unwrap()
                    .push(format!("single:{topic}:{}", String::from_utf8_lossy(payload)));
            })
            .await
            .unwrap();
        let sink = hits.clone();
        bridge
            .register_handler("a/#", move |topic, _| {
                sink.lock().unwrap().push(format!("multi:{topic}"));
            })
            .await
            .unwrap();

        assert!(bridge.dispatch("a/b/c", b"on").await);
        assert!(bridge.dispatch("a/z", b"").await);
        assert!(!bridge.dispatch("x/b/c", b"").await);

        assert_eq!(
            *hits.lock().unwrap(),
            vec!["single:a/b/c:on".to_string(), "multi:a/z".to_string()]
        );
    }
}
