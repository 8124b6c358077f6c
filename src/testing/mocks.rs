//! Mock implementations for testing
//!
//! Provides a mock session client/factory and a mock link driver so every
//! lifecycle transition can be driven with synthetic events, without a
//! broker or a network.

use crate::link::{LinkDriver, LinkError};
use crate::protocol::{MessageId, OutboundMessage, Qos, Subscription};
use crate::session::{ClientError, SessionClient, SessionConfig, SessionEvent, SessionFactory};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub type PublishedMessage = (MessageId, OutboundMessage);
pub type IssuedSubscription = (MessageId, Subscription);

#[derive(Debug, Default)]
struct ClientRecord {
    published: Mutex<Vec<PublishedMessage>>,
    subscribed: Mutex<Vec<IssuedSubscription>>,
    start_count: AtomicUsize,
    reject: AtomicBool,
    next_id: AtomicU32,
    events: Mutex<Option<mpsc::Sender<SessionEvent>>>,
    config: Mutex<Option<SessionConfig>>,
}

/// Session client that records every call; clones share the record
#[derive(Debug, Clone, Default)]
pub struct MockSessionClient {
    record: Arc<ClientRecord>,
}

impl MockSessionClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_events(config: SessionConfig, events: mpsc::Sender<SessionEvent>) -> Self {
        let client = Self::new();
        if let Ok(mut slot) = client.record.events.lock() {
            *slot = Some(events);
        }
        if let Ok(mut slot) = client.record.config.lock() {
            *slot = Some(config);
        }
        client
    }

    /// Make every following publish/subscribe fail with `Rejected`
    pub fn set_reject(&self, reject: bool) {
        self.record.reject.store(reject, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.record
            .published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn subscribed(&self) -> Vec<IssuedSubscription> {
        self.record
            .subscribed
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn start_count(&self) -> usize {
        self.record.start_count.load(Ordering::SeqCst)
    }

    /// Config the factory was called with
    pub fn config(&self) -> Option<SessionConfig> {
        self.record.config.lock().ok().and_then(|c| c.clone())
    }

    pub fn clear_history(&self) {
        if let Ok(mut published) = self.record.published.lock() {
            published.clear();
        }
        if let Ok(mut subscribed) = self.record.subscribed.lock() {
            subscribed.clear();
        }
    }

    /// Deliver a session event the way the real client's worker would
    pub async fn emit(&self, event: SessionEvent) {
        let sender = self.record.events.lock().ok().and_then(|s| s.clone());
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    fn next_id(&self) -> MessageId {
        MessageId(self.record.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn check_reject(&self) -> Result<(), ClientError> {
        if self.record.reject.load(Ordering::SeqCst) {
            return Err(ClientError::Rejected("mock rejection".into()));
        }
        Ok(())
    }
}

impl SessionClient for MockSessionClient {
    fn start(&self) -> Result<(), ClientError> {
        if self.record.start_count.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(ClientError::AlreadyRunning);
        }
        Ok(())
    }

    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: Qos,
        retain: bool,
    ) -> Result<MessageId, ClientError> {
        self.check_reject()?;
        let id = self.next_id();
        let message = OutboundMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
            retain,
        };
        if let Ok(mut published) = self.record.published.lock() {
            published.push((id, message));
        }
        Ok(id)
    }

    fn subscribe(&self, topic: &str, qos: Qos) -> Result<MessageId, ClientError> {
        self.check_reject()?;
        let id = self.next_id();
        if let Ok(mut subscribed) = self.record.subscribed.lock() {
            subscribed.push((id, Subscription::new(topic, qos)));
        }
        Ok(id)
    }
}

#[derive(Debug, Default)]
struct FactoryRecord {
    init_count: AtomicUsize,
    fail_init: AtomicBool,
    client: Mutex<Option<MockSessionClient>>,
}

/// Factory handing out [`MockSessionClient`]s; clones share the record
#[derive(Debug, Clone, Default)]
pub struct MockSessionFactory {
    record: Arc<FactoryRecord>,
}

impl MockSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_init(&self, fail: bool) {
        self.record.fail_init.store(fail, Ordering::SeqCst);
    }

    /// Successful `init` calls
    pub fn init_count(&self) -> usize {
        self.record.init_count.load(Ordering::SeqCst)
    }

    /// The most recently created client
    pub fn client(&self) -> Option<MockSessionClient> {
        self.record.client.lock().ok().and_then(|c| c.clone())
    }
}

impl SessionFactory for MockSessionFactory {
    type Client = MockSessionClient;

    fn init(
        &self,
        config: SessionConfig,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Self::Client, ClientError> {
        if self.record.fail_init.load(Ordering::SeqCst) {
            return Err(ClientError::InvalidBrokerAddress(config.broker_url));
        }

        self.record.init_count.fetch_add(1, Ordering::SeqCst);
        let client = MockSessionClient::with_events(config, events);
        if let Ok(mut slot) = self.record.client.lock() {
            *slot = Some(client.clone());
        }
        Ok(client)
    }
}

#[derive(Debug, Default)]
struct DriverRecord {
    connect_count: AtomicUsize,
    fail: AtomicBool,
}

/// Link driver that counts connect requests
#[derive(Debug, Clone, Default)]
pub struct MockLinkDriver {
    record: Arc<DriverRecord>,
}

impl MockLinkDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.record.fail.store(fail, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.record.connect_count.load(Ordering::SeqCst)
    }
}

impl LinkDriver for MockLinkDriver {
    fn connect(&self) -> Result<(), LinkError> {
        self.record.connect_count.fetch_add(1, Ordering::SeqCst);
        if self.record.fail.load(Ordering::SeqCst) {
            return Err(LinkError::Rejected("mock driver failure".to_string()));
        }
        Ok(())
    }
}
