//! Ordered registry of inbound topic handlers

use crate::protocol::{topic_matches, validate_topic_filter, TopicError};
use std::fmt;
use std::sync::Arc;

/// Callback invoked with `(topic, payload)` for a matching inbound message
pub type MessageCallback = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Handlers in registration order; one handler per exact pattern
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Vec<(String, MessageCallback)>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Re-registering a pattern replaces its handler and
    /// keeps the pattern's original position.
    pub fn register(&mut self, pattern: &str, callback: MessageCallback) -> Result<(), TopicError> {
        validate_topic_filter(pattern)?;

        match self.entries.iter_mut().find(|(p, _)| p == pattern) {
            Some(entry) => entry.1 = callback,
            None => self.entries.push((pattern.to_string(), callback)),
        }
        Ok(())
    }

    /// First pattern, in registration order, that matches the topic
    pub fn resolve(&self, topic: &str) -> Option<(&str, &MessageCallback)> {
        self.entries
            .iter()
            .find(|(pattern, _)| topic_matches(pattern, topic))
            .map(|(pattern, callback)| (pattern.as_str(), callback))
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(pattern, _)| pattern.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("patterns", &self.patterns().collect::<Vec<_>>())
            .finish()
    }
}
