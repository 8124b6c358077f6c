//! Command echo handler
//!
//! Answers every inbound command with `Received: <payload>` on a fixed topic.

use crate::dispatch::DispatchBridge;
use crate::protocol::{Qos, Subscription, TopicError};
use crate::session::SessionClient;
use tracing::{info, warn};

pub fn echo_reply(payload: &[u8]) -> Vec<u8> {
    format!("Received: {}", String::from_utf8_lossy(payload)).into_bytes()
}

/// Register the echo handler on each declared subscription filter
pub async fn register_echo_handlers<C: SessionClient>(
    bridge: &DispatchBridge<C>,
    subscriptions: &[Subscription],
    echo_topic: &str,
) -> Result<(), TopicError> {
    for subscription in subscriptions {
        let publisher = bridge.clone();
        let reply_topic = echo_topic.to_string();

        bridge
            .register_handler(&subscription.topic, move |topic, payload| {
                info!(
                    topic = %topic,
                    payload = %String::from_utf8_lossy(payload),
                    "Command received"
                );
                if let Err(e) =
                    publisher.publish(&reply_topic, &echo_reply(payload), Qos::AtLeastOnce, false)
                {
                    warn!(topic = %reply_topic, error = %e, "Failed to echo command");
                }
            })
            .await?;
    }
    Ok(())
}
