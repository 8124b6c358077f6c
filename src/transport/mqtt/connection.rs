//! Pure connection configuration for the rumqttc session client
//!
//! Builds `MqttOptions` from a [`SessionConfig`] and holds the client's own
//! retry pacing. Nothing here touches the network.

use crate::session::{ClientError, SessionConfig};
use rumqttc::v5::mqttbytes::v5::LastWill;
use rumqttc::v5::{mqttbytes::QoS, MqttOptions};
use rumqttc::Transport as RumqttcTransport;
use url::Url;

/// Payload of the retained last-will published by the broker on abrupt loss
pub const OFFLINE_PAYLOAD: &str = "offline";

/// Retry pacing applied by the event-loop pump between failed polls
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Backoff pattern in milliseconds
    pub backoff_pattern: Vec<u64>,
    /// Delay used once the pattern is exhausted; retries never stop
    pub sustained_delay: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            backoff_pattern: vec![250, 500, 1000, 2500, 5000],
            sustained_delay: 10_000,
        }
    }
}

impl ReconnectConfig {
    /// Backoff delay for the given attempt (1-based)
    pub fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        let index = attempt.saturating_sub(1) as usize;
        self.backoff_pattern
            .get(index)
            .copied()
            .unwrap_or(self.sustained_delay)
    }
}

/// Broker host, port and whether TLS is required
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

/// Parse an `mqtt://` or `mqtts://` URL (pure function)
pub fn parse_broker_url(broker_url: &str) -> Result<BrokerEndpoint, ClientError> {
    let url = Url::parse(broker_url)
        .map_err(|_| ClientError::InvalidBrokerAddress(broker_url.to_string()))?;

    let secure = match url.scheme() {
        "mqtts" => true,
        "mqtt" => false,
        _ => return Err(ClientError::InvalidBrokerAddress(broker_url.to_string())),
    };
    let host = url
        .host_str()
        .ok_or_else(|| ClientError::InvalidBrokerAddress(broker_url.to_string()))?;
    let port = url.port().unwrap_or(if secure { 8883 } else { 1883 });

    Ok(BrokerEndpoint {
        host: host.to_string(),
        port,
        secure,
    })
}

pub fn to_rumqttc_qos(qos: crate::protocol::Qos) -> QoS {
    match qos {
        crate::protocol::Qos::AtMostOnce => QoS::AtMostOnce,
        crate::protocol::Qos::AtLeastOnce => QoS::AtLeastOnce,
        crate::protocol::Qos::ExactlyOnce => QoS::ExactlyOnce,
    }
}

/// Pure function to configure MQTT options from the session config
pub fn configure_mqtt_options(config: &SessionConfig) -> Result<MqttOptions, ClientError> {
    let endpoint = parse_broker_url(&config.broker_url)?;
    let mut mqtt_options = MqttOptions::new(
        config.credential.client_id(),
        endpoint.host.as_str(),
        endpoint.port,
    );

    // The broker is authenticated against the configured trust anchors only
    if endpoint.secure {
        let trust = config
            .trust
            .as_ref()
            .ok_or_else(|| ClientError::MissingTrustAnchor(config.broker_url.clone()))?;
        mqtt_options.set_transport(RumqttcTransport::tls(trust.pem_bundle().to_vec(), None, None));
    }

    if let Some(username) = config.credential.username() {
        let password = config.credential.password().unwrap_or_default();
        mqtt_options.set_credentials(username, password);
    }

    mqtt_options.set_keep_alive(config.keep_alive);
    // No persistent broker-side session; subscriptions are re-issued on connect
    mqtt_options.set_clean_start(true);

    if let Some(status_topic) = &config.last_will_topic {
        let lwt = LastWill::new(status_topic, OFFLINE_PAYLOAD, QoS::AtLeastOnce, true, None);
        mqtt_options.set_last_will(lwt);
    }

    Ok(mqtt_options)
}
