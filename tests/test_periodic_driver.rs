//! Periodic driver tests
//!
//! A tick publishes a fresh payload only while the session is ready; ticks
//! that find it not ready are skipped and never replayed.


use mqtt_uplink::periodic::{CounterPayload, PeriodicPublisher, TemperatureSimulator, TickOutcome};
use mqtt_uplink::protocol::Qos;
use mqtt_uplink::session::SessionEvent;
use mqtt_uplink::state::SessionState;
use std::time::Duration;
use test_helpers::{bring_up, mock_orchestrator, test_settings};
use tokio::sync::watch;

const TOPIC: &str = "deme25/8/esp32s3/sensor/temperature";

#[tokio::test]
async fn test_tick_skips_until_ready_then_publishes() {
    let (mut orchestrator, factory, _driver) = mock_orchestrator(test_settings());
    let mut publisher = PeriodicPublisher::new(
        orchestrator.bridge(),
        TOPIC,
        Qos::AtLeastOnce,
        Duration::from_secs(10),
        Box::new(CounterPayload::new("ESP32S3_AABBCC")),
    );

    assert!(matches!(
        publisher.tick(),
        TickOutcome::Skipped(SessionState::Idle)
    ));

    let client = bring_up(&mut orchestrator, &factory).await;
    client.clear_history();

    assert!(matches!(publisher.tick(), TickOutcome::Published(_)));
    let published = client.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].1.topic, TOPIC);
    // Skipped ticks do not advance the counter
    assert_eq!(published[0].1.payload, b"Message #1 from ESP32S3_AABBCC");
}

#[tokio::test]
async fn test_skipped_ticks_are_not_replayed_after_reconnect() {
    let (mut orchestrator, factory, _driver) = mock_orchestrator(test_settings());
    let client = bring_up(&mut orchestrator, &factory).await;
    let mut publisher = PeriodicPublisher::new(
        orchestrator.bridge(),
        TOPIC,
        Qos::AtMostOnce,
        Duration::from_secs(10),
        Box::new(CounterPayload::new("dev")),
    );

    client.emit(SessionEvent::Disconnected).await;
    orchestrator.process_pending_session_events().await;
    client.clear_history();

    for _ in 0..3 {
        assert!(matches!(
            publisher.tick(),
            TickOutcome::Skipped(SessionState::Connecting)
        ));
    }

    client.emit(SessionEvent::Connected).await;
    orchestrator.process_pending_session_events().await;
    client.clear_history();

    publisher.tick();
    let published = client.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].1.payload, b"Message #1 from dev");
}

#[tokio::test]
async fn test_rejected_publish_is_reported_as_failure() {
    let (mut orchestrator, factory, _driver) = mock_orchestrator(test_settings());
    let client = bring_up(&mut orchestrator, &factory).await;
    client.set_reject(true);

    let mut publisher = PeriodicPublisher::new(
        orchestrator.bridge(),
        TOPIC,
        Qos::AtLeastOnce,
        Duration::from_secs(10),
        Box::new(TemperatureSimulator::seeded("ESP32-S3", 3)),
    );

    assert!(matches!(publisher.tick(), TickOutcome::Failed(_)));
}

#[tokio::test(start_paused = true)]
async fn test_run_publishes_each_interval_until_shutdown() {
    let (mut orchestrator, factory, _driver) = mock_orchestrator(test_settings());
    let client = bring_up(&mut orchestrator, &factory).await;
    client.clear_history();

    let publisher = PeriodicPublisher::new(
        orchestrator.bridge(),
        TOPIC,
        Qos::AtLeastOnce,
        Duration::from_secs(10),
        Box::new(TemperatureSimulator::seeded("ESP32-S3", 11)),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(publisher.run(shutdown_rx));

    // First tick fires immediately, then one every 10s
    tokio::time::sleep(Duration::from_secs(25)).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();

    let published = client.published();
    assert_eq!(published.len(), 3);
    let reading: serde_json::Value = serde_json::from_slice(&published[2].1.payload).unwrap();
    assert_eq!(reading["count"], 3);
}
