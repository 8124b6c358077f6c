//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.
//! We test observable outcomes, not implementation details of TOML parsing.

use mqtt_uplink::config::{ConfigError, DeviceConfig, PayloadKind};
use mqtt_uplink::protocol::Qos;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

const TEST_CA_PEM: &str = "-----BEGIN CERTIFICATE-----
MIIDkTCCAnmgAwIBAgIUKw3sgVcES4OLkbkhyG206ANOswgwDQYJKoZIhvcNAQEL
BQAwWDELMAkGA1UEBhMCVVMxDjAMBgNVBAgMBVN0YXRlMQ0wCwYDVQQHDARDaXR5
MRQwEgYDVQQKDAtNb3NxdWl0dG9DQTEUMBIGA1UEAwwLTW9zcXVpdHRvQ0EwHhcN
MjUxMjExMDcxNzU2WhcNMzUxMjA5MDcxNzU2WjBYMQswCQYDVQQGEwJVUzEOMAwG
A1UECAwFU3RhdGUxDTALBgNVBAcMBENpdHkxFDASBgNVBAoMC01vc3F1aXR0b0NB
MRQwEgYDVQQDDAtNb3NxdWl0dG9DQTCCASIwDQYJKoZIhvcNAQEBBQADggEPADCC
AQoCggEBAM97R4exgK025wnkkBJu1NIBuC5UypVSwN3rRBHv8NOZtDZ+QEhHqZUm
j1M6F54Wzt0FVVnwmYXinJf7odd9GYfNkiHjEbu/IW1Ct4b4DGUHLC5QRC9au866
JGTrCTQop63UTEee6eCt+3L3UuuBIokyTjwkZSrMLAORJjVl353Mm+xdoaazcYOi
bbWONlPdkNKb+uc3x1xD058BFa13/jfN4djpC6aebniyyxYTTB3GbZ+296Lq6+Hc
ZPqvOKpTtsWqrkPrmBIQ7eQTl4BiDe+Hagm7F7f4/Jme+LBDOIAhoxvfd5uSPNdJ
j1HkVB+xUK1+CYCeNc/OcQhcYUsUqjMCAwEAAaNTMFEwHQYDVR0OBBYEFIDaIqb1
+ryYNG4dd8M9dhNrRKVaMB8GA1UdIwQYMBaAFIDaIqb1+ryYNG4dd8M9dhNrRKVa
MA8GA1UdEwEB/wQFMAMBAf8wDQYJKoZIhvcNAQELBQADggEBALAAZaP5Tz10LRLI
sPSC2BzV0RxtNDICWc6pYmzXO2mcEI6in1Ylt4mE7rM0IEDP9QJP3Se/DGiD/1LZ
tKgWTPxwmwVHrA5k+mm50INt0+IiABKsPfh42EqOQcjxZ8hh8lSU8j+jubSLXECe
QDJwlJBUULLAGwcSz2V6M1V4X/i4uSyzF3fPJ0tX2tFNuZHoCPQntwiAi8GtVA7O
pO81CUDpJb2E4t9vXbZt/YUG6QFb7FjHhVoNuH6yIYiPL+thbI/sEdWEP9ltECeh
DopbSsXEQkF3iVfOW5Hd/+5HNLcNhfPRomVQy/bq7HdMpE5w16l8ZPBOjXcR1djV
1Xrw9q0=
-----END CERTIFICATE-----
";

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[device]
hardware_address = "24:6F:28:AA:BB:CC"

[broker]
url = "mqtt://192.168.19.50:1883"
status_topic = "deme25/8/esp32s3/status"

[[subscriptions]]
topic = "deme25/8/esp32s3/commands"
qos = 1

[periodic]
topic = "deme25/8/esp32s3/sensor/temperature"
interval_secs = 10
"#,
    );

    let config = DeviceConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.broker.url, "mqtt://192.168.19.50:1883");
    assert_eq!(config.subscriptions.len(), 1);
    assert_eq!(config.subscriptions[0].qos, Qos::AtLeastOnce);
    assert_eq!(config.periodic_interval(), Duration::from_secs(10));
    assert_eq!(config.periodic.payload, PayloadKind::Counter);
    assert_eq!(
        config.broker.status_topic.as_deref(),
        Some("deme25/8/esp32s3/status")
    );
    assert_eq!(config.credential().unwrap().client_id(), "ESP32S3_AABBCC");
}

#[test]
fn test_secure_broker_loads_trust_anchor_from_file() {
    let mut ca_file = NamedTempFile::new().unwrap();
    ca_file.write_all(TEST_CA_PEM.as_bytes()).unwrap();

    let temp_file = write_config(&format!(
        r#"
[device]
hardware_address = "24:6F:28:AA:BB:CC"

[broker]
url = "mqtts://test.mosquitto.org:8883"
ca_cert_path = "{}"

[periodic]
topic = "test/esp32"
"#,
        ca_file.path().display()
    ));

    let config = DeviceConfig::load_from_file(temp_file.path()).unwrap();
    let store = config.trust_store().unwrap().unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn test_missing_ca_file_is_reported() {
    let temp_file = write_config(
        r#"
[broker]
url = "mqtts://test.mosquitto.org:8883"
ca_cert_path = "/nonexistent/ca.pem"

[periodic]
topic = "test/esp32"
"#,
    );

    let config = DeviceConfig::load_from_file(temp_file.path()).unwrap();
    assert!(config.trust_store().is_err());
}

#[test]
fn test_config_file_not_found() {
    let result = DeviceConfig::load_from_file(Path::new("/nonexistent/uplink.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_config_rejects_malformed_toml() {
    let temp_file = write_config("[broker\nurl = ");
    let result = DeviceConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_requires_broker_and_periodic_sections() {
    let temp_file = write_config(
        r#"
[broker]
url = "mqtt://localhost:1883"
"#,
    );
    let result = DeviceConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_rejects_invalid_hardware_address() {
    let temp_file = write_config(
        r#"
[device]
hardware_address = "not-a-mac"

[broker]
url = "mqtt://localhost:1883"

[periodic]
topic = "test/esp32"
"#,
    );
    let result = DeviceConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidIdentity(_))));
}

#[test]
fn test_hardware_id_falls_back_to_machine_id_file() {
    let mut machine_id = NamedTempFile::new().unwrap();
    writeln!(machine_id, "0123456789abcdef0123456789abcdef").unwrap();

    let temp_file = write_config(&format!(
        r#"
[device]
machine_id_path = "{}"

[broker]
url = "mqtt://localhost:1883"

[periodic]
topic = "test/esp32"
"#,
        machine_id.path().display()
    ));

    let config = DeviceConfig::load_from_file(temp_file.path()).unwrap();
    assert_eq!(config.credential().unwrap().client_id(), "ESP32S3_ABCDEF");
}

#[test]
fn test_config_round_trips_through_show() {
    let temp_file = write_config(
        r#"
[broker]
url = "mqtt://localhost:1883"

[[subscriptions]]
topic = "cmd/#"

[periodic]
topic = "test/esp32"
payload = "temperature"
"#,
    );
    let config = DeviceConfig::load_from_file(temp_file.path()).unwrap();

    let shown = toml::to_string_pretty(&config).unwrap();
    let reparsed = DeviceConfig::from_toml(&shown).unwrap();
    assert_eq!(reparsed, config);
}

#[test]
fn test_echo_topic_covered_by_subscription_is_rejected() {
    let temp_file = write_config(
        r#"
[broker]
url = "mqtt://localhost:1883"

[[subscriptions]]
topic = "dev/#"

[periodic]
topic = "dev/sensor"

[echo]
topic = "dev/echo"
"#,
    );
    let result = DeviceConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_echo_topic_outside_subscriptions_is_accepted() {
    let temp_file = write_config(
        r#"
[broker]
url = "mqtt://localhost:1883"

[[subscriptions]]
topic = "dev/commands/+"

[periodic]
topic = "dev/sensor"

[echo]
topic = "dev/echo"
"#,
    );
    let config = DeviceConfig::load_from_file(temp_file.path()).unwrap();
    assert_eq!(config.echo.unwrap().topic, "dev/echo");
}

#[test]
fn test_shipped_config_loads_with_its_trust_anchor() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut config = DeviceConfig::load_from_file(&root.join("config/uplink.toml")).unwrap();
    let ca_path = config.broker.ca_cert_path.take().unwrap();
    config.broker.ca_cert_path = Some(root.join(ca_path));

    let store = config.trust_store().unwrap().unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(config.credential().unwrap().client_id(), "ESP32S3_AABBCC");
}
