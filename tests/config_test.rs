//! Integration tests for configuration loading

use access_console::infra::Config;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[console]
id = "lobby-console"

[api]
base_url = "http://backend.internal:8600"
control_url = "http://operator:pw@backend.internal:8600"
timeout_ms = 3000

[stream]
host = "broker.internal"
port = 1884
access_topic = "site/access_log"
occupancy_topic = "site/occupancy"

[reconnect]
max_attempts = 3
delay_ms = 2000

[ui]
tick_ms = 250
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.console_id(), "lobby-console");
    assert_eq!(config.api_base_url(), "http://backend.internal:8600");
    assert_eq!(config.control_url(), "http://operator:pw@backend.internal:8600");
    assert_eq!(config.api_timeout_ms(), 3000);
    assert_eq!(config.stream_host(), "broker.internal");
    assert_eq!(config.stream_port(), 1884);
    assert_eq!(config.access_topic(), "site/access_log");
    assert_eq!(config.reconnect_max_attempts(), 3);
    assert_eq!(config.reconnect_delay_ms(), 2000);
    assert_eq!(config.ui_tick_ms(), 250);
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.stream_host(), "localhost");
    assert_eq!(config.stream_port(), 1883);
    assert_eq!(config.api_base_url(), "http://127.0.0.1:8600");
    assert_eq!(config.reconnect_max_attempts(), 5);
}

#[test]
fn test_stream_config_and_policy_derived_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(
            br#"
[console]
id = "dock-console"

[stream]
host = "10.0.0.7"

[reconnect]
max_attempts = 2
delay_ms = 500
"#,
        )
        .unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    let stream = config.stream_config();
    assert_eq!(stream.host, "10.0.0.7");
    assert_eq!(stream.client_id_prefix, "dock-console");
    assert_eq!(stream.access_topic, "facility/access_log");

    let policy = config.reconnect_policy();
    assert_eq!(policy.max_attempts, 2);
    assert_eq!(policy.delay, Duration::from_millis(500));
}
