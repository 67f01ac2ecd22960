//! Live event stream over MQTT
//!
//! Owns exactly one logical subscription to the server's event feed for the
//! lifetime of a dashboard view. Events are delivered in transport arrival
//! order into a bounded channel; there is no cross-gate ordering guarantee,
//! but order within one gate's events matches delivery order.
//!
//! Reconnection is bounded: after the policy's attempts are exhausted the
//! connection settles into `Disconnected` and the task exits - a new `open`
//! call is required. No gap-filling or deduplication is attempted after a
//! reconnect.

use crate::domain::types::{AccessEvent, ConnectionState, OccupancyUpdate};
use crate::infra::metrics::Metrics;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Stream transport settings, built from the application config
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Topic carrying `AccessEvent` payloads
    pub access_topic: String,
    /// Topic carrying `OccupancyUpdate` payloads
    pub occupancy_topic: String,
    /// Client id prefix; a v7 UUID suffix keeps concurrent consoles apart
    pub client_id_prefix: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: None,
            password: None,
            access_topic: "facility/access_log".to_string(),
            occupancy_topic: "facility/occupancy".to_string(),
            client_id_prefix: "access-console".to_string(),
        }
    }
}

/// Bounded reconnection policy: a fixed delay between attempts, then give up.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, delay: Duration::from_secs(1) }
    }
}

impl ReconnectPolicy {
    /// Whether another attempt may follow the given count of consecutive failures
    pub fn should_retry(&self, consecutive_failures: u32) -> bool {
        consecutive_failures < self.max_attempts
    }
}

/// A single parsed message from the feed
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Access(AccessEvent),
    Occupancy(OccupancyUpdate),
}

/// Handle to an open stream subscription.
///
/// The owning view must close it on every exit path - the handle is the
/// only way delivery stops.
pub struct StreamHandle {
    shutdown_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Current transport state
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch receiver for transport state changes
    pub fn state_rx(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Tear down the subscription.
    ///
    /// After this returns no further event reaches the delivery channel:
    /// the stream task is the only sender and it is stopped here.
    pub fn close(self) {
        let _ = self.shutdown_tx.send(true);
        self.task.abort();
        info!("stream_closed");
    }
}

/// Open the stream. Non-blocking: connecting happens on the spawned task.
///
/// Parsed events are pushed into `event_tx` via `try_send` so a stalled
/// consumer never blocks the transport; overflow is counted and dropped.
pub fn open(
    config: StreamConfig,
    policy: ReconnectPolicy,
    event_tx: mpsc::Sender<StreamEvent>,
    metrics: Arc<Metrics>,
) -> StreamHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

    let task = tokio::spawn(run_stream(config, policy, event_tx, metrics, shutdown_rx, state_tx));

    StreamHandle { shutdown_tx, state_rx, task }
}

async fn run_stream(
    config: StreamConfig,
    policy: ReconnectPolicy,
    event_tx: mpsc::Sender<StreamEvent>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
    state_tx: watch::Sender<ConnectionState>,
) {
    let client_id = format!("{}-{}", config.client_id_prefix, Uuid::now_v7().simple());
    let mut mqttoptions = MqttOptions::new(client_id, &config.host, config.port);
    mqttoptions.set_keep_alive(Duration::from_secs(30));
    mqttoptions.set_clean_session(true);

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        mqttoptions.set_credentials(username, password);
    }

    let (client, mut eventloop) = AsyncClient::new(mqttoptions, 100);

    // Rate-limit drop warnings to 1 per second
    let mut last_drop_warn = Instant::now() - Duration::from_secs(2);
    let mut consecutive_failures: u32 = 0;

    loop {
        tokio::select! {
            // Check for shutdown signal
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("stream_shutdown");
                    return;
                }
            }
            // Process transport events
            result = eventloop.poll() => {
                match result {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        consecutive_failures = 0;
                        let _ = state_tx.send(ConnectionState::Connected);
                        // Clean sessions carry no filters across connects;
                        // resubscribe on every ConnAck.
                        for topic in [&config.access_topic, &config.occupancy_topic] {
                            if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                                warn!(topic = %topic, error = %e, "stream_subscribe_failed");
                            }
                        }
                        info!(
                            host = %config.host,
                            port = %config.port,
                            access_topic = %config.access_topic,
                            occupancy_topic = %config.occupancy_topic,
                            "stream_connected"
                        );
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        metrics.record_stream_event_received();

                        let Some(event) = parse_stream_event(&publish.topic, &publish.payload, &config) else {
                            continue;
                        };

                        if let Err(e) = event_tx.try_send(event) {
                            match e {
                                TrySendError::Full(_) => {
                                    metrics.record_stream_event_dropped();
                                    if last_drop_warn.elapsed() > Duration::from_secs(1) {
                                        warn!("stream_event_dropped: channel full");
                                        last_drop_warn = Instant::now();
                                    }
                                }
                                TrySendError::Closed(_) => {
                                    warn!("stream event channel closed");
                                    return;
                                }
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        consecutive_failures += 1;
                        if policy.should_retry(consecutive_failures) {
                            metrics.record_stream_reconnect();
                            let _ = state_tx.send(ConnectionState::Connecting);
                            warn!(
                                error = %e,
                                attempt = %consecutive_failures,
                                max_attempts = %policy.max_attempts,
                                "stream_error_reconnecting"
                            );
                            tokio::time::sleep(policy.delay).await;
                        } else {
                            let _ = state_tx.send(ConnectionState::Disconnected);
                            error!(
                                error = %e,
                                attempts = %consecutive_failures,
                                "stream_reconnect_exhausted"
                            );
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Parse one published message into a stream event by topic.
///
/// Malformed payloads and unrecognized topics are logged and skipped -
/// the feed must never take the console down.
fn parse_stream_event(topic: &str, payload: &[u8], config: &StreamConfig) -> Option<StreamEvent> {
    if topic == config.access_topic {
        match serde_json::from_slice::<AccessEvent>(payload) {
            Ok(event) => Some(StreamEvent::Access(event)),
            Err(e) => {
                debug!(error = %e, "invalid access_log payload");
                None
            }
        }
    } else if topic == config.occupancy_topic {
        match serde_json::from_slice::<OccupancyUpdate>(payload) {
            Ok(update) => Some(StreamEvent::Occupancy(update)),
            Err(e) => {
                debug!(error = %e, "invalid occupancy payload");
                None
            }
        }
    } else {
        debug!(topic = %topic, "message on unexpected topic");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{AccessOutcome, GateId, ZoneId};

    #[test]
    fn test_parse_access_event() {
        let config = StreamConfig::default();
        let payload = br#"{
            "time": "2026-01-05T16:41:30.048+00:00",
            "gate_id": 2,
            "gate_name": "South",
            "user_name": "Ada Varga",
            "role": "Visitor",
            "credential": "LPR:XK-4411",
            "status": "DENIED",
            "reason": "NO_ACTIVE_RULE",
            "is_entry": false
        }"#;

        let event = parse_stream_event("facility/access_log", payload, &config);
        let Some(StreamEvent::Access(event)) = event else {
            panic!("expected access event");
        };
        assert_eq!(event.gate_id, GateId(2));
        assert_eq!(event.status, AccessOutcome::Denied);
        assert_eq!(event.credential.tag, "LPR");
    }

    #[test]
    fn test_parse_occupancy_update() {
        let config = StreamConfig::default();
        let payload = br#"{"zone_id": 4, "zone_name": "P2", "current": 31, "capacity": 60}"#;

        let event = parse_stream_event("facility/occupancy", payload, &config);
        let Some(StreamEvent::Occupancy(update)) = event else {
            panic!("expected occupancy update");
        };
        assert_eq!(update.zone_id, ZoneId(4));
        assert_eq!(update.current, 31);
    }

    #[test]
    fn test_parse_rejects_garbage_and_foreign_topics() {
        let config = StreamConfig::default();
        assert!(parse_stream_event("facility/access_log", b"not json", &config).is_none());
        assert!(parse_stream_event("facility/other", b"{}", &config).is_none());
    }

    #[test]
    fn test_reconnect_policy_is_bounded() {
        // Five failed attempts are tolerated; the fifth exhausts the policy
        // and no further attempt may follow.
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, Duration::from_secs(1));

        for failures in 1..5 {
            assert!(policy.should_retry(failures), "attempt {failures} should retry");
        }
        assert!(!policy.should_retry(5));
        assert!(!policy.should_retry(6));
    }

    #[tokio::test]
    async fn test_close_stops_delivery() {
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let handle = open(
            StreamConfig { host: "127.0.0.1".into(), port: 1, ..Default::default() },
            ReconnectPolicy { max_attempts: 1, delay: Duration::from_millis(10) },
            event_tx,
            Arc::new(Metrics::new()),
        );

        handle.close();
        // The task was the only sender; the channel must now be closed.
        assert!(event_rx.recv().await.is_none());
    }
}
