//! Mock facility backend for local demos
//!
//! Simulates the parts of the backend the console talks to:
//! 1. Embedded MQTT broker (rumqttd) carrying the event stream
//! 2. HTTP server for the snapshot and control endpoints (hyper)
//! 3. Deterministic scripted generator publishing `access_log` and
//!    `occupancy_update` payloads
//!
//! Usage:
//!   cargo run --bin mock-backend -- --http-port 8600 --broker-port 1883

use access_console::domain::types::{
    AccessEvent, AccessOutcome, Connectivity, Credential, Gate, GateDirection, GateId,
    OccupancyUpdate, ZoneId, ZoneOccupancy,
};
use access_console::infra::broker::start_embedded_broker;
use bytes::Bytes;
use clap::Parser;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const ACCESS_TOPIC: &str = "facility/access_log";
const OCCUPANCY_TOPIC: &str = "facility/occupancy";

/// Mock facility backend - broker, REST endpoints, and a scripted feed
#[derive(Parser, Debug)]
#[command(name = "mock-backend", version, about)]
struct Args {
    /// HTTP port for the snapshot and control endpoints
    #[arg(long, default_value = "8600")]
    http_port: u16,

    /// Embedded MQTT broker port
    #[arg(long, default_value = "1883")]
    broker_port: u16,

    /// Interval between generated access events (ms)
    #[arg(long, default_value = "1500")]
    event_interval_ms: u64,

    /// Deny every Nth event (0 disables denials)
    #[arg(long, default_value = "3")]
    deny_every: u64,
}

fn seed_gates() -> Vec<Gate> {
    vec![
        Gate {
            id: GateId(1),
            name: "North Entry".to_string(),
            direction: GateDirection::Entry,
            connectivity: Connectivity::Online,
        },
        Gate {
            id: GateId(2),
            name: "South Exit".to_string(),
            direction: GateDirection::Exit,
            connectivity: Connectivity::Online,
        },
        Gate {
            id: GateId(3),
            name: "Dock Entry".to_string(),
            direction: GateDirection::Entry,
            connectivity: Connectivity::Offline,
        },
    ]
}

fn seed_zones() -> Vec<ZoneOccupancy> {
    vec![
        ZoneOccupancy {
            id: ZoneId(1),
            name: "Main Complex".to_string(),
            capacity: 120,
            occupancy: 37,
            parent_id: None,
        },
        ZoneOccupancy {
            id: ZoneId(2),
            name: "P1".to_string(),
            capacity: 60,
            occupancy: 12,
            parent_id: Some(ZoneId(1)),
        },
        ZoneOccupancy {
            id: ZoneId(3),
            name: "P2".to_string(),
            capacity: 40,
            occupancy: 38,
            parent_id: Some(ZoneId(1)),
        },
    ]
}

const USERS: [(&str, &str); 5] = [
    ("Jo Berg", "Staff"),
    ("Ada Varga", "Visitor"),
    ("Mikkel Holt", "Contractor"),
    ("Rin Okada", "Staff"),
    ("Sam Piper", "Security"),
];

const CREDENTIAL_TAGS: [&str; 3] = ["RFID", "QR", "LPR"];

const DENIAL_REASONS: [&str; 4] =
    ["EXPIRED", "UNKNOWN_CREDENTIAL", "ANTI_PASSBACK", "CAPACITY_FULL"];

/// Build the nth scripted access event. Deterministic - no RNG, so demo
/// runs are reproducible.
fn scripted_event(n: u64, gates: &[Gate], deny_every: u64) -> AccessEvent {
    let gate = &gates[(n as usize) % gates.len()];
    let (user, role) = USERS[(n as usize) % USERS.len()];
    let tag = CREDENTIAL_TAGS[(n as usize) % CREDENTIAL_TAGS.len()];

    let denied = deny_every > 0 && n % deny_every == 0;
    let (status, reason) = if denied {
        (AccessOutcome::Denied, Some(DENIAL_REASONS[(n as usize) % DENIAL_REASONS.len()].to_string()))
    } else {
        (AccessOutcome::Allowed, Some("ACCESS_GRANTED".to_string()))
    };

    let time = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string());

    AccessEvent {
        time,
        gate_id: gate.id,
        gate_name: gate.name.clone(),
        user_name: user.to_string(),
        role: role.to_string(),
        credential: Credential { tag: tag.to_string(), value: format!("0x{:04X}", 0xA000 + n) },
        status,
        reason,
        is_entry: gate.direction == GateDirection::Entry,
    }
}

/// Drift one zone's occupancy for the nth event and return the update.
///
/// Lets occupancy wander past capacity now and then so the console's
/// clamped gauge is visible in demos.
fn drift_occupancy(n: u64, zones: &Mutex<Vec<ZoneOccupancy>>) -> Option<OccupancyUpdate> {
    let mut zones = zones.lock();
    if zones.is_empty() {
        return None;
    }

    let len = zones.len();
    let index = 1 + (n as usize) % (len.saturating_sub(1).max(1));
    let zone = zones.get_mut(index.min(len - 1))?;

    let delta = if n % 3 == 0 { -1 } else { 1 };
    zone.occupancy = (zone.occupancy + delta).clamp(0, zone.capacity + 3);

    Some(OccupancyUpdate {
        zone_id: zone.id,
        zone_name: zone.name.clone(),
        current: zone.occupancy,
        capacity: zone.capacity,
    })
}

async fn run_generator(
    broker_port: u16,
    event_interval_ms: u64,
    deny_every: u64,
    gates: Arc<Vec<Gate>>,
    zones: Arc<Mutex<Vec<ZoneOccupancy>>>,
) {
    let client_id = format!("mock-backend-{}", std::process::id());
    let mut mqttoptions = MqttOptions::new(client_id, "127.0.0.1", broker_port);
    mqttoptions.set_keep_alive(Duration::from_secs(30));

    let (client, mut eventloop) = AsyncClient::new(mqttoptions, 100);

    // Drive the MQTT event loop in the background
    tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                warn!(error = %e, "mock_publisher_mqtt_error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    });

    let mut interval = tokio::time::interval(Duration::from_millis(event_interval_ms));
    let mut n: u64 = 0;

    loop {
        interval.tick().await;
        n += 1;

        let event = scripted_event(n, &gates, deny_every);
        match serde_json::to_vec(&event) {
            Ok(payload) => {
                info!(
                    gate_id = %event.gate_id,
                    user = %event.user_name,
                    status = %event.status.as_str(),
                    "publish_access_event"
                );
                if let Err(e) = client.publish(ACCESS_TOPIC, QoS::AtMostOnce, false, payload).await
                {
                    warn!(error = %e, "publish_access_event_failed");
                }
            }
            Err(e) => warn!(error = %e, "encode_access_event_failed"),
        }

        // Every other event also moves a zone count
        if n % 2 == 0 {
            if let Some(update) = drift_occupancy(n, &zones) {
                if let Ok(payload) = serde_json::to_vec(&update) {
                    if let Err(e) =
                        client.publish(OCCUPANCY_TOPIC, QoS::AtMostOnce, false, payload).await
                    {
                        warn!(error = %e, "publish_occupancy_failed");
                    }
                }
            }
        }
    }
}

fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .expect("static response should not fail")
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    gates: Arc<Vec<Gate>>,
    zones: Arc<Mutex<Vec<ZoneOccupancy>>>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();

    match (req.method(), path.as_str()) {
        (&Method::GET, "/snapshot-channels") => {
            let body = serde_json::json!({ "channels": &*gates }).to_string();
            Ok(json_response(StatusCode::OK, body))
        }
        (&Method::GET, "/snapshot-zones") => {
            let body = serde_json::to_string(&*zones.lock()).unwrap_or_else(|_| "[]".to_string());
            Ok(json_response(StatusCode::OK, body))
        }
        (&Method::GET, "/health") => {
            Ok(json_response(StatusCode::OK, r#"{"status":"healthy"}"#.to_string()))
        }
        (&Method::POST, path) if path.starts_with("/control/") => {
            match path.trim_start_matches("/control/").parse::<i64>() {
                Ok(gate_id) if gates.iter().any(|g| g.id == GateId(gate_id)) => {
                    info!(gate_id = %gate_id, "manual_open_received");
                    Ok(json_response(StatusCode::OK, r#"{"ok":true}"#.to_string()))
                }
                Ok(gate_id) => {
                    warn!(gate_id = %gate_id, "manual_open_unknown_gate");
                    Ok(json_response(
                        StatusCode::NOT_FOUND,
                        r#"{"ok":false,"error":"unknown_gate"}"#.to_string(),
                    ))
                }
                Err(_) => Ok(json_response(
                    StatusCode::BAD_REQUEST,
                    r#"{"ok":false,"error":"bad_gate_id"}"#.to_string(),
                )),
            }
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .expect("static response should not fail")),
    }
}

async fn run_http_server(
    port: u16,
    gates: Arc<Vec<Gate>>,
    zones: Arc<Mutex<Vec<ZoneOccupancy>>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(port = %port, "mock_http_server_started");

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let io = TokioIo::new(stream);
                let gates = gates.clone();
                let zones = zones.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let gates = gates.clone();
                        let zones = zones.clone();
                        async move { handle_request(req, gates, zones).await }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        error!(error = %e, "mock_http_error");
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "mock_accept_error");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();

    start_embedded_broker("0.0.0.0", args.broker_port);

    let gates = Arc::new(seed_gates());
    let zones = Arc::new(Mutex::new(seed_zones()));

    let generator_gates = gates.clone();
    let generator_zones = zones.clone();
    tokio::spawn(run_generator(
        args.broker_port,
        args.event_interval_ms,
        args.deny_every,
        generator_gates,
        generator_zones,
    ));

    let http_gates = gates.clone();
    let http_zones = zones.clone();
    tokio::spawn(async move {
        if let Err(e) = run_http_server(args.http_port, http_gates, http_zones).await {
            error!(error = %e, "mock_http_server_error");
        }
    });

    info!(
        http_port = %args.http_port,
        broker_port = %args.broker_port,
        event_interval_ms = %args.event_interval_ms,
        "mock-backend running, Ctrl+C to stop"
    );

    tokio::signal::ctrl_c().await.ok();
    info!("mock-backend shutdown");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_events_are_deterministic_and_round_robin() {
        let gates = seed_gates();
        let a = scripted_event(7, &gates, 3);
        let b = scripted_event(7, &gates, 3);
        assert_eq!(a.gate_id, b.gate_id);
        assert_eq!(a.user_name, b.user_name);

        // Consecutive events rotate through the gates
        let ids: Vec<i64> = (1..=3).map(|n| scripted_event(n, &gates, 0).gate_id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_denial_cadence() {
        let gates = seed_gates();
        assert!(scripted_event(3, &gates, 3).status.is_denied());
        assert!(!scripted_event(4, &gates, 3).status.is_denied());
        assert!(!scripted_event(5, &gates, 0).status.is_denied());
    }

    #[test]
    fn test_occupancy_drift_stays_in_bounds() {
        let zones = Mutex::new(seed_zones());
        for n in 1..200 {
            if let Some(update) = drift_occupancy(n, &zones) {
                let capacity = update.capacity;
                assert!(update.current >= 0);
                assert!(update.current <= capacity + 3);
            }
        }
    }
}
