//! Dashboard controller - composition root and command path
//!
//! Owns the whole live view lifecycle: snapshot load, per-gate log setup,
//! stream subscription, event fan-out into shared view state, and the
//! manual override path. The controller is an explicit, disposable object
//! owned by the view - nothing here is a process-wide singleton.

use crate::domain::types::{ConnectionState, Gate, GateId};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::control::ControlClient;
use crate::io::snapshot::SnapshotClient;
use crate::io::stream::{self, StreamEvent, StreamHandle};
use crate::services::occupancy::ZoneBoard;
use crate::services::router::EventRouter;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// User-visible alerts kept in view state
const MAX_ALERTS: usize = 5;

/// Capacity of the stream-to-pump event channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Lifecycle of the dashboard view as a whole.
///
/// `Empty` and `Stale` are terminal: nothing leaves them automatically,
/// recovery is a fresh `activate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewPhase {
    #[default]
    Init,
    /// Snapshot failed; no stream was ever opened
    Empty,
    Streaming,
    Reconnecting,
    /// Reconnect attempts exhausted
    Stale,
}

impl ViewPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewPhase::Init => "init",
            ViewPhase::Empty => "empty",
            ViewPhase::Streaming => "streaming",
            ViewPhase::Reconnecting => "reconnecting",
            ViewPhase::Stale => "stale",
        }
    }

    /// Next phase for a transport state change. Terminal phases stick.
    pub fn on_connection_change(self, connection: ConnectionState) -> ViewPhase {
        match self {
            ViewPhase::Empty | ViewPhase::Stale => self,
            _ => match connection {
                ConnectionState::Connected => ViewPhase::Streaming,
                ConnectionState::Connecting => ViewPhase::Reconnecting,
                ConnectionState::Disconnected => ViewPhase::Stale,
            },
        }
    }
}

/// Everything a renderer needs, behind one lock.
///
/// Only the pump task mutates this; renderers take short read locks.
#[derive(Debug, Default)]
pub struct DashboardState {
    pub phase: ViewPhase,
    pub connection: ConnectionState,
    /// Gates from the snapshot, id-ordered for stable rendering
    pub gates: Vec<Gate>,
    pub router: EventRouter,
    pub zones: ZoneBoard,
    /// Newest-first user-visible alerts (command failures)
    pub alerts: VecDeque<String>,
}

impl DashboardState {
    pub fn push_alert(&mut self, message: String) {
        self.alerts.push_front(message);
        while self.alerts.len() > MAX_ALERTS {
            self.alerts.pop_back();
        }
    }
}

pub type SharedState = Arc<Mutex<DashboardState>>;

/// The live dashboard context: snapshot + stream + logs + command path.
pub struct Dashboard {
    state: SharedState,
    control: Arc<ControlClient>,
    stream: Option<StreamHandle>,
    pump: Option<JoinHandle<()>>,
    metrics: Arc<Metrics>,
}

impl Dashboard {
    /// Activate the view: load the snapshot, then open the stream.
    ///
    /// On snapshot failure the dashboard settles in the `Empty` phase and
    /// the stream is never opened; recovery is a fresh `activate`.
    pub async fn activate(config: &Config, metrics: Arc<Metrics>) -> anyhow::Result<Self> {
        let timeout = Duration::from_millis(config.api_timeout_ms());
        let snapshot_client = SnapshotClient::new(config.api_base_url(), timeout)?;
        let control = Arc::new(ControlClient::new(config.control_url(), timeout)?);

        let state: SharedState = Arc::new(Mutex::new(DashboardState::default()));

        let snapshot = match snapshot_client.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "snapshot_load_failed");
                state.lock().phase = ViewPhase::Empty;
                return Ok(Self { state, control, stream: None, pump: None, metrics });
            }
        };

        {
            let mut s = state.lock();
            s.router = EventRouter::with_gates(snapshot.gates.iter().map(|g| g.id));
            s.zones = ZoneBoard::from_snapshot(snapshot.zones);
            let mut gates = snapshot.gates;
            gates.sort_by_key(|g| g.id);
            s.gates = gates;
            s.phase = ViewPhase::Streaming;
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let handle =
            stream::open(config.stream_config(), config.reconnect_policy(), event_tx, metrics.clone());
        let connection_rx = handle.state_rx();

        let pump = tokio::spawn(run_pump(state.clone(), event_rx, connection_rx, metrics.clone()));

        info!("dashboard_activated");
        Ok(Self { state, control, stream: Some(handle), pump: Some(pump), metrics })
    }

    /// Shared view state for renderers
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn phase(&self) -> ViewPhase {
        self.state.lock().phase
    }

    pub fn connection(&self) -> ConnectionState {
        self.state.lock().connection
    }

    /// Issue a manual open command for one gate, fire-and-forget.
    ///
    /// Failure surfaces as a user-visible alert; it never touches the
    /// stream or the logs. Success is confirmed only by the access event
    /// the override eventually produces.
    pub fn send_open(&self, gate_id: GateId) {
        self.metrics.record_command_sent();
        let control = self.control.clone();
        let state = self.state.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            if let Err(e) = control.open_gate(gate_id).await {
                metrics.record_command_failed();
                state.lock().push_alert(format!("gate {} open failed: {}", gate_id, e));
            }
        });
    }

    /// Deactivate the view. Must run on every exit path.
    ///
    /// Closes the stream before stopping the pump so no late event can be
    /// delivered to a disposed consumer.
    pub fn close(mut self) {
        if let Some(handle) = self.stream.take() {
            handle.close();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        info!("dashboard_closed");
    }
}

/// Apply one stream event to the view state.
///
/// Runs only on the pump task; every event updates exactly one log or one
/// zone entry.
fn apply_stream_event(state: &SharedState, event: StreamEvent, metrics: &Metrics) {
    match event {
        StreamEvent::Access(event) => {
            info!(
                gate_id = %event.gate_id,
                gate = %event.gate_name,
                user = %event.user_name,
                status = %event.status.as_str(),
                reason = ?event.denial_reason(),
                "access_event"
            );
            let mut s = state.lock();
            if !s.router.contains(event.gate_id) {
                metrics.record_unknown_gate_event();
            }
            s.router.route(event);
            metrics.record_event_routed();
        }
        StreamEvent::Occupancy(update) => {
            metrics.record_occupancy_update();
            state.lock().zones.apply(update);
        }
    }
}

/// Consume stream events and connection changes into the shared state
async fn run_pump(
    state: SharedState,
    mut event_rx: mpsc::Receiver<StreamEvent>,
    mut connection_rx: watch::Receiver<ConnectionState>,
    metrics: Arc<Metrics>,
) {
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                match event {
                    Some(event) => apply_stream_event(&state, event, &metrics),
                    None => break,
                }
            }
            changed = connection_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let connection = *connection_rx.borrow_and_update();
                let mut s = state.lock();
                s.connection = connection;
                let next = s.phase.on_connection_change(connection);
                if next != s.phase {
                    info!(from = %s.phase.as_str(), to = %next.as_str(), "view_phase_changed");
                    s.phase = next;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{AccessEvent, AccessOutcome, Credential, OccupancyUpdate, ZoneId};

    fn access(gate_id: i64, user: &str, status: AccessOutcome, reason: Option<&str>) -> StreamEvent {
        StreamEvent::Access(AccessEvent {
            time: "2026-01-05T16:41:30.048+00:00".to_string(),
            gate_id: GateId(gate_id),
            gate_name: format!("Gate {}", gate_id),
            user_name: user.to_string(),
            role: "Staff".to_string(),
            credential: Credential::parse("RFID:0xAB12"),
            status,
            reason: reason.map(String::from),
            is_entry: true,
        })
    }

    fn fresh_state(gate_ids: &[i64]) -> SharedState {
        let mut inner = DashboardState::default();
        inner.router = EventRouter::with_gates(gate_ids.iter().map(|&id| GateId(id)));
        inner.phase = ViewPhase::Streaming;
        Arc::new(Mutex::new(inner))
    }

    #[test]
    fn test_phase_follows_connection() {
        assert_eq!(
            ViewPhase::Streaming.on_connection_change(ConnectionState::Connecting),
            ViewPhase::Reconnecting
        );
        assert_eq!(
            ViewPhase::Reconnecting.on_connection_change(ConnectionState::Connected),
            ViewPhase::Streaming
        );
        assert_eq!(
            ViewPhase::Reconnecting.on_connection_change(ConnectionState::Disconnected),
            ViewPhase::Stale
        );
    }

    #[test]
    fn test_terminal_phases_stick() {
        // Nothing leaves STALE or EMPTY automatically; a remount is required.
        for connection in
            [ConnectionState::Connecting, ConnectionState::Connected, ConnectionState::Disconnected]
        {
            assert_eq!(ViewPhase::Stale.on_connection_change(connection), ViewPhase::Stale);
            assert_eq!(ViewPhase::Empty.on_connection_change(connection), ViewPhase::Empty);
        }
    }

    #[test]
    fn test_events_fan_out_into_per_gate_logs() {
        let state = fresh_state(&[1, 2]);
        let metrics = Metrics::new();

        apply_stream_event(&state, access(1, "a", AccessOutcome::Allowed, None), &metrics);
        apply_stream_event(&state, access(2, "b", AccessOutcome::Denied, Some("EXPIRED")), &metrics);
        apply_stream_event(&state, access(1, "c", AccessOutcome::Denied, Some("DUPLICATE")), &metrics);

        let s = state.lock();
        let north = s.router.snapshot(GateId(1));
        assert_eq!(north.len(), 2);
        assert_eq!(north[0].denial_reason(), Some("DUPLICATE"));
        assert_eq!(north[1].status, AccessOutcome::Allowed);
        assert_eq!(s.router.snapshot(GateId(2)).len(), 1);
        assert_eq!(metrics.report().events_routed, 3);
        assert_eq!(metrics.report().unknown_gate_events, 0);
    }

    #[test]
    fn test_unknown_gate_event_is_routed_and_counted() {
        let state = fresh_state(&[1]);
        let metrics = Metrics::new();

        apply_stream_event(&state, access(9, "late", AccessOutcome::Allowed, None), &metrics);

        let s = state.lock();
        assert_eq!(s.router.snapshot(GateId(9)).len(), 1);
        assert_eq!(metrics.report().unknown_gate_events, 1);
    }

    #[test]
    fn test_occupancy_update_reaches_zone_board() {
        let state = fresh_state(&[]);
        let metrics = Metrics::new();

        apply_stream_event(
            &state,
            StreamEvent::Occupancy(OccupancyUpdate {
                zone_id: ZoneId(3),
                zone_name: "P1".into(),
                current: 8,
                capacity: 16,
            }),
            &metrics,
        );

        assert_eq!(state.lock().zones.ratio_for(ZoneId(3)), 0.5);
    }

    #[test]
    fn test_alerts_are_bounded() {
        let mut state = DashboardState::default();
        for n in 0..12 {
            state.push_alert(format!("alert {}", n));
        }
        assert_eq!(state.alerts.len(), MAX_ALERTS);
        assert_eq!(state.alerts.front().unwrap(), "alert 11");
    }

    #[tokio::test]
    async fn test_failed_snapshot_means_empty_view_and_no_stream() {
        // Nothing listens on port 9; the snapshot fetch fails fast.
        let config = Config::from_toml_str(
            r#"
            [api]
            base_url = "http://127.0.0.1:9"
            timeout_ms = 500
            "#,
        )
        .unwrap();

        let dashboard = Dashboard::activate(&config, Arc::new(Metrics::new())).await.unwrap();

        assert_eq!(dashboard.phase(), ViewPhase::Empty);
        assert!(dashboard.stream.is_none(), "stream must never open without a snapshot");
        // Connection state never left its initial value.
        assert_eq!(dashboard.connection(), ConnectionState::Connecting);
        dashboard.close();
    }
}
