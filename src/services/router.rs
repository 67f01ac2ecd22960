//! Per-gate event fan-out
//!
//! Demultiplexes inbound access events by gate id into per-gate bounded
//! logs. Routing is a pure, synchronous fan-out: one event always updates
//! exactly one log. Events for gates the snapshot never mentioned get an
//! ephemeral log on demand so topology lag never drops an event.

use crate::domain::types::{AccessEvent, GateId};
use crate::services::event_log::EventLog;
use rustc_hash::FxHashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct EventRouter {
    logs: FxHashMap<GateId, EventLog<AccessEvent>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed one empty log per known gate
    pub fn with_gates<I: IntoIterator<Item = GateId>>(gate_ids: I) -> Self {
        let mut router = Self::new();
        for id in gate_ids {
            router.logs.entry(id).or_default();
        }
        router
    }

    /// Append an event to the log of the gate it addresses.
    ///
    /// Never fails: an unknown gate id creates a log on the spot.
    pub fn route(&mut self, event: AccessEvent) {
        let log = self.logs.entry(event.gate_id).or_insert_with(|| {
            debug!(gate_id = %event.gate_id, gate_name = %event.gate_name, "event_for_unknown_gate");
            EventLog::new()
        });
        log.prepend(event);
    }

    pub fn log(&self, gate_id: GateId) -> Option<&EventLog<AccessEvent>> {
        self.logs.get(&gate_id)
    }

    /// Newest-first copy of one gate's log; empty when the gate is unknown
    pub fn snapshot(&self, gate_id: GateId) -> Vec<AccessEvent> {
        self.logs.get(&gate_id).map(EventLog::snapshot).unwrap_or_default()
    }

    pub fn gate_count(&self) -> usize {
        self.logs.len()
    }

    pub fn contains(&self, gate_id: GateId) -> bool {
        self.logs.contains_key(&gate_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{AccessOutcome, Credential};

    fn event(gate_id: i64, user: &str, status: AccessOutcome, reason: Option<&str>) -> AccessEvent {
        AccessEvent {
            time: "2026-01-05T16:41:30.048+00:00".to_string(),
            gate_id: GateId(gate_id),
            gate_name: format!("Gate {}", gate_id),
            user_name: user.to_string(),
            role: "Staff".to_string(),
            credential: Credential::parse("RFID:0xAB12"),
            status,
            reason: reason.map(String::from),
            is_entry: true,
        }
    }

    #[test]
    fn test_fan_out_preserves_per_gate_arrival_order() {
        // Interleaved events across gates land in their own logs, in order.
        let mut router = EventRouter::with_gates([GateId(1), GateId(2), GateId(3)]);
        for n in 0..30 {
            let gate = (n % 3) + 1;
            router.route(event(gate, &format!("user-{}", n), AccessOutcome::Allowed, None));
        }

        for gate in 1..=3i64 {
            let log = router.snapshot(GateId(gate));
            assert_eq!(log.len(), 10);
            // Newest first: user indices descend and all address this gate.
            let users: Vec<i64> =
                log.iter().map(|e| e.user_name.trim_start_matches("user-").parse().unwrap()).collect();
            for pair in users.windows(2) {
                assert!(pair[0] > pair[1]);
            }
            assert!(log.iter().all(|e| e.gate_id == GateId(gate)));
        }
    }

    #[test]
    fn test_two_gate_scenario() {
        // Snapshot knows North (1) and South (2); three events arrive.
        let mut router = EventRouter::with_gates([GateId(1), GateId(2)]);
        router.route(event(1, "a", AccessOutcome::Allowed, None));
        router.route(event(2, "b", AccessOutcome::Denied, Some("EXPIRED")));
        router.route(event(1, "c", AccessOutcome::Denied, Some("DUPLICATE")));

        let north = router.snapshot(GateId(1));
        assert_eq!(north.len(), 2);
        assert_eq!(north[0].denial_reason(), Some("DUPLICATE"));
        assert_eq!(north[1].status, AccessOutcome::Allowed);

        let south = router.snapshot(GateId(2));
        assert_eq!(south.len(), 1);
        assert_eq!(south[0].denial_reason(), Some("EXPIRED"));
    }

    #[test]
    fn test_unknown_gate_creates_log() {
        // A gate added after the snapshot was taken must not lose events.
        let mut router = EventRouter::with_gates([GateId(1)]);
        assert!(!router.contains(GateId(7)));

        router.route(event(7, "late", AccessOutcome::Allowed, None));
        assert!(router.contains(GateId(7)));
        assert_eq!(router.snapshot(GateId(7)).len(), 1);
        assert_eq!(router.gate_count(), 2);
    }

    #[test]
    fn test_preseeded_gates_start_empty() {
        let router = EventRouter::with_gates([GateId(1), GateId(2)]);
        assert_eq!(router.gate_count(), 2);
        assert!(router.log(GateId(1)).unwrap().is_empty());
        assert!(router.snapshot(GateId(9)).is_empty());
    }
}
