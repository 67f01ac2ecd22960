//! Zone occupancy state and the fill-ratio gauge
//!
//! Zones come from the snapshot and are refreshed by live occupancy updates.
//! The displayed ratio is always recomputed from the stored numbers -
//! nothing here caches a percentage.

use crate::domain::types::{OccupancyUpdate, ZoneId, ZoneOccupancy};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Bounded display ratio for a zone gauge.
///
/// `clamp(occupancy / capacity, 0, 1)` when capacity is positive, else 0.
/// Never divides by zero, never yields NaN or infinity.
pub fn fill_ratio(occupancy: i64, capacity: i64) -> f64 {
    if capacity <= 0 {
        return 0.0;
    }
    (occupancy as f64 / capacity as f64).clamp(0.0, 1.0)
}

/// Latest known occupancy per zone
#[derive(Debug, Default)]
pub struct ZoneBoard {
    zones: FxHashMap<ZoneId, ZoneOccupancy>,
}

impl ZoneBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(zones: Vec<ZoneOccupancy>) -> Self {
        let mut board = Self::new();
        for zone in zones {
            board.zones.insert(zone.id, zone);
        }
        board
    }

    /// Apply a live occupancy change.
    ///
    /// Updates for zones the snapshot never mentioned are inserted on
    /// demand - topology lag must not drop data.
    pub fn apply(&mut self, update: OccupancyUpdate) {
        match self.zones.get_mut(&update.zone_id) {
            Some(zone) => {
                zone.occupancy = update.current;
                zone.capacity = update.capacity;
            }
            None => {
                debug!(zone_id = %update.zone_id, name = %update.zone_name, "occupancy_update_for_unknown_zone");
                self.zones.insert(
                    update.zone_id,
                    ZoneOccupancy {
                        id: update.zone_id,
                        name: update.zone_name,
                        capacity: update.capacity,
                        occupancy: update.current,
                        parent_id: None,
                    },
                );
            }
        }
    }

    pub fn get(&self, id: ZoneId) -> Option<&ZoneOccupancy> {
        self.zones.get(&id)
    }

    /// Fill ratio for one zone; 0 when the zone is unknown
    pub fn ratio_for(&self, id: ZoneId) -> f64 {
        self.zones.get(&id).map_or(0.0, |z| fill_ratio(z.occupancy, z.capacity))
    }

    /// Zones in stable id order, for rendering
    pub fn sorted(&self) -> Vec<&ZoneOccupancy> {
        let mut zones: Vec<&ZoneOccupancy> = self.zones.values().collect();
        zones.sort_by_key(|z| z.id);
        zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(id: i64, occupancy: i64, capacity: i64) -> ZoneOccupancy {
        ZoneOccupancy {
            id: ZoneId(id),
            name: format!("Z{}", id),
            capacity,
            occupancy,
            parent_id: None,
        }
    }

    #[test]
    fn test_zero_capacity_yields_zero() {
        assert_eq!(fill_ratio(17, 0), 0.0);
        assert_eq!(fill_ratio(0, 0), 0.0);
        assert!(fill_ratio(17, 0).is_finite());
    }

    #[test]
    fn test_overflow_clamps_to_one() {
        // Occupancy can transiently exceed capacity; the gauge pins at full.
        assert_eq!(fill_ratio(45, 40), 1.0);
        assert_eq!(fill_ratio(40, 40), 1.0);
    }

    #[test]
    fn test_negative_occupancy_clamps_to_zero() {
        assert_eq!(fill_ratio(-3, 40), 0.0);
    }

    #[test]
    fn test_ratio_in_range() {
        assert_eq!(fill_ratio(10, 40), 0.25);
        assert_eq!(fill_ratio(0, 40), 0.0);
    }

    #[test]
    fn test_apply_updates_known_zone() {
        let mut board = ZoneBoard::from_snapshot(vec![zone(1, 5, 40)]);
        board.apply(OccupancyUpdate {
            zone_id: ZoneId(1),
            zone_name: "Z1".into(),
            current: 12,
            capacity: 40,
        });
        assert_eq!(board.get(ZoneId(1)).unwrap().occupancy, 12);
        assert_eq!(board.ratio_for(ZoneId(1)), 0.3);
    }

    #[test]
    fn test_apply_inserts_unknown_zone() {
        let mut board = ZoneBoard::new();
        board.apply(OccupancyUpdate {
            zone_id: ZoneId(9),
            zone_name: "Annex".into(),
            current: 2,
            capacity: 10,
        });
        assert_eq!(board.len(), 1);
        assert_eq!(board.get(ZoneId(9)).unwrap().name, "Annex");
    }

    #[test]
    fn test_sorted_is_id_ordered() {
        let board = ZoneBoard::from_snapshot(vec![zone(3, 0, 10), zone(1, 0, 10), zone(2, 0, 10)]);
        let ids: Vec<i64> = board.sorted().iter().map(|z| z.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
