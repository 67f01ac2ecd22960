//! Domain models - core types shared across the console
//!
//! This module contains the canonical data types used throughout the system:
//! - `Gate` - a physical gate, the channel key for live events
//! - `AccessEvent` - a single access decision observed on the stream
//! - `ZoneOccupancy` / `OccupancyUpdate` - zone fill state and its live delta
//! - `ConnectionState` - transport-level state of the event stream

pub mod types;

pub use types::{
    AccessEvent, AccessOutcome, ConnectionState, Connectivity, Credential, Gate, GateDirection,
    GateId, OccupancyUpdate, ZoneId, ZoneOccupancy,
};
