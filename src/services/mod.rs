//! Services - live view state and composition
//!
//! This module contains the core state management services:
//! - `event_log` - fixed-capacity, newest-first event buffer
//! - `router` - per-gate event fan-out
//! - `occupancy` - zone fill state and the gauge ratio
//! - `controller` - dashboard composition root and command path

pub mod controller;
pub mod event_log;
pub mod occupancy;
pub mod router;

// Re-export commonly used types
pub use controller::{Dashboard, DashboardState, SharedState, ViewPhase};
pub use event_log::{EventLog, GATE_LOG_CAPACITY};
pub use occupancy::{fill_ratio, ZoneBoard};
pub use router::EventRouter;
