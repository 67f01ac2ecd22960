//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `snapshot` - one-shot topology fetch over HTTP
//! - `stream` - live event subscription over MQTT
//! - `control` - manual gate override commands over HTTP

pub mod control;
pub mod snapshot;
pub mod stream;

// Re-export commonly used types
pub use control::{CommandError, ControlClient};
pub use snapshot::{Snapshot, SnapshotClient, SnapshotError};
pub use stream::{ReconnectPolicy, StreamConfig, StreamEvent, StreamHandle};
