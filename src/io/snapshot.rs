//! One-shot topology snapshot over HTTP
//!
//! Bootstraps the channel set: the gate list and the zone list with their
//! occupancy/capacity. No retry lives here - on failure the controller
//! renders the empty state and recovery is a full remount.

use crate::domain::types::{Gate, ZoneOccupancy};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot endpoint {path} returned {status}")]
    Status { path: &'static str, status: StatusCode },
    #[error("snapshot transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Point-in-time topology fetched at activation
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub gates: Vec<Gate>,
    pub zones: Vec<ZoneOccupancy>,
}

#[derive(Debug, Deserialize)]
struct ChannelsBody {
    channels: Vec<Gate>,
}

/// HTTP client for the snapshot endpoints
pub struct SnapshotClient {
    http: reqwest::Client,
    base_url: String,
}

impl SnapshotClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SnapshotError> {
        // Create HTTP client once for reuse (connection pooling)
        let http = reqwest::Client::builder().timeout(timeout).http1_only().build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    /// Fetch gates and zones in one go. Either request failing fails the load.
    pub async fn load(&self) -> Result<Snapshot, SnapshotError> {
        let channels: ChannelsBody = self.fetch_json("/snapshot-channels").await?;
        let zones: Vec<ZoneOccupancy> = self.fetch_json("/snapshot-zones").await?;

        info!(
            gates = %channels.channels.len(),
            zones = %zones.len(),
            "snapshot_loaded"
        );

        Ok(Snapshot { gates: channels.channels, zones })
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &'static str) -> Result<T, SnapshotError> {
        let url = self.endpoint(path);
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SnapshotError::Status { path, status });
        }

        Ok(response.json().await?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
