//! Shared types for the access console

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Newtype wrapper for gate IDs to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct GateId(pub i64);

impl std::fmt::Display for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for zone IDs to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ZoneId(pub i64);

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Traffic direction of a gate, fixed for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateDirection {
    Entry,
    Exit,
}

impl GateDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateDirection::Entry => "entry",
            GateDirection::Exit => "exit",
        }
    }
}

/// Hardware reachability as reported by the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connectivity::Online => "online",
            Connectivity::Offline => "offline",
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Connectivity::Online)
    }
}

/// A physical gate - the channel key for live events and per-gate logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    pub id: GateId,
    pub name: String,
    pub direction: GateDirection,
    pub connectivity: Connectivity,
}

/// Access decision outcome as carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessOutcome {
    #[serde(rename = "ALLOWED")]
    Allowed,
    #[serde(rename = "DENIED")]
    Denied,
}

impl AccessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessOutcome::Allowed => "ALLOWED",
            AccessOutcome::Denied => "DENIED",
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AccessOutcome::Denied)
    }
}

/// Credential presented at a gate: a typed tag plus an opaque value.
///
/// The wire carries a single string like `RFID:0xAB12`; the tag is whatever
/// precedes the first colon. Payloads without a colon keep the raw value
/// under the `RAW` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub tag: String,
    pub value: String,
}

impl Credential {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((tag, value)) => Self { tag: tag.to_string(), value: value.to_string() },
            None => Self { tag: "RAW".to_string(), value: raw.to_string() },
        }
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tag, self.value)
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Credential::parse(&raw))
    }
}

impl Serialize for Credential {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Live access event pushed by the server.
///
/// Immutable once received. Ordering key is arrival order, not `time` -
/// the server clock is not trusted for ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEvent {
    /// Server-side wall clock, RFC 3339. Display only.
    pub time: String,
    pub gate_id: GateId,
    #[serde(default)]
    pub gate_name: String,
    pub user_name: String,
    #[serde(default)]
    pub role: String,
    pub credential: Credential,
    pub status: AccessOutcome,
    /// Raw reason field; meaningful only when `status` is DENIED.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub is_entry: bool,
}

impl AccessEvent {
    /// Denial reason, present iff the outcome is DENIED.
    ///
    /// The feed carries an informational reason on ALLOWED events too
    /// (e.g. "ACCESS_GRANTED"); it is suppressed here.
    pub fn denial_reason(&self) -> Option<&str> {
        if self.status.is_denied() {
            self.reason.as_deref()
        } else {
            None
        }
    }

    /// Event timestamp as epoch milliseconds, 0 if unparseable.
    pub fn time_ms(&self) -> u64 {
        parse_rfc3339_ms(&self.time).unwrap_or(0)
    }
}

/// Parse an RFC 3339 timestamp to epoch milliseconds
pub fn parse_rfc3339_ms(time_str: &str) -> Option<u64> {
    OffsetDateTime::parse(time_str, &Rfc3339)
        .ok()
        .map(|dt| (dt.unix_timestamp_nanos() / 1_000_000) as u64)
}

/// Zone occupancy as carried by the snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneOccupancy {
    pub id: ZoneId,
    pub name: String,
    /// Non-negative; 0 means the zone has no meaningful fill ratio
    pub capacity: i64,
    /// May transiently exceed capacity
    pub occupancy: i64,
    #[serde(default)]
    pub parent_id: Option<ZoneId>,
}

/// Live zone occupancy change pushed by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancyUpdate {
    pub zone_id: ZoneId,
    #[serde(default)]
    pub zone_name: String,
    pub current: i64,
    pub capacity: i64,
}

/// Transport-level connection state. Only the stream task mutates this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}
