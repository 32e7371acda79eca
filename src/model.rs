//! Core data types for the reconciled link graph.
//!
//! Every fact the import pipeline derives from a transcript ends up as one of
//! these records: devices, interfaces, aggregation groups ("trunks"), raw
//! neighbor observations, reconciled links, ledger entries, and anomalies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Seconds since the UNIX epoch.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// A switch known to the graph. Created on first reference, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub mgmt_ip: Option<String>,
    pub vendor: Option<String>,
    pub model: Option<String>,
    /// Timestamp of first insertion (seconds since UNIX epoch).
    pub created_at: u64,
}

impl Device {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mgmt_ip: None,
            vendor: None,
            model: None,
            created_at: now_secs(),
        }
    }

    pub fn with_mgmt_ip(mut self, ip: impl Into<String>) -> Self {
        self.mgmt_ip = Some(ip.into());
        self
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Administrative or operational state of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    Up,
    Down,
}

impl PortStatus {
    /// Parse an `up`/`down` token, ignoring case.
    pub fn parse(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("up") {
            Some(Self::Up)
        } else if token.eq_ignore_ascii_case("down") {
            Some(Self::Down)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A port on a device, unique per (device, canonical name).
///
/// Optional attributes left as `None` in an upsert keep whatever value the
/// store already holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub device: String,
    pub name: String,
    pub description: Option<String>,
    pub admin_status: Option<PortStatus>,
    pub oper_status: Option<PortStatus>,
}

impl Interface {
    pub fn new(device: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            name: name.into(),
            description: None,
            admin_status: None,
            oper_status: None,
        }
    }
}

/// A link-aggregation group, unique per (device, canonical name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trunk {
    pub device: String,
    pub name: String,
    /// Working mode as printed by the device (`NORMAL`, `LACP`, ...).
    pub mode: Option<String>,
    pub oper_status: Option<PortStatus>,
}

/// One discovery-protocol row, kept verbatim. Never deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborObservation {
    /// Store-assigned sequence number (0 until appended).
    pub seq: u64,
    pub device: String,
    pub local_interface: String,
    /// Reported neighbor system name; `-` and empty are kept as-is.
    pub neighbor_device: String,
    pub neighbor_interface: Option<String>,
    /// Expiry timer in seconds, `None` when the column did not parse.
    pub expiry: Option<u32>,
    /// Identifier of the transcript the row came from.
    pub source: String,
    pub observed_at: u64,
}

/// Kind of a reconciled link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Physical,
    Aggregated,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Physical => "physical",
            Self::Aggregated => "aggregated",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trust label attached to a reconciled link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Trusted,
    Suspect,
    Ignore,
}

impl Confidence {
    pub const ALL: [Confidence; 3] = [Self::Trusted, Self::Suspect, Self::Ignore];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trusted => "trusted",
            Self::Suspect => "suspect",
            Self::Ignore => "ignore",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a confidence label is not one of the three tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownConfidence(pub String);

impl fmt::Display for UnknownConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown confidence \"{}\" (expected trusted, suspect or ignore)",
            self.0
        )
    }
}

impl std::error::Error for UnknownConfidence {}

impl FromStr for Confidence {
    type Err = UnknownConfidence;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trusted" => Ok(Self::Trusted),
            "suspect" => Ok(Self::Suspect),
            "ignore" => Ok(Self::Ignore),
            _ => Err(UnknownConfidence(s.to_string())),
        }
    }
}

/// Natural key of a reconciled link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkKey {
    pub src_device: String,
    pub src_interface: String,
    pub dst_device: String,
    pub dst_interface: String,
}

impl LinkKey {
    pub fn new(
        src_device: impl Into<String>,
        src_interface: impl Into<String>,
        dst_device: impl Into<String>,
        dst_interface: impl Into<String>,
    ) -> Self {
        Self {
            src_device: src_device.into(),
            src_interface: src_interface.into(),
            dst_device: dst_device.into(),
            dst_interface: dst_interface.into(),
        }
    }

    /// Whether either endpoint is `device`.
    pub fn touches(&self, device: &str) -> bool {
        self.src_device == device || self.dst_device == device
    }

    /// The endpoint on the other side of `device`.
    pub fn peer_of(&self, device: &str) -> &str {
        if self.src_device == device {
            &self.dst_device
        } else {
            &self.src_device
        }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {} {}",
            self.src_device, self.src_interface, self.dst_device, self.dst_interface
        )
    }
}

/// A reconciled edge of the link graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Store-assigned insertion sequence (0 until first upsert).
    pub id: u64,
    pub key: LinkKey,
    pub link_type: LinkType,
    pub confidence: Confidence,
    pub notes: Option<String>,
}

impl Link {
    /// A trusted link of the given type without notes.
    pub fn new(key: LinkKey, link_type: LinkType) -> Self {
        Self {
            id: 0,
            key,
            link_type,
            confidence: Confidence::Trusted,
            notes: None,
        }
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Ledger entry: one per distinct transcript byte content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    /// Hex SHA-256 of the raw transcript bytes.
    pub hash: String,
    pub device: String,
    pub source: String,
    pub imported_at: u64,
}

/// How bad an anomaly is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown severity \"{other}\"")),
        }
    }
}

/// The condition an anomaly reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// One local port sees more than one neighbor device.
    SuspectLoop,
    /// Most neighbor rows carry an empty or placeholder system name.
    SuspectMixedLink,
    /// Members of one trunk lead to different neighbor devices.
    TrunkInconsistent,
    /// Expiry timers for one neighbor vary too much across observations.
    UnstableNeighbor,
    /// Spanning tree keeps ports in a blocking/discarding state.
    StpBlocked,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuspectLoop => "suspect_loop",
            Self::SuspectMixedLink => "suspect_mixed_link",
            Self::TrunkInconsistent => "trunk_inconsistent",
            Self::UnstableNeighbor => "unstable_neighbor",
            Self::StpBlocked => "stp_blocked",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A derived fact about a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Store-assigned sequence number (0 until appended).
    pub seq: u64,
    pub device: String,
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub detail: serde_json::Value,
    pub created_at: u64,
}

impl Anomaly {
    pub fn new(
        device: impl Into<String>,
        kind: AnomalyKind,
        severity: Severity,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            seq: 0,
            device: device.into(),
            kind,
            severity,
            detail,
            created_at: now_secs(),
        }
    }
}
