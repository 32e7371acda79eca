//! Storage contract for the link graph.
//!
//! The import engine, the anomaly rules and the exporter only talk to the
//! graph through [`GraphReader`] and [`GraphWriter`]. [`TopoStore`] is the
//! bundled implementation on top of redb: a [`ReadSession`] is an MVCC
//! snapshot, a [`WriteSession`] is one ACID transaction that is rolled back
//! unless explicitly committed.

pub mod durable;

use crate::error::StoreResult;
use crate::model::{
    Anomaly, AnomalyKind, Confidence, Device, ImportRecord, Interface, Link, LinkKey,
    NeighborObservation, Severity, Trunk,
};

pub use durable::{ReadSession, TopoStore, WriteSession};

/// Read access to the graph.
pub trait GraphReader {
    fn device(&self, name: &str) -> StoreResult<Option<Device>>;

    /// All devices, ordered by name.
    fn devices(&self) -> StoreResult<Vec<Device>>;

    fn interface(&self, device: &str, name: &str) -> StoreResult<Option<Interface>>;

    /// Interfaces of one device, ordered by name.
    fn interfaces(&self, device: &str) -> StoreResult<Vec<Interface>>;

    fn trunk(&self, device: &str, name: &str) -> StoreResult<Option<Trunk>>;

    /// Aggregation groups of one device, ordered by name.
    fn trunks(&self, device: &str) -> StoreResult<Vec<Trunk>>;

    /// Member interface names of one group, ordered by name.
    fn trunk_members(&self, device: &str, trunk: &str) -> StoreResult<Vec<String>>;

    /// Every neighbor observation recorded for `device`, oldest first.
    fn observations(&self, device: &str) -> StoreResult<Vec<NeighborObservation>>;

    fn link(&self, key: &LinkKey) -> StoreResult<Option<Link>>;

    /// All links in insertion order.
    fn links(&self) -> StoreResult<Vec<Link>>;

    /// Links with `device` at either end, in insertion order.
    fn links_touching(&self, device: &str) -> StoreResult<Vec<Link>> {
        Ok(self
            .links()?
            .into_iter()
            .filter(|l| l.key.touches(device))
            .collect())
    }

    fn import_record(&self, hash: &str) -> StoreResult<Option<ImportRecord>>;

    /// Ledger entries, newest first.
    fn imports(&self) -> StoreResult<Vec<ImportRecord>>;

    /// Anomalies, newest first, optionally narrowed by device and severity.
    fn anomalies(
        &self,
        device: Option<&str>,
        severity: Option<Severity>,
    ) -> StoreResult<Vec<Anomaly>>;
}

/// Write access to the graph.
///
/// Upserts of devices, interfaces and trunks coalesce: an attribute that is
/// `None` in the new value keeps whatever is stored. Every upsert returns the
/// row as stored afterwards.
pub trait GraphWriter: GraphReader {
    fn upsert_device(&mut self, device: &Device) -> StoreResult<Device>;

    fn upsert_interface(&mut self, interface: &Interface) -> StoreResult<Interface>;

    fn upsert_trunk(&mut self, trunk: &Trunk) -> StoreResult<Trunk>;

    /// Add `member` to a group. Returns `false` if it was already a member.
    ///
    /// Fails with `NotFound` when the group does not exist.
    fn add_trunk_member(&mut self, device: &str, trunk: &str, member: &str) -> StoreResult<bool>;

    /// Append an observation; returns its sequence number.
    fn append_observation(&mut self, observation: NeighborObservation) -> StoreResult<u64>;

    /// Insert or update a link by its natural key.
    ///
    /// Type and confidence are overwritten, notes are only replaced when the
    /// new link carries some. A new link gets the next insertion id.
    fn upsert_link(&mut self, link: &Link) -> StoreResult<Link>;

    /// Change the confidence of an existing link.
    ///
    /// Fails with `NotFound` when no link has this key.
    fn set_link_confidence(&mut self, key: &LinkKey, confidence: Confidence)
    -> StoreResult<Link>;

    /// Write a ledger entry. Fails with `DuplicateKey` if the hash is already
    /// recorded, unless `overwrite` is set.
    fn record_import(&mut self, record: &ImportRecord, overwrite: bool) -> StoreResult<()>;

    /// Append an anomaly; returns its sequence number.
    fn append_anomaly(&mut self, anomaly: Anomaly) -> StoreResult<u64>;

    /// Delete the anomalies of one kind for one device. Returns how many
    /// were removed.
    fn retire_anomalies(&mut self, device: &str, kind: AnomalyKind) -> StoreResult<usize>;
}
