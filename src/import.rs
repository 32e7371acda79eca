//! Transcript import: one transcript in, one atomic batch of graph rows out.
//!
//! Orchestrates: size check → content hash → ledger lookup → decode →
//! segment → parse → upsert → ledger entry → commit, then optionally runs the
//! anomaly rules on the imported device.

use std::fmt;
use std::path::Path;

use crate::anomaly::{AnomalyDetector, AnomalySink, DetectorConfig};
use crate::error::{ImportError, ImportResult, StoreError, StoreResult};
use crate::model::{
    Anomaly, AnomalyKind, Device, ImportRecord, Interface, Link, LinkKey, LinkType,
    NeighborObservation, Severity, Trunk, now_secs,
};
use crate::parser::{iface, lldp, stp, trunk};
use crate::store::{GraphReader, GraphWriter, TopoStore};
use crate::transcript::{CommandBlock, DEFAULT_MAX_BYTES, TextEncoding, TranscriptSource, split_blocks};

/// Settings for one import.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Device name; derived from the source identifier when `None`.
    pub device: Option<String>,
    /// Re-import content whose hash is already in the ledger.
    pub force: bool,
    /// Size ceiling for the raw transcript.
    pub max_source_bytes: u64,
    /// Run the anomaly rules on the device after a successful import.
    pub detect: Option<DetectorConfig>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            device: None,
            force: false,
            max_source_bytes: DEFAULT_MAX_BYTES,
            detect: None,
        }
    }
}

impl ImportConfig {
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_max_source_bytes(mut self, limit: u64) -> Self {
        self.max_source_bytes = limit;
        self
    }

    pub fn with_detection(mut self, config: DetectorConfig) -> Self {
        self.detect = Some(config);
        self
    }
}

/// Whether an import did any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Imported,
    /// The content hash was already in the ledger.
    Skipped,
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Imported => "imported",
            Self::Skipped => "skipped",
        })
    }
}

/// Records derived from one transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounts {
    pub neighbors: usize,
    pub links: usize,
    pub trunks: usize,
    pub interfaces: usize,
    pub stp_blocked: usize,
}

/// Outcome of one import.
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub status: ImportStatus,
    pub device: String,
    /// Hex SHA-256 of the raw transcript.
    pub hash: String,
    pub source: String,
    /// Command blocks found (0 when skipped).
    pub blocks: usize,
    /// Encoding the text was decoded with (`None` when skipped).
    pub encoding: Option<TextEncoding>,
    pub counts: ImportCounts,
    /// Anomalies raised by the import itself and by the follow-up detection.
    pub anomalies: Vec<Anomaly>,
}

/// Import a transcript file.
pub fn import_file(store: &TopoStore, path: &Path, config: &ImportConfig) -> ImportResult<ImportReport> {
    let source = TranscriptSource::read(path, config.max_source_bytes)?;
    import_transcript(store, &source, config)
}

/// Import a transcript that is already in memory.
///
/// Everything the transcript yields, including its ledger entry, is written
/// in one transaction. On any storage error the transaction is rolled back
/// and nothing from this transcript is stored.
pub fn import_transcript(
    store: &TopoStore,
    source: &TranscriptSource,
    config: &ImportConfig,
) -> ImportResult<ImportReport> {
    source.check_size(config.max_source_bytes)?;
    let hash = source.content_hash();
    let failed = |e: StoreError| ImportError::TransactionFailed {
        origin: source.origin.clone(),
        source: e,
    };

    // Duplicate check before any parsing.
    let existing = store.read().and_then(|r| r.import_record(&hash)).map_err(failed)?;
    if let Some(existing) = &existing {
        if !config.force {
            tracing::warn!(
                source = %source.origin,
                hash = &hash[..16],
                "transcript already imported, skipping"
            );
            return Ok(ImportReport {
                status: ImportStatus::Skipped,
                device: existing.device.clone(),
                hash,
                source: source.origin.clone(),
                blocks: 0,
                encoding: None,
                counts: ImportCounts::default(),
                anomalies: Vec::new(),
            });
        }
        tracing::warn!(
            source = %source.origin,
            hash = &hash[..16],
            "transcript already imported, re-importing"
        );
    }

    let device = config
        .device
        .clone()
        .or_else(|| source.device_name())
        .ok_or_else(|| ImportError::NoDeviceName {
            origin: source.origin.clone(),
        })?;

    tracing::info!(source = %source.origin, device = %device, "importing transcript");
    let decoded = source.decode();
    let blocks = split_blocks(&decoded.text);
    tracing::info!(blocks = blocks.len(), encoding = %decoded.encoding, "segmented transcript");

    let record = ImportRecord {
        hash: hash.clone(),
        device: device.clone(),
        source: source.origin.clone(),
        imported_at: now_secs(),
    };
    let mut session = store.write().map_err(failed)?;
    let mut batch = Batch::new(&device, &source.origin);
    batch
        .stage(&mut session, &blocks, &record, existing.is_some())
        .map_err(failed)?;
    session.commit().map_err(failed)?;

    let counts = batch.counts;
    let mut anomalies = batch.anomalies;
    tracing::info!(
        device = %device,
        neighbors = counts.neighbors,
        links = counts.links,
        trunks = counts.trunks,
        interfaces = counts.interfaces,
        "import committed"
    );

    if let Some(detector_config) = config.detect {
        match AnomalyDetector::new(detector_config).detect(store, &device) {
            Ok(report) => anomalies.extend(report.anomalies),
            Err(e) => tracing::warn!(device = %device, error = %e, "detection after import failed"),
        }
    }

    Ok(ImportReport {
        status: ImportStatus::Imported,
        device,
        hash,
        source: source.origin.clone(),
        blocks: blocks.len(),
        encoding: Some(decoded.encoding),
        counts,
        anomalies,
    })
}

/// Which parser a command block goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    LldpBrief,
    EthTrunk,
    InterfaceDescription,
    StpBrief,
}

impl BlockKind {
    /// Classify by case-insensitive substring of the command text.
    pub fn of(command: &str) -> Option<Self> {
        let command = command.to_lowercase();
        if command.contains("lldp neighbor brief") {
            Some(Self::LldpBrief)
        } else if command.contains("eth-trunk") {
            Some(Self::EthTrunk)
        } else if command.contains("interface description") {
            Some(Self::InterfaceDescription)
        } else if command.contains("stp brief") {
            Some(Self::StpBrief)
        } else {
            None
        }
    }
}

/// Rows of one import, written through a single session.
struct Batch<'a> {
    device: &'a str,
    source: &'a str,
    observed_at: u64,
    counts: ImportCounts,
    anomalies: Vec<Anomaly>,
}

impl<'a> Batch<'a> {
    fn new(device: &'a str, source: &'a str) -> Self {
        Self {
            device,
            source,
            observed_at: now_secs(),
            counts: ImportCounts::default(),
            anomalies: Vec::new(),
        }
    }

    /// Write every row of `blocks`, then the ledger entry. Nothing is
    /// committed here; an error leaves the session to be rolled back.
    fn stage<W>(
        &mut self,
        w: &mut W,
        blocks: &[CommandBlock<'_>],
        record: &ImportRecord,
        overwrite: bool,
    ) -> StoreResult<()>
    where
        W: GraphWriter + AnomalySink,
    {
        self.run(w, blocks)?;
        w.record_import(record, overwrite)
    }

    fn run<W>(&mut self, w: &mut W, blocks: &[CommandBlock<'_>]) -> StoreResult<()>
    where
        W: GraphWriter + AnomalySink,
    {
        w.upsert_device(&Device::new(self.device))?;
        for block in blocks {
            match BlockKind::of(block.command) {
                Some(BlockKind::LldpBrief) => self.neighbors(w, block.output)?,
                Some(BlockKind::EthTrunk) => self.trunks(w, block.output)?,
                Some(BlockKind::InterfaceDescription) => self.interfaces(w, block.output)?,
                Some(BlockKind::StpBrief) => self.stp(w, block.output)?,
                None => tracing::trace!(command = block.command, "no parser for command"),
            }
        }
        Ok(())
    }

    fn neighbors<W: GraphWriter>(&mut self, w: &mut W, output: &str) -> StoreResult<()> {
        let mut rows = 0;
        for row in lldp::parse_brief(output) {
            if let Some(remote) = row.neighbor_interface.as_deref().filter(|s| !s.is_empty()) {
                let key = LinkKey::new(self.device, &row.local_interface, &row.neighbor_device, remote);
                w.upsert_link(&Link::new(key, LinkType::Physical))?;
                self.counts.links += 1;
            }
            w.append_observation(NeighborObservation {
                seq: 0,
                device: self.device.to_string(),
                local_interface: row.local_interface,
                neighbor_device: row.neighbor_device,
                neighbor_interface: row.neighbor_interface,
                expiry: row.expiry,
                source: self.source.to_string(),
                observed_at: self.observed_at,
            })?;
            rows += 1;
        }
        tracing::debug!(rows, "parsed lldp neighbor brief");
        self.counts.neighbors += rows;
        Ok(())
    }

    fn trunks<W: GraphWriter>(&mut self, w: &mut W, output: &str) -> StoreResult<()> {
        for group in trunk::parse(output) {
            w.upsert_trunk(&Trunk {
                device: self.device.to_string(),
                name: group.name.clone(),
                mode: group.mode.clone(),
                oper_status: group.oper_status,
            })?;
            for member in &group.members {
                let mut interface = Interface::new(self.device, member);
                interface.oper_status = group.oper_status;
                w.upsert_interface(&interface)?;
                w.add_trunk_member(self.device, &group.name, member)?;
            }
            tracing::debug!(trunk = %group.name, members = group.members.len(), "parsed eth-trunk");
            self.counts.trunks += 1;
        }
        Ok(())
    }

    fn interfaces<W: GraphWriter>(&mut self, w: &mut W, output: &str) -> StoreResult<()> {
        let mut rows = 0;
        for state in iface::parse(output) {
            w.upsert_interface(&Interface {
                device: self.device.to_string(),
                name: state.name,
                description: Some(state.description),
                admin_status: Some(state.admin_status),
                oper_status: Some(state.oper_status),
            })?;
            rows += 1;
        }
        tracing::debug!(rows, "parsed interface description");
        self.counts.interfaces += rows;
        Ok(())
    }

    fn stp<W: AnomalySink>(&mut self, w: &mut W, output: &str) -> StoreResult<()> {
        let ports: Vec<_> = stp::parse(output).collect();
        let blocked = stp::blocked_ports(&ports);
        tracing::debug!(ports = ports.len(), blocked = blocked.len(), "parsed stp brief");
        if blocked.is_empty() {
            return Ok(());
        }

        tracing::info!(device = self.device, blocked = blocked.len(), "spanning tree blocks ports");
        self.counts.stp_blocked += blocked.len();
        let anomaly = w.emit(Anomaly::new(
            self.device,
            AnomalyKind::StpBlocked,
            Severity::Info,
            serde_json::json!({ "blocked_ports": blocked, "count": blocked.len() }),
        ))?;
        self.anomalies.push(anomaly);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Confidence;
    use crate::store::WriteSession;

    const TRANSCRIPT: &str = "\
<Core>display lldp neighbor brief
Local Intf       Neighbor Dev             Neighbor Intf             Exptime(s)
-----------------------------------------------------------------------------
GE1/0/1          Switch-A                 GE0/0/1                   120
GE1/0/2          -                        -                         100
<Core>display eth-trunk
Eth-Trunk1's state information is:
WorkingMode: LACP      Hash arithmetic: According to SIP-XOR-DIP
Operate status: up     Number Of Up Port In Trunk: 2
----------------------------------------------------------------
PortName                      Status      Weight
GigabitEthernet1/0/10         Up          1
GigabitEthernet1/0/11         Up          1
<Core>display interface description
Interface                      PHY   Protocol  Description
GE1/0/1                        up    up        uplink
GE1/0/2                        *down down
<Core>display stp brief
 MSTID  Port                        Role  State       Protection
   0    GigabitEthernet1/0/1        ROOT  FORWARDING  NONE
   0    GigabitEthernet1/0/3        ALTE  DISCARDING  NONE
";

    fn source() -> TranscriptSource {
        TranscriptSource::from_bytes("captures/Core_20240101.log", TRANSCRIPT.as_bytes().to_vec())
    }

    #[test]
    fn block_dispatch() {
        assert_eq!(BlockKind::of("display lldp neighbor brief"), Some(BlockKind::LldpBrief));
        assert_eq!(BlockKind::of("DISPLAY ETH-TRUNK 1"), Some(BlockKind::EthTrunk));
        assert_eq!(
            BlockKind::of("display interface description"),
            Some(BlockKind::InterfaceDescription)
        );
        assert_eq!(BlockKind::of("display stp brief"), Some(BlockKind::StpBrief));
        assert_eq!(BlockKind::of("display version"), None);
    }

    #[test]
    fn imports_every_block() {
        let store = TopoStore::memory().unwrap();
        let report = import_transcript(&store, &source(), &ImportConfig::default()).unwrap();
        assert_eq!(report.status, ImportStatus::Imported);
        assert_eq!(report.device, "Core");
        assert_eq!(report.blocks, 4);
        assert_eq!(
            report.counts,
            ImportCounts {
                neighbors: 2,
                links: 2,
                trunks: 1,
                interfaces: 2,
                stp_blocked: 1,
            }
        );
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(report.anomalies[0].kind, AnomalyKind::StpBlocked);

        let r = store.read().unwrap();
        assert_eq!(
            r.trunk_members("Core", "Eth-Trunk1").unwrap(),
            vec!["GigabitEthernet1/0/10", "GigabitEthernet1/0/11"]
        );
        let uplink = r.interface("Core", "GigabitEthernet1/0/1").unwrap().unwrap();
        assert_eq!(uplink.description.as_deref(), Some("uplink"));
        assert_eq!(r.observations("Core").unwrap().len(), 2);
        assert_eq!(r.imports().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_is_skipped_and_force_reimports() {
        let store = TopoStore::memory().unwrap();
        let first = import_transcript(&store, &source(), &ImportConfig::default()).unwrap();
        let second = import_transcript(&store, &source(), &ImportConfig::default()).unwrap();
        assert_eq!(second.status, ImportStatus::Skipped);
        assert_eq!(second.hash, first.hash);
        assert_eq!(second.counts, ImportCounts::default());

        let forced =
            import_transcript(&store, &source(), &ImportConfig::default().with_force(true)).unwrap();
        assert_eq!(forced.status, ImportStatus::Imported);
        assert_eq!(forced.counts, first.counts);

        let r = store.read().unwrap();
        assert_eq!(r.imports().unwrap().len(), 1);
        assert_eq!(r.observations("Core").unwrap().len(), 4);
        assert_eq!(r.links().unwrap().len(), 2);
    }

    #[test]
    fn placeholder_neighbor_still_gets_a_link() {
        let store = TopoStore::memory().unwrap();
        let report = import_transcript(&store, &source(), &ImportConfig::default()).unwrap();

        let r = store.read().unwrap();
        let with_interface = r
            .observations("Core")
            .unwrap()
            .iter()
            .filter(|o| o.neighbor_interface.as_deref().is_some_and(|s| !s.is_empty()))
            .count();
        let links = r.links().unwrap();
        assert_eq!(with_interface, 2);
        assert_eq!(links.len(), with_interface);
        assert_eq!(report.counts.links, with_interface);

        let placeholder = LinkKey::new("Core", "GigabitEthernet1/0/2", "-", "-");
        let link = r.link(&placeholder).unwrap().unwrap();
        assert_eq!(link.link_type, LinkType::Physical);
    }

    /// Delegates to a write session but fails every link upsert.
    struct FailingLinks<'s>(&'s mut WriteSession);

    impl GraphReader for FailingLinks<'_> {
        fn device(&self, name: &str) -> StoreResult<Option<Device>> {
            self.0.device(name)
        }
        fn devices(&self) -> StoreResult<Vec<Device>> {
            self.0.devices()
        }
        fn interface(&self, device: &str, name: &str) -> StoreResult<Option<Interface>> {
            self.0.interface(device, name)
        }
        fn interfaces(&self, device: &str) -> StoreResult<Vec<Interface>> {
            self.0.interfaces(device)
        }
        fn trunk(&self, device: &str, name: &str) -> StoreResult<Option<Trunk>> {
            self.0.trunk(device, name)
        }
        fn trunks(&self, device: &str) -> StoreResult<Vec<Trunk>> {
            self.0.trunks(device)
        }
        fn trunk_members(&self, device: &str, trunk: &str) -> StoreResult<Vec<String>> {
            self.0.trunk_members(device, trunk)
        }
        fn observations(&self, device: &str) -> StoreResult<Vec<NeighborObservation>> {
            self.0.observations(device)
        }
        fn link(&self, key: &LinkKey) -> StoreResult<Option<Link>> {
            self.0.link(key)
        }
        fn links(&self) -> StoreResult<Vec<Link>> {
            self.0.links()
        }
        fn import_record(&self, hash: &str) -> StoreResult<Option<ImportRecord>> {
            self.0.import_record(hash)
        }
        fn imports(&self) -> StoreResult<Vec<ImportRecord>> {
            self.0.imports()
        }
        fn anomalies(
            &self,
            device: Option<&str>,
            severity: Option<Severity>,
        ) -> StoreResult<Vec<Anomaly>> {
            self.0.anomalies(device, severity)
        }
    }

    impl GraphWriter for FailingLinks<'_> {
        fn upsert_device(&mut self, device: &Device) -> StoreResult<Device> {
            self.0.upsert_device(device)
        }
        fn upsert_interface(&mut self, interface: &Interface) -> StoreResult<Interface> {
            self.0.upsert_interface(interface)
        }
        fn upsert_trunk(&mut self, trunk: &Trunk) -> StoreResult<Trunk> {
            self.0.upsert_trunk(trunk)
        }
        fn add_trunk_member(&mut self, device: &str, trunk: &str, member: &str) -> StoreResult<bool> {
            self.0.add_trunk_member(device, trunk, member)
        }
        fn append_observation(&mut self, observation: NeighborObservation) -> StoreResult<u64> {
            self.0.append_observation(observation)
        }
        fn upsert_link(&mut self, _link: &Link) -> StoreResult<Link> {
            Err(StoreError::Redb {
                message: "disk full".into(),
            })
        }
        fn set_link_confidence(
            &mut self,
            key: &LinkKey,
            confidence: Confidence,
        ) -> StoreResult<Link> {
            self.0.set_link_confidence(key, confidence)
        }
        fn record_import(&mut self, record: &ImportRecord, overwrite: bool) -> StoreResult<()> {
            self.0.record_import(record, overwrite)
        }
        fn append_anomaly(&mut self, anomaly: Anomaly) -> StoreResult<u64> {
            self.0.append_anomaly(anomaly)
        }
        fn retire_anomalies(&mut self, device: &str, kind: AnomalyKind) -> StoreResult<usize> {
            self.0.retire_anomalies(device, kind)
        }
    }

    impl AnomalySink for FailingLinks<'_> {
        fn emit(&mut self, anomaly: Anomaly) -> StoreResult<Anomaly> {
            self.0.emit(anomaly)
        }
    }

    #[test]
    fn write_failure_mid_batch_leaves_nothing() {
        let store = TopoStore::memory().unwrap();
        let src = source();
        let decoded = src.decode();
        let blocks = split_blocks(&decoded.text);
        let record = ImportRecord {
            hash: src.content_hash(),
            device: "Core".into(),
            source: "captures/Core_20240101.log".into(),
            imported_at: now_secs(),
        };

        {
            let mut session = store.write().unwrap();
            let mut batch = Batch::new("Core", "captures/Core_20240101.log");
            let err = batch
                .stage(&mut FailingLinks(&mut session), &blocks, &record, false)
                .unwrap_err();
            assert!(matches!(err, StoreError::Redb { .. }));
            // The device row went in before the failing link.
            assert!(session.device("Core").unwrap().is_some());
        }

        let r = store.read().unwrap();
        assert!(r.imports().unwrap().is_empty());
        assert!(r.links().unwrap().is_empty());
        assert!(r.devices().unwrap().is_empty());
        assert!(r.observations("Core").unwrap().is_empty());
        assert!(r.anomalies(None, None).unwrap().is_empty());

        // The same transcript imports cleanly afterwards.
        let report = import_transcript(&store, &source(), &ImportConfig::default()).unwrap();
        assert_eq!(report.status, ImportStatus::Imported);
    }

    #[test]
    fn explicit_device_overrides_file_name() {
        let store = TopoStore::memory().unwrap();
        let config = ImportConfig::default().with_device("Edge");
        let report = import_transcript(&store, &source(), &config).unwrap();
        assert_eq!(report.device, "Edge");
        assert!(store.read().unwrap().device("Core").unwrap().is_none());
    }

    #[test]
    fn unnamed_source_needs_device() {
        let store = TopoStore::memory().unwrap();
        let src = TranscriptSource::from_bytes("", TRANSCRIPT.as_bytes().to_vec());
        let err = import_transcript(&store, &src, &ImportConfig::default()).unwrap_err();
        assert!(matches!(err, ImportError::NoDeviceName { .. }));
        assert!(store.read().unwrap().imports().unwrap().is_empty());
    }

    #[test]
    fn oversized_source_is_rejected() {
        let store = TopoStore::memory().unwrap();
        let config = ImportConfig::default().with_max_source_bytes(16);
        let err = import_transcript(&store, &source(), &config).unwrap_err();
        assert!(matches!(err, ImportError::Transcript(_)));
    }

    #[test]
    fn detection_runs_after_import() {
        let looped = "\
<Core>display lldp neighbor brief
Local Intf       Neighbor Dev             Neighbor Intf             Exptime(s)
GE1/0/1          Switch-A                 GE0/0/1                   120
GE1/0/1          Switch-B                 GE0/0/2                   120
";
        let store = TopoStore::memory().unwrap();
        let src = TranscriptSource::from_bytes("Core.log", looped.as_bytes().to_vec());
        let config = ImportConfig::default().with_detection(DetectorConfig::default());
        let report = import_transcript(&store, &src, &config).unwrap();
        assert_eq!(
            report
                .anomalies
                .iter()
                .filter(|a| a.kind == AnomalyKind::SuspectLoop)
                .count(),
            1
        );
    }

    #[test]
    fn no_prompts_still_records_ledger() {
        let store = TopoStore::memory().unwrap();
        let src = TranscriptSource::from_bytes("Quiet.log", b"nothing to see".to_vec());
        let report = import_transcript(&store, &src, &ImportConfig::default()).unwrap();
        assert_eq!(report.status, ImportStatus::Imported);
        assert_eq!(report.blocks, 0);
        let r = store.read().unwrap();
        assert!(r.device("Quiet").unwrap().is_some());
        assert_eq!(r.imports().unwrap().len(), 1);
    }
}
