//! ACID-durable graph store backed by redb.
//!
//! Every entity lives in its own table keyed by its natural key, with
//! composite keys joined by NUL so that a prefix range scan lists the rows
//! of one device. Values are bincode-encoded. Append-only tables
//! (observations, anomalies) are keyed by a zero-padded sequence number
//! drawn from the `sequences` table, as is the insertion id of links.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{
    Database, ReadOnlyTable, ReadTransaction, ReadableTable, Table, TableDefinition,
    WriteTransaction,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{GraphReader, GraphWriter};
use crate::error::{StoreError, StoreResult};
use crate::model::{
    Anomaly, AnomalyKind, Confidence, Device, ImportRecord, Interface, Link, LinkKey,
    NeighborObservation, Severity, Trunk,
};

type Rows = TableDefinition<'static, &'static str, &'static [u8]>;

const DEVICES: Rows = TableDefinition::new("devices");
const INTERFACES: Rows = TableDefinition::new("interfaces");
const TRUNKS: Rows = TableDefinition::new("trunks");
const MEMBERS: Rows = TableDefinition::new("trunk_members");
const OBSERVATIONS: Rows = TableDefinition::new("observations");
const LINKS: Rows = TableDefinition::new("links");
const IMPORTS: Rows = TableDefinition::new("imports");
const ANOMALIES: Rows = TableDefinition::new("anomalies");

const ALL_TABLES: [Rows; 8] = [
    DEVICES,
    INTERFACES,
    TRUNKS,
    MEMBERS,
    OBSERVATIONS,
    LINKS,
    IMPORTS,
    ANOMALIES,
];

/// Named counters: `observation`, `link`, `anomaly`.
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

fn key(parts: &[&str]) -> String {
    parts.join("\0")
}

fn prefix(parts: &[&str]) -> String {
    let mut k = key(parts);
    k.push('\0');
    k
}

fn seq_key(seq: u64) -> String {
    format!("{seq:020}")
}

fn link_key(k: &LinkKey) -> String {
    key(&[&k.src_device, &k.src_interface, &k.dst_device, &k.dst_interface])
}

fn redb_err<E: std::fmt::Display>(what: &'static str) -> impl Fn(E) -> StoreError {
    move |e| StoreError::Redb {
        message: format!("{what} failed: {e}"),
    }
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization {
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization {
        message: e.to_string(),
    })
}

fn get_row<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> StoreResult<Option<T>> {
    match table.get(key).map_err(redb_err("get"))? {
        Some(guard) => decode(guard.value()).map(Some),
        None => Ok(None),
    }
}

/// Rows whose key starts with `prefix`, in key order, as `(key, row)`.
fn scan_rows<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    prefix: &str,
) -> StoreResult<Vec<(String, T)>> {
    let mut out = Vec::new();
    for entry in table.range(prefix..).map_err(redb_err("range"))? {
        let (k, v) = entry.map_err(redb_err("range"))?;
        let k = k.value();
        if !k.starts_with(prefix) {
            break;
        }
        out.push((k.to_string(), decode(v.value())?));
    }
    Ok(out)
}

/// Key suffixes after `prefix`, in key order.
fn scan_keys(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    prefix: &str,
) -> StoreResult<Vec<String>> {
    let mut out = Vec::new();
    for entry in table.range(prefix..).map_err(redb_err("range"))? {
        let (k, _) = entry.map_err(redb_err("range"))?;
        match k.value().strip_prefix(prefix) {
            Some(rest) => out.push(rest.to_string()),
            None => break,
        }
    }
    Ok(out)
}

/// Stored form of an [`Anomaly`]; bincode cannot decode a free-form JSON
/// value, so the detail is kept as JSON text.
#[derive(Serialize, Deserialize)]
struct AnomalyRow {
    seq: u64,
    device: String,
    kind: AnomalyKind,
    severity: Severity,
    detail_json: String,
    created_at: u64,
}

impl AnomalyRow {
    fn from_anomaly(a: &Anomaly) -> StoreResult<Self> {
        Ok(Self {
            seq: a.seq,
            device: a.device.clone(),
            kind: a.kind,
            severity: a.severity,
            detail_json: serde_json::to_string(&a.detail).map_err(|e| {
                StoreError::Serialization {
                    message: e.to_string(),
                }
            })?,
            created_at: a.created_at,
        })
    }

    fn into_anomaly(self) -> StoreResult<Anomaly> {
        Ok(Anomaly {
            seq: self.seq,
            device: self.device,
            kind: self.kind,
            severity: self.severity,
            detail: serde_json::from_str(&self.detail_json).map_err(|e| {
                StoreError::Serialization {
                    message: e.to_string(),
                }
            })?,
            created_at: self.created_at,
        })
    }
}

/// The graph database.
///
/// Single writer, many readers: redb serializes write transactions and
/// gives every reader a consistent snapshot.
pub struct TopoStore {
    db: Arc<Database>,
    path: Option<PathBuf>,
}

impl TopoStore {
    /// Open or create a database file, creating parent directories.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Io { source: e })?;
            }
        }
        let db = Database::create(path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", path.display()),
        })?;
        tracing::debug!(path = %path.display(), "opened topology store");
        Self::init(db, Some(path.to_path_buf()))
    }

    /// A store that lives only in memory.
    pub fn memory() -> StoreResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(redb_err("create in-memory database"))?;
        Self::init(db, None)
    }

    fn init(db: Database, path: Option<PathBuf>) -> StoreResult<Self> {
        let txn = db.begin_write().map_err(redb_err("begin_write"))?;
        for def in ALL_TABLES {
            txn.open_table(def).map_err(redb_err("open_table"))?;
        }
        txn.open_table(SEQUENCES).map_err(redb_err("open_table"))?;
        txn.commit().map_err(redb_err("commit"))?;
        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Begin a consistent read snapshot.
    pub fn read(&self) -> StoreResult<ReadSession> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        Ok(ReadSession { txn })
    }

    /// Begin a write transaction.
    pub fn write(&self) -> StoreResult<WriteSession> {
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        Ok(WriteSession { txn })
    }
}

impl std::fmt::Debug for TopoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopoStore")
            .field("path", &self.path)
            .finish()
    }
}

/// Read-only snapshot.
pub struct ReadSession {
    txn: ReadTransaction,
}

impl ReadSession {
    fn table(&self, def: Rows) -> StoreResult<ReadOnlyTable<&'static str, &'static [u8]>> {
        self.txn.open_table(def).map_err(redb_err("open_table"))
    }
}

/// One write transaction. Dropping it without [`commit`](Self::commit)
/// discards every change.
pub struct WriteSession {
    txn: WriteTransaction,
}

impl WriteSession {
    fn table(&self, def: Rows) -> StoreResult<Table<'_, &'static str, &'static [u8]>> {
        self.txn.open_table(def).map_err(redb_err("open_table"))
    }

    fn put<T: Serialize>(&self, def: Rows, key: &str, value: &T) -> StoreResult<()> {
        let bytes = encode(value)?;
        let mut table = self.table(def)?;
        table
            .insert(key, bytes.as_slice())
            .map_err(redb_err("insert"))?;
        Ok(())
    }

    fn next_seq(&self, name: &str) -> StoreResult<u64> {
        let mut table = self
            .txn
            .open_table(SEQUENCES)
            .map_err(redb_err("open_table"))?;
        let current = table
            .get(name)
            .map_err(redb_err("get"))?
            .map(|g| g.value())
            .unwrap_or(0);
        let next = current + 1;
        table.insert(name, next).map_err(redb_err("insert"))?;
        Ok(next)
    }

    /// Make every change of this session durable.
    pub fn commit(self) -> StoreResult<()> {
        self.txn.commit().map_err(redb_err("commit"))
    }

    /// Discard every change of this session.
    pub fn rollback(self) -> StoreResult<()> {
        self.txn.abort().map_err(redb_err("abort"))
    }
}

macro_rules! impl_graph_reader {
    ($session:ty) => {
        impl GraphReader for $session {
            fn device(&self, name: &str) -> StoreResult<Option<Device>> {
                get_row(&self.table(DEVICES)?, name)
            }

            fn devices(&self) -> StoreResult<Vec<Device>> {
                let rows = scan_rows(&self.table(DEVICES)?, "")?;
                Ok(rows.into_iter().map(|(_, d)| d).collect())
            }

            fn interface(&self, device: &str, name: &str) -> StoreResult<Option<Interface>> {
                get_row(&self.table(INTERFACES)?, &key(&[device, name]))
            }

            fn interfaces(&self, device: &str) -> StoreResult<Vec<Interface>> {
                let rows = scan_rows(&self.table(INTERFACES)?, &prefix(&[device]))?;
                Ok(rows.into_iter().map(|(_, i)| i).collect())
            }

            fn trunk(&self, device: &str, name: &str) -> StoreResult<Option<Trunk>> {
                get_row(&self.table(TRUNKS)?, &key(&[device, name]))
            }

            fn trunks(&self, device: &str) -> StoreResult<Vec<Trunk>> {
                let rows = scan_rows(&self.table(TRUNKS)?, &prefix(&[device]))?;
                Ok(rows.into_iter().map(|(_, t)| t).collect())
            }

            fn trunk_members(&self, device: &str, trunk: &str) -> StoreResult<Vec<String>> {
                scan_keys(&self.table(MEMBERS)?, &prefix(&[device, trunk]))
            }

            fn observations(&self, device: &str) -> StoreResult<Vec<NeighborObservation>> {
                let rows = scan_rows(&self.table(OBSERVATIONS)?, &prefix(&[device]))?;
                Ok(rows.into_iter().map(|(_, o)| o).collect())
            }

            fn link(&self, k: &LinkKey) -> StoreResult<Option<Link>> {
                get_row(&self.table(LINKS)?, &link_key(k))
            }

            fn links(&self) -> StoreResult<Vec<Link>> {
                let mut links: Vec<Link> = scan_rows(&self.table(LINKS)?, "")?
                    .into_iter()
                    .map(|(_, l)| l)
                    .collect();
                links.sort_by_key(|l| l.id);
                Ok(links)
            }

            fn import_record(&self, hash: &str) -> StoreResult<Option<ImportRecord>> {
                get_row(&self.table(IMPORTS)?, hash)
            }

            fn imports(&self) -> StoreResult<Vec<ImportRecord>> {
                let mut records: Vec<ImportRecord> = scan_rows(&self.table(IMPORTS)?, "")?
                    .into_iter()
                    .map(|(_, r)| r)
                    .collect();
                records.sort_by(|a, b| b.imported_at.cmp(&a.imported_at));
                Ok(records)
            }

            fn anomalies(
                &self,
                device: Option<&str>,
                severity: Option<Severity>,
            ) -> StoreResult<Vec<Anomaly>> {
                let rows: Vec<(String, AnomalyRow)> = scan_rows(&self.table(ANOMALIES)?, "")?;
                let mut out = Vec::new();
                for (_, row) in rows.into_iter().rev() {
                    if device.is_some_and(|d| d != row.device)
                        || severity.is_some_and(|s| s != row.severity)
                    {
                        continue;
                    }
                    out.push(row.into_anomaly()?);
                }
                Ok(out)
            }
        }
    };
}

impl_graph_reader!(ReadSession);
impl_graph_reader!(WriteSession);

impl GraphWriter for WriteSession {
    fn upsert_device(&mut self, device: &Device) -> StoreResult<Device> {
        let existing: Option<Device> = get_row(&self.table(DEVICES)?, &device.name)?;
        let merged = match existing {
            Some(old) => Device {
                name: old.name,
                mgmt_ip: device.mgmt_ip.clone().or(old.mgmt_ip),
                vendor: device.vendor.clone().or(old.vendor),
                model: device.model.clone().or(old.model),
                created_at: old.created_at,
            },
            None => device.clone(),
        };
        self.put(DEVICES, &merged.name, &merged)?;
        Ok(merged)
    }

    fn upsert_interface(&mut self, interface: &Interface) -> StoreResult<Interface> {
        let k = key(&[&interface.device, &interface.name]);
        let existing: Option<Interface> = get_row(&self.table(INTERFACES)?, &k)?;
        let merged = match existing {
            Some(old) => Interface {
                description: interface.description.clone().or(old.description),
                admin_status: interface.admin_status.or(old.admin_status),
                oper_status: interface.oper_status.or(old.oper_status),
                ..old
            },
            None => interface.clone(),
        };
        self.put(INTERFACES, &k, &merged)?;
        Ok(merged)
    }

    fn upsert_trunk(&mut self, trunk: &Trunk) -> StoreResult<Trunk> {
        let k = key(&[&trunk.device, &trunk.name]);
        let existing: Option<Trunk> = get_row(&self.table(TRUNKS)?, &k)?;
        let merged = match existing {
            Some(old) => Trunk {
                mode: trunk.mode.clone().or(old.mode),
                oper_status: trunk.oper_status.or(old.oper_status),
                ..old
            },
            None => trunk.clone(),
        };
        self.put(TRUNKS, &k, &merged)?;
        Ok(merged)
    }

    fn add_trunk_member(&mut self, device: &str, trunk: &str, member: &str) -> StoreResult<bool> {
        if self.trunk(device, trunk)?.is_none() {
            return Err(StoreError::NotFound {
                entity: "trunk".into(),
                key: format!("{device} {trunk}"),
            });
        }
        let k = key(&[device, trunk, member]);
        let mut table = self.table(MEMBERS)?;
        let existed = table.get(k.as_str()).map_err(redb_err("get"))?.is_some();
        if !existed {
            let empty: &[u8] = &[];
            table.insert(k.as_str(), empty).map_err(redb_err("insert"))?;
        }
        Ok(!existed)
    }

    fn append_observation(&mut self, mut observation: NeighborObservation) -> StoreResult<u64> {
        let seq = self.next_seq("observation")?;
        observation.seq = seq;
        let k = key(&[&observation.device, &seq_key(seq)]);
        self.put(OBSERVATIONS, &k, &observation)?;
        Ok(seq)
    }

    fn upsert_link(&mut self, link: &Link) -> StoreResult<Link> {
        let k = link_key(&link.key);
        let existing: Option<Link> = get_row(&self.table(LINKS)?, &k)?;
        let merged = match existing {
            Some(old) => Link {
                id: old.id,
                key: old.key,
                link_type: link.link_type,
                confidence: link.confidence,
                notes: link.notes.clone().or(old.notes),
            },
            None => Link {
                id: self.next_seq("link")?,
                ..link.clone()
            },
        };
        self.put(LINKS, &k, &merged)?;
        Ok(merged)
    }

    fn set_link_confidence(
        &mut self,
        link: &LinkKey,
        confidence: Confidence,
    ) -> StoreResult<Link> {
        let k = link_key(link);
        let Some(mut stored) = get_row::<Link>(&self.table(LINKS)?, &k)? else {
            return Err(StoreError::NotFound {
                entity: "link".into(),
                key: link.to_string(),
            });
        };
        stored.confidence = confidence;
        self.put(LINKS, &k, &stored)?;
        Ok(stored)
    }

    fn record_import(&mut self, record: &ImportRecord, overwrite: bool) -> StoreResult<()> {
        if !overwrite && self.import_record(&record.hash)?.is_some() {
            return Err(StoreError::DuplicateKey {
                entity: "import".into(),
                key: record.hash.clone(),
            });
        }
        self.put(IMPORTS, &record.hash, record)
    }

    fn append_anomaly(&mut self, mut anomaly: Anomaly) -> StoreResult<u64> {
        let seq = self.next_seq("anomaly")?;
        anomaly.seq = seq;
        let row = AnomalyRow::from_anomaly(&anomaly)?;
        self.put(ANOMALIES, &seq_key(seq), &row)?;
        Ok(seq)
    }

    fn retire_anomalies(&mut self, device: &str, kind: AnomalyKind) -> StoreResult<usize> {
        let rows: Vec<(String, AnomalyRow)> = scan_rows(&self.table(ANOMALIES)?, "")?;
        let doomed: Vec<String> = rows
            .into_iter()
            .filter(|(_, r)| r.device == device && r.kind == kind)
            .map(|(k, _)| k)
            .collect();
        let mut table = self.table(ANOMALIES)?;
        for k in &doomed {
            table.remove(k.as_str()).map_err(redb_err("remove"))?;
        }
        Ok(doomed.len())
    }
}
