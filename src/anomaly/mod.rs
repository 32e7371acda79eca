//! Anomaly detection over the reconciled link graph.
//!
//! Two paths produce anomalies. The import engine reports blocked
//! spanning-tree ports as it sees them, and the [`AnomalyDetector`] runs
//! its rule set against the stored graph afterwards. Both emit through
//! [`AnomalySink`], so severity and kind are decided by whoever detects the
//! condition and persistence happens in one place.
//!
//! Each rule runs in isolation: a rule that fails is recorded in
//! [`DetectionReport::failures`] and the others still run.

pub mod error;
pub mod rules;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::model::{Anomaly, AnomalyKind};
use crate::store::{GraphReader, GraphWriter, TopoStore, WriteSession};

pub use error::{AnomalyError, AnomalyResult};
pub use rules::{AnomalyRule, SuspectLoop, SuspectMixedLink, TrunkInconsistent, UnstableNeighbor};

/// Destination for detected anomalies.
pub trait AnomalySink {
    /// Record one anomaly, returning it as recorded (with its sequence
    /// number when the sink assigns one).
    fn emit(&mut self, anomaly: Anomaly) -> StoreResult<Anomaly>;
}

impl AnomalySink for Vec<Anomaly> {
    fn emit(&mut self, anomaly: Anomaly) -> StoreResult<Anomaly> {
        self.push(anomaly.clone());
        Ok(anomaly)
    }
}

impl AnomalySink for WriteSession {
    fn emit(&mut self, mut anomaly: Anomaly) -> StoreResult<Anomaly> {
        anomaly.seq = self.append_anomaly(anomaly.clone())?;
        Ok(anomaly)
    }
}

/// What happens to earlier anomalies when detection runs again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyPolicy {
    /// Keep every run's anomalies as history.
    #[default]
    Accumulate,
    /// Retire a device's anomalies of a kind before writing the new ones.
    Replace,
}

impl fmt::Display for AnomalyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accumulate => "accumulate",
            Self::Replace => "replace",
        })
    }
}

impl FromStr for AnomalyPolicy {
    type Err = AnomalyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accumulate" => Ok(Self::Accumulate),
            "replace" => Ok(Self::Replace),
            _ => Err(AnomalyError::UnknownPolicy {
                value: s.to_string(),
            }),
        }
    }
}

/// Detector settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Threshold of the unstable-neighbor rule (default: 0.3).
    pub unstable_threshold: f64,
    pub policy: AnomalyPolicy,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            unstable_threshold: rules::DEFAULT_UNSTABLE_THRESHOLD,
            policy: AnomalyPolicy::default(),
        }
    }
}

/// A rule that failed during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub rule: String,
    pub message: String,
}

/// Outcome of one detection run on one device.
#[derive(Debug, Clone, Default)]
pub struct DetectionReport {
    pub device: String,
    /// Anomalies found, in rule order.
    pub anomalies: Vec<Anomaly>,
    pub failures: Vec<RuleFailure>,
    /// Anomalies per rule name, for every rule that completed.
    pub rule_stats: BTreeMap<String, usize>,
    /// Earlier anomalies removed under [`AnomalyPolicy::Replace`].
    pub retired: usize,
}

impl DetectionReport {
    pub fn of_kind(&self, kind: AnomalyKind) -> impl Iterator<Item = &Anomaly> {
        self.anomalies.iter().filter(move |a| a.kind == kind)
    }
}

/// Runs the rule set against devices in the graph.
pub struct AnomalyDetector {
    config: DetectorConfig,
    rules: Vec<Box<dyn AnomalyRule>>,
}

impl AnomalyDetector {
    /// A detector with the four built-in rules.
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            rules: vec![
                Box::new(SuspectLoop),
                Box::new(SuspectMixedLink),
                Box::new(TrunkInconsistent),
                Box::new(UnstableNeighbor {
                    threshold: config.unstable_threshold,
                }),
            ],
        }
    }

    /// A detector with no rules; add them with [`with_rule`](Self::with_rule).
    pub fn empty(config: DetectorConfig) -> Self {
        Self {
            config,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: impl AnomalyRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run every rule against `device` without writing anything.
    pub fn evaluate(&self, graph: &dyn GraphReader, device: &str) -> DetectionReport {
        let mut report = DetectionReport {
            device: device.to_string(),
            ..Default::default()
        };

        for rule in &self.rules {
            match rule.evaluate(graph, device) {
                Ok(found) => {
                    report.rule_stats.insert(rule.name().to_string(), found.len());
                    report.anomalies.extend(found);
                }
                Err(e) => {
                    tracing::warn!(
                        rule = rule.name(),
                        device,
                        error = %e,
                        "anomaly rule failed, continuing"
                    );
                    report.failures.push(RuleFailure {
                        rule: rule.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Detect anomalies on one device and persist them in one transaction.
    pub fn detect(&self, store: &TopoStore, device: &str) -> AnomalyResult<DetectionReport> {
        let snapshot = store.read()?;
        if snapshot.device(device)?.is_none() {
            return Err(AnomalyError::DeviceNotFound {
                device: device.to_string(),
            });
        }
        let report = self.evaluate(&snapshot, device);
        drop(snapshot);

        let mut session = store.write()?;
        let report = self.persist(&mut session, report)?;
        session.commit()?;

        tracing::info!(
            device,
            anomalies = report.anomalies.len(),
            failed_rules = report.failures.len(),
            "anomaly detection finished"
        );
        Ok(report)
    }

    /// Detect anomalies on every known device.
    pub fn detect_all(&self, store: &TopoStore) -> AnomalyResult<Vec<DetectionReport>> {
        let devices = store.read()?.devices()?;
        devices
            .iter()
            .map(|d| self.detect(store, &d.name))
            .collect()
    }

    /// Write a report's anomalies through `sink`, applying the policy.
    ///
    /// Under [`AnomalyPolicy::Replace`] only the kinds of rules that
    /// completed are retired, so a failing rule never wipes its history.
    pub fn persist<W>(&self, sink: &mut W, mut report: DetectionReport) -> StoreResult<DetectionReport>
    where
        W: GraphWriter + AnomalySink,
    {
        if self.config.policy == AnomalyPolicy::Replace {
            for rule in &self.rules {
                if report.rule_stats.contains_key(rule.name()) {
                    report.retired += sink.retire_anomalies(&report.device, rule.kind())?;
                }
            }
        }

        let found = std::mem::take(&mut report.anomalies);
        for anomaly in found {
            report.anomalies.push(sink.emit(anomaly)?);
        }
        Ok(report)
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl fmt::Debug for AnomalyDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnomalyDetector")
            .field("config", &self.config)
            .field("rules", &self.rule_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::model::{Device, NeighborObservation, Severity};

    struct Broken;

    impl AnomalyRule for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn kind(&self) -> AnomalyKind {
            AnomalyKind::UnstableNeighbor
        }

        fn evaluate(&self, _: &dyn GraphReader, _: &str) -> AnomalyResult<Vec<Anomaly>> {
            Err(AnomalyError::Store(StoreError::Redb {
                message: "simulated".into(),
            }))
        }
    }

    fn looped_store() -> TopoStore {
        let store = TopoStore::memory().unwrap();
        let mut w = store.write().unwrap();
        w.upsert_device(&Device::new("Core")).unwrap();
        for neighbor in ["Switch-A", "Switch-B"] {
            w.append_observation(NeighborObservation {
                seq: 0,
                device: "Core".into(),
                local_interface: "GigabitEthernet1/0/1".into(),
                neighbor_device: neighbor.into(),
                neighbor_interface: Some("GigabitEthernet0/0/1".into()),
                expiry: Some(120),
                source: "test".into(),
                observed_at: 0,
            })
            .unwrap();
        }
        w.commit().unwrap();
        store
    }

    #[test]
    fn failing_rule_does_not_stop_others() {
        let detector = AnomalyDetector::empty(DetectorConfig::default())
            .with_rule(Broken)
            .with_rule(SuspectLoop);
        let store = looped_store();
        let report = detector.detect(&store, "Core").unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].rule, "broken");
        assert_eq!(report.of_kind(AnomalyKind::SuspectLoop).count(), 1);
        assert!(!report.rule_stats.contains_key("broken"));
    }

    #[test]
    fn accumulate_keeps_history() {
        let store = looped_store();
        let detector = AnomalyDetector::default();
        detector.detect(&store, "Core").unwrap();
        detector.detect(&store, "Core").unwrap();
        let stored = store.read().unwrap().anomalies(Some("Core"), None).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|a| a.seq > 0));
    }

    #[test]
    fn replace_keeps_latest_run_only() {
        let store = looped_store();
        let detector = AnomalyDetector::new(DetectorConfig {
            policy: AnomalyPolicy::Replace,
            ..Default::default()
        });
        detector.detect(&store, "Core").unwrap();
        let second = detector.detect(&store, "Core").unwrap();
        assert_eq!(second.retired, 1);
        let stored = store
            .read()
            .unwrap()
            .anomalies(Some("Core"), Some(Severity::Warning))
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[test]
    fn unknown_device_is_an_error() {
        let store = looped_store();
        let err = AnomalyDetector::default().detect(&store, "Nope").unwrap_err();
        assert!(matches!(err, AnomalyError::DeviceNotFound { .. }));
    }

    #[test]
    fn detect_all_covers_every_device() {
        let store = looped_store();
        let mut w = store.write().unwrap();
        w.upsert_device(&Device::new("Edge")).unwrap();
        w.commit().unwrap();
        let reports = AnomalyDetector::default().detect_all(&store).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].device, "Core");
        assert_eq!(reports[0].anomalies.len(), 1);
        assert!(reports[1].anomalies.is_empty());
    }

    #[test]
    fn policy_parses() {
        assert_eq!("Replace".parse::<AnomalyPolicy>().unwrap(), AnomalyPolicy::Replace);
        assert!("forget".parse::<AnomalyPolicy>().is_err());
    }

    #[test]
    fn vec_sink_collects() {
        let mut sink: Vec<Anomaly> = Vec::new();
        sink.emit(Anomaly::new(
            "Core",
            AnomalyKind::StpBlocked,
            Severity::Info,
            serde_json::json!({}),
        ))
        .unwrap();
        assert_eq!(sink.len(), 1);
    }
}
