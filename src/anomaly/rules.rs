//! The built-in anomaly rules.
//!
//! Every rule is read-only: it looks at one device's slice of the graph and
//! returns the anomalies it found. Persisting them is the detector's job.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;

use super::error::AnomalyResult;
use crate::model::{Anomaly, AnomalyKind, NeighborObservation, Severity};
use crate::store::GraphReader;

/// Share of placeholder neighbor names above which a device is flagged.
pub const MIXED_LINK_RATIO: f64 = 0.5;

/// How many offending rows a mixed-link anomaly quotes.
pub const MIXED_LINK_EXAMPLES: usize = 5;

/// Default relative spread of expiry timers tolerated per neighbor.
pub const DEFAULT_UNSTABLE_THRESHOLD: f64 = 0.3;

/// A single detection rule.
pub trait AnomalyRule {
    /// Stable rule name, used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// The kind of anomaly this rule emits.
    fn kind(&self) -> AnomalyKind;

    fn evaluate(&self, graph: &dyn GraphReader, device: &str) -> AnomalyResult<Vec<Anomaly>>;
}

/// Whether a reported neighbor name carries no information: empty, or
/// made only of `-` and `_`.
pub fn is_placeholder_name(name: &str) -> bool {
    name.trim().chars().all(|c| c == '-' || c == '_')
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Distinct neighbor names per local interface.
fn neighbors_by_interface(obs: &[NeighborObservation]) -> BTreeMap<&str, BTreeSet<&str>> {
    let mut map: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for o in obs {
        map.entry(o.local_interface.as_str())
            .or_default()
            .insert(o.neighbor_device.as_str());
    }
    map
}

/// One local port hearing more than one neighbor device.
pub struct SuspectLoop;

impl AnomalyRule for SuspectLoop {
    fn name(&self) -> &'static str {
        "suspect_loop"
    }

    fn kind(&self) -> AnomalyKind {
        AnomalyKind::SuspectLoop
    }

    fn evaluate(&self, graph: &dyn GraphReader, device: &str) -> AnomalyResult<Vec<Anomaly>> {
        let obs = graph.observations(device)?;
        let mut found = Vec::new();
        for (interface, neighbors) in neighbors_by_interface(&obs) {
            if neighbors.len() < 2 {
                continue;
            }
            tracing::warn!(device, interface, ?neighbors, "suspect loop");
            found.push(Anomaly::new(
                device,
                self.kind(),
                Severity::Warning,
                json!({
                    "interface": interface,
                    "neighbors": neighbors,
                    "count": neighbors.len(),
                    "reason": "one physical port reports several different neighbor devices; \
                               possible loop or flapping link",
                }),
            ));
        }
        Ok(found)
    }
}

/// Most neighbor rows carrying an empty or placeholder system name.
pub struct SuspectMixedLink;

impl AnomalyRule for SuspectMixedLink {
    fn name(&self) -> &'static str {
        "suspect_mixed_link"
    }

    fn kind(&self) -> AnomalyKind {
        AnomalyKind::SuspectMixedLink
    }

    fn evaluate(&self, graph: &dyn GraphReader, device: &str) -> AnomalyResult<Vec<Anomaly>> {
        let obs = graph.observations(device)?;
        if obs.is_empty() {
            return Ok(Vec::new());
        }

        let invalid: Vec<&NeighborObservation> = obs
            .iter()
            .filter(|o| is_placeholder_name(&o.neighbor_device))
            .collect();
        let ratio = invalid.len() as f64 / obs.len() as f64;
        if ratio <= MIXED_LINK_RATIO {
            return Ok(Vec::new());
        }

        tracing::warn!(
            device,
            invalid = invalid.len(),
            total = obs.len(),
            "most neighbor names are empty or placeholders"
        );
        let examples: Vec<_> = invalid
            .iter()
            .take(MIXED_LINK_EXAMPLES)
            .map(|o| {
                let name = o.neighbor_device.trim();
                let shown = if name.is_empty() { "(empty)" } else { name };
                json!({ "interface": o.local_interface, "neighbor_device": shown })
            })
            .collect();
        Ok(vec![Anomaly::new(
            device,
            self.kind(),
            Severity::Warning,
            json!({
                "total_neighbors": obs.len(),
                "invalid_count": invalid.len(),
                "invalid_ratio": round2(ratio),
                "examples": examples,
                "reason": "most neighbor system names are empty or placeholders; \
                           check the LLDP configuration of the peers",
            }),
        )])
    }
}

/// Members of one aggregation group leading to different devices.
pub struct TrunkInconsistent;

impl AnomalyRule for TrunkInconsistent {
    fn name(&self) -> &'static str {
        "trunk_inconsistent"
    }

    fn kind(&self) -> AnomalyKind {
        AnomalyKind::TrunkInconsistent
    }

    fn evaluate(&self, graph: &dyn GraphReader, device: &str) -> AnomalyResult<Vec<Anomaly>> {
        let obs = graph.observations(device)?;
        let by_interface = neighbors_by_interface(&obs);
        let mut found = Vec::new();

        for trunk in graph.trunks(device)? {
            let members = graph.trunk_members(device, &trunk.name)?;
            if members.is_empty() {
                continue;
            }

            let mut per_member: BTreeMap<&str, &BTreeSet<&str>> = BTreeMap::new();
            let mut union: BTreeSet<&str> = BTreeSet::new();
            for member in &members {
                if let Some(neighbors) = by_interface.get(member.as_str()) {
                    per_member.insert(member.as_str(), neighbors);
                    union.extend(neighbors.iter().copied());
                }
            }
            if union.len() < 2 {
                continue;
            }

            tracing::error!(device, trunk = %trunk.name, ?union, "aggregation members disagree on neighbor");
            found.push(Anomaly::new(
                device,
                self.kind(),
                Severity::Error,
                json!({
                    "trunk": trunk.name,
                    "members": members,
                    "neighbors": union,
                    "member_details": per_member,
                    "reason": "members of one aggregation group lead to different neighbor \
                               devices; the bundle is probably misconfigured",
                }),
            ));
        }
        Ok(found)
    }
}

/// Expiry timers of one neighbor spreading more than `threshold` around
/// their mean across observations.
pub struct UnstableNeighbor {
    pub threshold: f64,
}

impl Default for UnstableNeighbor {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_UNSTABLE_THRESHOLD,
        }
    }
}

impl AnomalyRule for UnstableNeighbor {
    fn name(&self) -> &'static str {
        "unstable_neighbor"
    }

    fn kind(&self) -> AnomalyKind {
        AnomalyKind::UnstableNeighbor
    }

    fn evaluate(&self, graph: &dyn GraphReader, device: &str) -> AnomalyResult<Vec<Anomaly>> {
        let obs = graph.observations(device)?;
        let mut timers: BTreeMap<(&str, &str), Vec<u32>> = BTreeMap::new();
        for o in &obs {
            if let Some(expiry) = o.expiry {
                timers
                    .entry((o.local_interface.as_str(), o.neighbor_device.as_str()))
                    .or_default()
                    .push(expiry);
            }
        }

        let mut found = Vec::new();
        for ((interface, neighbor), values) in timers {
            let distinct: BTreeSet<u32> = values.iter().copied().collect();
            if distinct.len() < 2 {
                continue;
            }
            let (Some(&min), Some(&max)) = (distinct.first(), distinct.last()) else {
                continue;
            };
            let avg = values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64;
            if avg <= 0.0 {
                continue;
            }
            let variation = f64::from(max - min) / avg;
            if variation <= self.threshold {
                continue;
            }

            tracing::info!(device, interface, neighbor, variation, "unstable neighbor timers");
            found.push(Anomaly::new(
                device,
                self.kind(),
                Severity::Info,
                json!({
                    "interface": interface,
                    "neighbor": neighbor,
                    "avg_expiry": avg,
                    "min_expiry": min,
                    "max_expiry": max,
                    "samples": values.len(),
                    "variation": round2(variation),
                    "threshold": self.threshold,
                }),
            ));
        }
        Ok(found)
    }
}
