//! Topology diagrams from the reconciled link graph.
//!
//! Export runs in two steps. [`select`] picks the links to draw: either the
//! links of one device, or everything reachable from a set of seed devices
//! within a hop limit. [`TopologyView::build`] then assigns diagram-safe node
//! identifiers and edge labels, and a renderer ([`mermaid`] or [`dot`])
//! turns the view into text.
//!
//! Links labelled [`Confidence::Ignore`] are never drawn, whatever the
//! whitelist says.

pub mod dot;
pub mod error;
pub mod mermaid;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::anomaly::rules::is_placeholder_name;
use crate::canon::abbreviate;
use crate::model::{Confidence, Link, LinkType};
use crate::store::GraphReader;

pub use error::{ExportError, ExportResult};

/// Default cap on physical links in single-device mode.
pub const DEFAULT_MAX_PHY_LINKS: usize = 50;

/// Hop limit used when several seeds are given without an explicit depth.
pub const DEFAULT_DEPTH: usize = 2;

/// Node identifier for empty or placeholder device names.
pub const UNKNOWN_NODE: &str = "Unknown";

/// Output grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Mermaid,
    /// A title plus a fenced mermaid block.
    Markdown,
    /// Graphviz digraph.
    Dot,
}

impl ExportFormat {
    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mermaid => "mmd",
            Self::Markdown => "md",
            Self::Dot => "dot",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mermaid => "mermaid",
            Self::Markdown => "markdown",
            Self::Dot => "dot",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mermaid" | "mmd" => Ok(Self::Mermaid),
            "markdown" | "md" => Ok(Self::Markdown),
            "dot" | "graphviz" => Ok(Self::Dot),
            _ => Err(ExportError::UnknownFormat {
                value: s.to_string(),
            }),
        }
    }
}

/// What to draw and how.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Seed devices. The first one is drawn as the center.
    pub devices: Vec<String>,
    /// Confidence tiers to include. `Ignore` is dropped even if listed.
    pub confidence: Vec<Confidence>,
    /// Physical link cap for single-device mode.
    pub max_phy_links: usize,
    /// Hop limit. `None` with a single seed means single-device mode.
    pub depth: Option<usize>,
    pub format: ExportFormat,
}

impl ExportRequest {
    /// Single-device export with default settings.
    pub fn device(name: impl Into<String>) -> Self {
        Self::devices([name.into()])
    }

    pub fn devices(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            devices: names.into_iter().collect(),
            confidence: vec![Confidence::Trusted, Confidence::Suspect],
            max_phy_links: DEFAULT_MAX_PHY_LINKS,
            depth: None,
            format: ExportFormat::default(),
        }
    }

    pub fn with_confidence(mut self, tiers: impl IntoIterator<Item = Confidence>) -> Self {
        self.confidence = tiers.into_iter().collect();
        self
    }

    pub fn with_max_phy_links(mut self, max: usize) -> Self {
        self.max_phy_links = max;
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    fn allows(&self, link: &Link) -> bool {
        link.confidence != Confidence::Ignore && self.confidence.contains(&link.confidence)
    }

    fn is_multi_hop(&self) -> bool {
        self.depth.is_some() || self.devices.len() > 1
    }
}

/// Links chosen for a diagram.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub center: String,
    /// Aggregated links first, then physical ones, each in insertion order.
    pub links: Vec<Link>,
    /// Physical links dropped by the cap.
    pub truncated: usize,
}

/// A rendered diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagram {
    pub text: String,
    pub format: ExportFormat,
    pub nodes: usize,
    pub edges: usize,
    /// Physical links left out because of the cap.
    pub truncated: usize,
}

/// Pick and render the links `request` asks for.
pub fn export(graph: &dyn GraphReader, request: &ExportRequest) -> ExportResult<Diagram> {
    let selection = select(graph, request)?;
    let view = TopologyView::build(&selection);
    let text = match request.format {
        ExportFormat::Mermaid => mermaid::render(&view),
        ExportFormat::Markdown => mermaid::render_markdown(&view),
        ExportFormat::Dot => dot::render(&view),
    };
    tracing::info!(
        center = %selection.center,
        format = %request.format,
        nodes = view.nodes.len(),
        edges = view.edges.len(),
        "exported topology"
    );
    Ok(Diagram {
        text,
        format: request.format,
        nodes: view.nodes.len(),
        edges: view.edges.len(),
        truncated: selection.truncated,
    })
}

/// Pick the links to draw.
pub fn select(graph: &dyn GraphReader, request: &ExportRequest) -> ExportResult<Selection> {
    let Some(center) = request.devices.first() else {
        return Err(ExportError::NoSeeds);
    };
    for device in &request.devices {
        if graph.device(device)?.is_none() && graph.links_touching(device)?.is_empty() {
            return Err(ExportError::DeviceNotFound {
                device: device.clone(),
            });
        }
    }

    if request.is_multi_hop() {
        let depth = request.depth.unwrap_or(DEFAULT_DEPTH);
        return Ok(Selection {
            center: center.clone(),
            links: reachable_links(graph, request, depth)?,
            truncated: 0,
        });
    }

    let (aggregated, mut physical): (Vec<Link>, Vec<Link>) = graph
        .links_touching(center)?
        .into_iter()
        .filter(|l| request.allows(l))
        .partition(|l| l.link_type == LinkType::Aggregated);

    let mut truncated = 0;
    if physical.len() > request.max_phy_links {
        truncated = physical.len() - request.max_phy_links;
        tracing::warn!(
            device = %center,
            physical = physical.len(),
            max = request.max_phy_links,
            "too many physical links, truncating"
        );
        physical.truncate(request.max_phy_links);
    }
    if aggregated.is_empty() && physical.is_empty() {
        tracing::warn!(device = %center, "no links to export");
    }

    let mut links = aggregated;
    links.extend(physical);
    Ok(Selection {
        center: center.clone(),
        links,
        truncated,
    })
}

/// Breadth-first walk from the seeds, following allowed links up to `depth`
/// hops, collecting every allowed link of every device reached.
///
/// The same cable reported from both ends is two links and is kept twice.
fn reachable_links(
    graph: &dyn GraphReader,
    request: &ExportRequest,
    depth: usize,
) -> ExportResult<Vec<Link>> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    // Keyed by id so the union keeps insertion order.
    let mut collected: BTreeMap<u64, Link> = BTreeMap::new();

    for seed in &request.devices {
        if visited.insert(seed.clone()) {
            queue.push_back((seed.clone(), 0));
        }
    }

    while let Some((device, hops)) = queue.pop_front() {
        for link in graph.links_touching(&device)? {
            if !request.allows(&link) {
                continue;
            }
            let peer = link.key.peer_of(&device).to_string();
            collected.entry(link.id).or_insert(link);
            if hops < depth && visited.insert(peer.clone()) {
                queue.push_back((peer, hops + 1));
            }
        }
    }

    tracing::debug!(devices = visited.len(), links = collected.len(), "multi-hop selection");
    Ok(collected.into_values().collect())
}

/// How a node is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Center,
    Firewall,
    Unknown,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    /// Name as stored, or [`UNKNOWN_NODE`] for placeholders.
    pub label: String,
    pub role: NodeRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub src: String,
    pub dst: String,
    pub label: String,
    pub link_type: LinkType,
    pub confidence: Confidence,
}

/// Renderer input: nodes ordered by identifier, edges in selection order.
#[derive(Debug, Clone, Default)]
pub struct TopologyView {
    pub center: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl TopologyView {
    pub fn build(selection: &Selection) -> Self {
        let mut ids = NodeIds::default();
        let center_id = ids.id_for(&selection.center);

        let mut edges = Vec::with_capacity(selection.links.len());
        for link in &selection.links {
            if link.confidence == Confidence::Ignore {
                continue;
            }
            let key = &link.key;
            let label = match link.link_type {
                LinkType::Aggregated => format!(
                    "{}⇄{}",
                    abbreviate(&key.src_interface),
                    abbreviate(&key.dst_interface)
                ),
                LinkType::Physical => abbreviate(&key.src_interface),
            };
            edges.push(Edge {
                src: ids.id_for(&key.src_device),
                dst: ids.id_for(&key.dst_device),
                label,
                link_type: link.link_type,
                confidence: link.confidence,
            });
        }

        let mut nodes: Vec<Node> = ids
            .assigned
            .into_iter()
            .map(|(raw, id)| {
                let role = if id == center_id {
                    NodeRole::Center
                } else if raw.is_empty() {
                    NodeRole::Unknown
                } else if raw.contains("FW") || raw.contains("USG") {
                    NodeRole::Firewall
                } else {
                    NodeRole::Normal
                };
                let label = if raw.is_empty() {
                    UNKNOWN_NODE.to_string()
                } else {
                    raw
                };
                Node { id, label, role }
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        Self {
            center: center_id,
            nodes,
            edges,
        }
    }
}

/// Strip a device name down to `[A-Za-z0-9_]`, collapsing and trimming
/// underscores, and make sure it starts with a letter.
pub fn sanitize_id(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' && (out.is_empty() || out.ends_with('_')) {
            continue;
        }
        out.push(c);
    }
    let out = out.trim_end_matches('_');
    if out.is_empty() {
        UNKNOWN_NODE.to_string()
    } else if out.starts_with(|c: char| c.is_ascii_alphabetic()) {
        out.to_string()
    } else {
        format!("Device_{out}")
    }
}

/// Assigns each distinct device name its own identifier. When two names
/// sanitize to the same identifier, later ones get `_2`, `_3`, ... in order
/// of first appearance. All placeholder names share one node.
#[derive(Debug, Default)]
pub struct NodeIds {
    assigned: HashMap<String, String>,
    taken: HashSet<String>,
}

impl NodeIds {
    pub fn id_for(&mut self, name: &str) -> String {
        let raw = if is_placeholder_name(name) {
            String::new()
        } else {
            name.to_string()
        };
        if let Some(id) = self.assigned.get(&raw) {
            return id.clone();
        }

        let base = if raw.is_empty() {
            UNKNOWN_NODE.to_string()
        } else {
            sanitize_id(&raw)
        };
        let mut id = base.clone();
        let mut n = 2;
        while self.taken.contains(&id) {
            id = format!("{base}_{n}");
            n += 1;
        }
        if id != base {
            tracing::debug!(device = %raw, id = %id, "diagram identifier collision");
        }
        self.taken.insert(id.clone());
        self.assigned.insert(raw, id.clone());
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Device, LinkKey};
    use crate::store::{GraphWriter, TopoStore};

    fn link(src: &str, sif: &str, dst: &str, dif: &str) -> Link {
        Link::new(LinkKey::new(src, sif, dst, dif), LinkType::Physical)
    }

    fn chain() -> TopoStore {
        // Core - Dist - Access, plus an ignored Core - Lab link.
        let store = TopoStore::memory().unwrap();
        let mut w = store.write().unwrap();
        w.upsert_device(&Device::new("Core")).unwrap();
        w.upsert_link(&link("Core", "GigabitEthernet1/0/1", "Dist", "GigabitEthernet0/0/1"))
            .unwrap();
        w.upsert_link(&link("Dist", "GigabitEthernet0/0/2", "Access", "GigabitEthernet0/0/48"))
            .unwrap();
        w.upsert_link(
            &link("Core", "GigabitEthernet1/0/9", "Lab", "GigabitEthernet0/0/1")
                .with_confidence(Confidence::Ignore),
        )
        .unwrap();
        w.upsert_link(
            &Link::new(
                LinkKey::new("Core", "Eth-Trunk1", "Dist", "Eth-Trunk1"),
                LinkType::Aggregated,
            )
            .with_confidence(Confidence::Suspect),
        )
        .unwrap();
        w.commit().unwrap();
        store
    }

    #[test]
    fn sanitizing() {
        assert_eq!(sanitize_id("Switch-A"), "Switch_A");
        assert_eq!(sanitize_id("Core  #1.."), "Core_1");
        assert_eq!(sanitize_id("10.0.0.1"), "Device_10_0_0_1");
        assert_eq!(sanitize_id("---"), UNKNOWN_NODE);
        assert_eq!(sanitize_id("核心"), UNKNOWN_NODE);
    }

    #[test]
    fn collisions_get_suffixes() {
        let mut ids = NodeIds::default();
        assert_eq!(ids.id_for("Switch-A"), "Switch_A");
        assert_eq!(ids.id_for("Switch.A"), "Switch_A_2");
        assert_eq!(ids.id_for("Switch A"), "Switch_A_3");
        assert_eq!(ids.id_for("Switch-A"), "Switch_A");
        assert_eq!(ids.id_for("-"), UNKNOWN_NODE);
        assert_eq!(ids.id_for(""), UNKNOWN_NODE);
        assert_eq!(ids.id_for("Unknown"), "Unknown_2");
    }

    #[test]
    fn single_device_selection() {
        let store = chain();
        let r = store.read().unwrap();
        let sel = select(&r, &ExportRequest::device("Core")).unwrap();
        assert_eq!(sel.links.len(), 2);
        assert_eq!(sel.links[0].link_type, LinkType::Aggregated);
        assert!(sel.links.iter().all(|l| l.confidence != Confidence::Ignore));
    }

    #[test]
    fn ignore_never_selected_even_when_whitelisted() {
        let store = chain();
        let r = store.read().unwrap();
        let req = ExportRequest::device("Core").with_confidence(Confidence::ALL);
        let sel = select(&r, &req).unwrap();
        assert!(sel.links.iter().all(|l| l.key.dst_device != "Lab"));
        let diagram = export(&r, &req).unwrap();
        assert!(!diagram.text.contains("Lab"));
    }

    #[test]
    fn whitelist_filters_suspect() {
        let store = chain();
        let r = store.read().unwrap();
        let req = ExportRequest::device("Core").with_confidence([Confidence::Trusted]);
        let sel = select(&r, &req).unwrap();
        assert_eq!(sel.links.len(), 1);
        assert_eq!(sel.links[0].link_type, LinkType::Physical);
    }

    #[test]
    fn physical_cap_keeps_aggregated() {
        let store = TopoStore::memory().unwrap();
        let mut w = store.write().unwrap();
        for i in 0..5 {
            w.upsert_link(&link("Core", &format!("GigabitEthernet1/0/{i}"), &format!("Sw{i}"), "GE0/0/1"))
                .unwrap();
        }
        w.upsert_link(&Link::new(
            LinkKey::new("Core", "Eth-Trunk2", "Sw9", "Eth-Trunk2"),
            LinkType::Aggregated,
        ))
        .unwrap();
        w.commit().unwrap();

        let r = store.read().unwrap();
        let sel = select(&r, &ExportRequest::device("Core").with_max_phy_links(3)).unwrap();
        assert_eq!(sel.truncated, 2);
        assert_eq!(sel.links.len(), 4);
        assert_eq!(sel.links[0].key.dst_device, "Sw9");
        assert_eq!(sel.links[1].key.dst_device, "Sw0");
        assert_eq!(sel.links[3].key.dst_device, "Sw2");
    }

    #[test]
    fn multi_hop_respects_depth() {
        let store = chain();
        let r = store.read().unwrap();

        let zero = select(&r, &ExportRequest::device("Core").with_depth(0)).unwrap();
        let one = select(&r, &ExportRequest::device("Core").with_depth(1)).unwrap();
        assert_eq!(zero.links.len(), 2);
        assert_eq!(one.links.len(), 3);
        assert!(one.links.iter().any(|l| l.key.dst_device == "Access"));
        // Insertion order.
        assert!(one.links.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn unknown_device_is_an_error() {
        let store = chain();
        let r = store.read().unwrap();
        assert!(matches!(
            select(&r, &ExportRequest::device("Nope")),
            Err(ExportError::DeviceNotFound { .. })
        ));
        assert!(matches!(
            select(&r, &ExportRequest::devices(Vec::new())),
            Err(ExportError::NoSeeds)
        ));
        // Seen only as a neighbor is enough.
        assert!(select(&r, &ExportRequest::device("Access")).is_ok());
    }

    #[test]
    fn view_labels_and_roles() {
        let store = chain();
        let r = store.read().unwrap();
        let sel = select(&r, &ExportRequest::device("Core")).unwrap();
        let view = TopologyView::build(&sel);
        assert_eq!(view.center, "Core");
        assert_eq!(view.nodes.len(), 2);
        let core = view.nodes.iter().find(|n| n.id == "Core").unwrap();
        assert_eq!(core.role, NodeRole::Center);
        assert_eq!(view.edges[0].label, "Eth-Trunk1⇄Eth-Trunk1");
        assert_eq!(view.edges[1].label, "Gi1/0/1");
    }

    #[test]
    fn format_names() {
        assert_eq!("MD".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!(ExportFormat::Dot.extension(), "dot");
        assert!("svg".parse::<ExportFormat>().is_err());
    }
}
