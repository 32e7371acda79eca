//! Mermaid flowchart rendering.

use std::fmt::Write;

use super::{NodeRole, TopologyView};
use crate::model::{Confidence, LinkType};

const CLASS_DEFS: &[&str] = &[
    "classDef center fill:#1890ff,stroke:#0050b3,stroke-width:4px,color:#fff",
    "classDef firewall fill:#faad14,stroke:#d48806,stroke-width:3px,color:#000",
    "classDef normal fill:#f0f5ff,stroke:#69c0ff,stroke-width:2px,color:#000",
    "classDef unknown fill:#f5f5f5,stroke:#d9d9d9,stroke-width:2px,stroke-dasharray: 5 5,color:#8c8c8c",
];

const AGGREGATED_STYLE: &str = "stroke:#52c41a,stroke-width:4px";
const SUSPECT_STYLE: &str = "stroke:#ff4d4f,stroke-width:2px,stroke-dasharray: 5 5";

fn escape(label: &str) -> String {
    label.replace('"', "#quot;")
}

fn arrow(link_type: LinkType, confidence: Confidence) -> &'static str {
    match (link_type, confidence) {
        (_, Confidence::Suspect) => "-.->",
        (LinkType::Aggregated, _) => "==>",
        _ => "-->",
    }
}

/// Render `view` as a `graph TB` flowchart.
pub fn render(view: &TopologyView) -> String {
    let mut out = String::from("graph TB\n\n");

    out.push_str("    %% devices\n");
    for node in &view.nodes {
        let label = escape(&node.label);
        let _ = match node.role {
            NodeRole::Center => writeln!(out, "    {}{{{{\"{label}\"}}}}:::center", node.id),
            NodeRole::Firewall => writeln!(out, "    {}{{\"{label}\"}}:::firewall", node.id),
            NodeRole::Unknown => writeln!(out, "    {}[\"{label}\"]:::unknown", node.id),
            NodeRole::Normal => writeln!(out, "    {}(\"{label}\"):::normal", node.id),
        };
    }

    out.push_str("\n    %% links\n");
    let mut aggregated = Vec::new();
    let mut suspect = Vec::new();
    for (i, edge) in view.edges.iter().enumerate() {
        let _ = writeln!(
            out,
            "    {} {}|\"{}\"| {}",
            edge.src,
            arrow(edge.link_type, edge.confidence),
            escape(&edge.label),
            edge.dst
        );
        if edge.confidence == Confidence::Suspect {
            suspect.push(i.to_string());
        } else if edge.link_type == LinkType::Aggregated {
            aggregated.push(i.to_string());
        }
    }

    out.push_str("\n    %% styles\n");
    for def in CLASS_DEFS {
        let _ = writeln!(out, "    {def}");
    }
    if !aggregated.is_empty() {
        let _ = writeln!(out, "    linkStyle {} {AGGREGATED_STYLE}", aggregated.join(","));
    }
    if !suspect.is_empty() {
        let _ = writeln!(out, "    linkStyle {} {SUSPECT_STYLE}", suspect.join(","));
    }
    out
}

/// Render `view` as a markdown document holding one mermaid block.
pub fn render_markdown(view: &TopologyView) -> String {
    format!(
        "# {} topology\n\n```mermaid\n{}```\n",
        view.center,
        render(view)
    )
}
