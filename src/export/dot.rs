//! Graphviz rendering, for tools that only read plain digraphs.

use std::fmt::Write;

use super::{NodeRole, TopologyView};
use crate::model::{Confidence, LinkType};

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Render `view` as a `digraph`.
pub fn render(view: &TopologyView) -> String {
    let mut out = String::from("digraph topology {\n    rankdir=LR;\n    node [shape=box];\n\n");

    for node in &view.nodes {
        let extra = match node.role {
            NodeRole::Center => ", peripheries=2",
            NodeRole::Firewall => ", shape=diamond",
            NodeRole::Unknown => ", style=dashed",
            NodeRole::Normal => "",
        };
        let _ = writeln!(out, "    {} [label={}{extra}];", node.id, quote(&node.label));
    }
    if !view.edges.is_empty() {
        out.push('\n');
    }

    for edge in &view.edges {
        let mut attrs = vec![format!("label={}", quote(&edge.label))];
        if edge.confidence == Confidence::Suspect {
            attrs.push("style=dashed".into());
        }
        if edge.link_type == LinkType::Aggregated {
            attrs.push("penwidth=2".into());
        }
        let _ = writeln!(out, "    {} -> {} [{}];", edge.src, edge.dst, attrs.join(", "));
    }

    out.push_str("}\n");
    out
}
