//! `display interface description` output.

use std::sync::LazyLock;

use regex::Regex;

use super::{TableRows, has_keywords};
use crate::canon::canonical;
use crate::model::PortStatus;

/// Required header keyword.
pub const HEADER_KEYWORD: &str = "Interface";
/// At least one of these must accompany [`HEADER_KEYWORD`].
pub const HEADER_COLUMNS: &[&str] = &["PHY", "Protocol"];

// Status columns are often separated by a single space, so rows are matched
// by shape rather than split on column gaps.
static RE_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([A-Za-z][\w\-/.:]+)\s+(\*?down|up)\s+(\*?down|up)(?:\s+(.*))?$").unwrap()
});

/// One interface row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceState {
    pub name: String,
    /// Physical state column.
    pub admin_status: PortStatus,
    /// Protocol state column.
    pub oper_status: PortStatus,
    /// May be empty.
    pub description: String,
}

fn is_header(line: &str) -> bool {
    has_keywords(line, &[HEADER_KEYWORD], HEADER_COLUMNS)
}

fn status(token: &str) -> Option<PortStatus> {
    // `*down` marks an administratively shut port.
    PortStatus::parse(token.trim_start_matches('*'))
}

/// Parse the interface table.
pub fn parse(text: &str) -> impl Iterator<Item = InterfaceState> + '_ {
    TableRows::new(text, is_header).filter_map(|row| {
        let Some(caps) = RE_ROW.captures(row.text) else {
            tracing::trace!(line = row.text, "dropping interface row");
            return None;
        };
        Some(InterfaceState {
            name: canonical(&caps[1]),
            admin_status: status(&caps[2])?,
            oper_status: status(&caps[3])?,
            description: caps.get(4).map_or("", |m| m.as_str()).trim().to_string(),
        })
    })
}
