//! Field parsers for command output.
//!
//! Each parser consumes the output text of one [`CommandBlock`] and yields a
//! lazy sequence of typed records. The tabular formats share one scanner,
//! [`TableRows`], which walks three states:
//!
//! 1. searching for a header line (recognized by keyword presence),
//! 2. skipping separator lines (runs of `-`, `=` and spaces),
//! 3. yielding data rows.
//!
//! Rows that do not fit the expected shape are dropped with a trace log.
//! Command output is noisy (paging markers, wrapped lines, banners) and a
//! partial parse is more useful than none.
//!
//! [`CommandBlock`]: crate::transcript::CommandBlock

pub mod iface;
pub mod lldp;
pub mod stp;
pub mod trunk;

use std::sync::LazyLock;

use regex::Regex;

pub use iface::InterfaceState;
pub use lldp::LldpNeighbor;
pub use stp::StpPort;
pub use trunk::TrunkGroup;

/// Separator line pattern shared by all tabular formats.
pub const SEPARATOR_PATTERN: &str = r"^[-=\s]+$";

/// Minimum whitespace run that separates two columns.
pub const COLUMN_GAP_PATTERN: &str = r"\s{2,}";

static RE_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(SEPARATOR_PATTERN).unwrap());
static RE_COLUMN_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(COLUMN_GAP_PATTERN).unwrap());

/// Whether `line` is a table rule such as `-----  ------` or `=====`.
pub fn is_separator(line: &str) -> bool {
    !line.trim().is_empty() && RE_SEPARATOR.is_match(line)
}

/// Split a row into columns on runs of two or more whitespace characters.
pub fn split_columns(line: &str) -> Vec<&str> {
    RE_COLUMN_GAP
        .split(line.trim())
        .filter(|col| !col.is_empty())
        .collect()
}

/// A data row together with the header that introduced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRow<'a> {
    pub header: &'a str,
    pub text: &'a str,
}

impl<'a> TableRow<'a> {
    pub fn columns(&self) -> Vec<&'a str> {
        split_columns(self.text)
    }
}

/// Header-detected → separator-skip → data-row scanner.
///
/// A second header inside the same output (repeated after a pager break)
/// is recognized again and replaces the current one.
pub struct TableRows<'a> {
    lines: std::str::Lines<'a>,
    is_header: fn(&str) -> bool,
    header: Option<&'a str>,
}

impl<'a> TableRows<'a> {
    pub fn new(text: &'a str, is_header: fn(&str) -> bool) -> Self {
        Self {
            lines: text.lines(),
            is_header,
            header: None,
        }
    }
}

impl<'a> Iterator for TableRows<'a> {
    type Item = TableRow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if (self.is_header)(trimmed) {
                self.header = Some(trimmed);
                continue;
            }
            let Some(header) = self.header else {
                tracing::trace!(line = trimmed, "dropping line before table header");
                continue;
            };
            if is_separator(line) {
                continue;
            }
            return Some(TableRow {
                header,
                text: trimmed,
            });
        }
    }
}

/// Whether `line` contains every keyword in `all` and at least one of `any`
/// (an empty `any` list matches).
pub(crate) fn has_keywords(line: &str, all: &[&str], any: &[&str]) -> bool {
    all.iter().all(|k| line.contains(k)) && (any.is_empty() || any.iter().any(|k| line.contains(k)))
}
