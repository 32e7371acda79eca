//! `display lldp neighbor brief` output.

use super::{TableRow, TableRows, has_keywords, split_columns};
use crate::canon::canonical;

/// Any of these marks the brief table header.
pub const HEADER_KEYWORDS: &[&str] = &["Local Intf", "Local Int"];

/// Rows with fewer columns are dropped.
pub const MIN_FIELDS: usize = 3;

/// One row of the neighbor table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LldpNeighbor {
    pub local_interface: String,
    /// Reported system name, verbatim. `-` and empty are kept.
    pub neighbor_device: String,
    pub neighbor_interface: Option<String>,
    /// Expiry timer in seconds; `None` when the column is absent or not numeric.
    pub expiry: Option<u32>,
}

/// Column positions, derived from the header.
///
/// Firmware releases disagree on where `Exptime` sits: some print it last,
/// some right after the local interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    local: usize,
    device: usize,
    interface: usize,
    expiry: usize,
}

impl Layout {
    const DEFAULT: Self = Self {
        local: 0,
        device: 1,
        interface: 2,
        expiry: 3,
    };

    fn from_header(header: &str) -> Self {
        let cols = split_columns(header);
        let find = |needle: &str| {
            cols.iter()
                .position(|c| c.to_ascii_lowercase().contains(needle))
        };
        match (
            find("local"),
            find("neighbor dev"),
            find("neighbor int"),
            find("exptime"),
        ) {
            (Some(local), Some(device), Some(interface), Some(expiry)) => Self {
                local,
                device,
                interface,
                expiry,
            },
            _ => Self::DEFAULT,
        }
    }
}

fn is_header(line: &str) -> bool {
    HEADER_KEYWORDS.iter().any(|k| has_keywords(line, &[k], &[]))
}

fn parse_row(row: TableRow<'_>, layout: Layout) -> Option<LldpNeighbor> {
    let cols = row.columns();
    if cols.len() < MIN_FIELDS {
        tracing::trace!(line = row.text, "dropping short lldp row");
        return None;
    }
    let local_interface = canonical(cols.get(layout.local)?);
    if local_interface.is_empty() {
        return None;
    }

    Some(LldpNeighbor {
        local_interface,
        neighbor_device: cols.get(layout.device).map_or_else(String::new, |s| s.to_string()),
        neighbor_interface: cols
            .get(layout.interface)
            .map(|s| canonical(s))
            .filter(|s| !s.is_empty()),
        expiry: cols.get(layout.expiry).and_then(|s| s.parse().ok()),
    })
}

/// Neighbor rows of one output. The column layout is derived once per
/// header line and reused for the rows below it.
pub struct BriefParser<'a> {
    rows: TableRows<'a>,
    layout: Option<(&'a str, Layout)>,
}

impl<'a> BriefParser<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            rows: TableRows::new(text, is_header),
            layout: None,
        }
    }

    fn layout_for(&mut self, header: &'a str) -> Layout {
        match self.layout {
            Some((seen, layout)) if std::ptr::eq(seen, header) => layout,
            _ => {
                let layout = Layout::from_header(header);
                self.layout = Some((header, layout));
                layout
            }
        }
    }
}

impl Iterator for BriefParser<'_> {
    type Item = LldpNeighbor;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = self.rows.next()?;
            let layout = self.layout_for(row.header);
            if let Some(neighbor) = parse_row(row, layout) {
                return Some(neighbor);
            }
        }
    }
}

/// Parse the brief neighbor table.
pub fn parse_brief(text: &str) -> BriefParser<'_> {
    BriefParser::new(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRAILING_EXPTIME: &str = "\
Local Intf       Neighbor Dev             Neighbor Intf             Exptime(s)
-----------------------------------------------------------------------------
GE1/6/0/3        ZXR10                    gei-0/4/0/20              105
GE1/6/0/6        Ruijie                   Te0/52                    114
";

    const LEADING_EXPTIME: &str = "\
Local Intf    Exptime  Neighbor Dev            Neighbor Intf
GE1/6/0/21    101      Ruijie                  Te0/52
GE1/6/0/21    102      Huawei-Switch           GE0/0/0
XGE 1/0/1     120      Core_CSS                XGE1/0/2
";

    #[test]
    fn header_keywords() {
        assert!(is_header("Local Intf   Neighbor Dev"));
        assert!(is_header("Local Interface  Exptime"));
        assert!(!is_header("Interface  PHY  Protocol"));
        assert_eq!(MIN_FIELDS, 3);
    }

    #[test]
    fn trailing_exptime_layout() {
        let rows: Vec<_> = parse_brief(TRAILING_EXPTIME).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].local_interface, "GigabitEthernet1/6/0/3");
        assert_eq!(rows[0].neighbor_device, "ZXR10");
        assert_eq!(rows[0].neighbor_interface.as_deref(), Some("gei-0/4/0/20"));
        assert_eq!(rows[0].expiry, Some(105));
        assert_eq!(
            rows[1].neighbor_interface.as_deref(),
            Some("TenGigabitEthernet0/52")
        );
    }

    #[test]
    fn leading_exptime_layout() {
        let rows: Vec<_> = parse_brief(LEADING_EXPTIME).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].neighbor_device, "Ruijie");
        assert_eq!(rows[0].expiry, Some(101));
        assert_eq!(rows[1].neighbor_device, "Huawei-Switch");
        assert_eq!(
            rows[1].neighbor_interface.as_deref(),
            Some("GigabitEthernet0/0/0")
        );
        assert_eq!(rows[2].local_interface, "XGigabitEthernet1/0/1");
        assert_eq!(rows[2].neighbor_device, "Core_CSS");
    }

    #[test]
    fn layout_follows_each_header() {
        let text = format!("{TRAILING_EXPTIME}{LEADING_EXPTIME}");
        let mut parser = parse_brief(&text);

        let first = parser.next().unwrap();
        assert_eq!(first.expiry, Some(105));
        let (header, layout) = parser.layout.unwrap();
        assert_eq!(layout.expiry, 3);

        assert_eq!(parser.next().unwrap().neighbor_device, "Ruijie");
        assert!(std::ptr::eq(parser.layout.unwrap().0, header));

        // The second header switches to the leading-exptime layout.
        let third = parser.next().unwrap();
        assert_eq!(third.neighbor_device, "Ruijie");
        assert_eq!(third.expiry, Some(101));
        assert_eq!(parser.layout.unwrap().1.expiry, 1);
        assert_eq!(parser.count(), 2);
    }

    #[test]
    fn placeholder_names_and_bad_expiry_are_kept() {
        let text = "\
Local Intf    Neighbor Dev    Neighbor Intf    Exptime
GE1/0/1       -               -                n/a
GE1/0/2       Sw              GE0/0/1
";
        let rows: Vec<_> = parse_brief(text).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].neighbor_device, "-");
        assert_eq!(rows[0].neighbor_interface.as_deref(), Some("-"));
        assert_eq!(rows[0].expiry, None);
        assert_eq!(rows[1].expiry, None);
    }

    #[test]
    fn short_and_pre_header_lines_dropped() {
        let text = "\
Info: noise before the table
Local Intf    Neighbor Dev    Neighbor Intf    Exptime
GE1/0/1       only-two
  ---- More ----
GE1/0/3       Sw              GE0/0/3          90
";
        let rows: Vec<_> = parse_brief(text).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].local_interface, "GigabitEthernet1/0/3");
    }
}
