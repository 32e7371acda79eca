//! `display stp brief` output.

use super::{TableRows, has_keywords};
use crate::canon::canonical;

pub const HEADER_KEYWORD: &str = "Port";
pub const HEADER_COLUMNS: &[&str] = &["Role", "State"];
pub const MIN_FIELDS: usize = 3;

/// States in which a port does not forward traffic.
pub const BLOCKING_STATES: &[&str] = &["discarding", "blocked", "blocking"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StpPort {
    /// Spanning-tree instance, when the output has an instance column.
    pub instance: Option<u32>,
    pub interface: String,
    pub role: String,
    pub state: String,
}

impl StpPort {
    pub fn is_blocking(&self) -> bool {
        BLOCKING_STATES
            .iter()
            .any(|s| self.state.eq_ignore_ascii_case(s))
    }
}

fn is_header(line: &str) -> bool {
    has_keywords(line, &[HEADER_KEYWORD], HEADER_COLUMNS)
}

/// Parse the port table. A purely numeric first column is taken as the
/// instance id and shifts the remaining fields right by one.
pub fn parse(text: &str) -> impl Iterator<Item = StpPort> + '_ {
    TableRows::new(text, is_header).filter_map(|row| {
        let cols = row.columns();
        if cols.len() < MIN_FIELDS {
            tracing::trace!(line = row.text, "dropping short stp row");
            return None;
        }
        let instance = cols[0]
            .chars()
            .all(|c| c.is_ascii_digit())
            .then(|| cols[0].parse().ok())
            .flatten();
        let offset = usize::from(instance.is_some());
        Some(StpPort {
            instance,
            interface: canonical(cols[offset]),
            role: cols.get(offset + 1).copied().unwrap_or("UNKN").to_string(),
            state: cols.get(offset + 2).copied().unwrap_or("Unknown").to_string(),
        })
    })
}

/// Interfaces of ports in a blocking state, in input order.
pub fn blocked_ports<'a>(ports: impl IntoIterator<Item = &'a StpPort>) -> Vec<String> {
    ports
        .into_iter()
        .filter(|p| p.is_blocking())
        .map(|p| p.interface.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_instance_column() {
        let text = "\
 MSTID  Port                        Role  STP State     Protection
   0    GigabitEthernet1/0/1        DESI  FORWARDING      NONE
   0    GE1/0/2                     ALTE  DISCARDING      NONE
";
        let ports: Vec<_> = parse(text).collect();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].instance, Some(0));
        assert_eq!(ports[0].interface, "GigabitEthernet1/0/1");
        assert_eq!(ports[0].role, "DESI");
        assert_eq!(ports[0].state, "FORWARDING");
        assert_eq!(ports[1].interface, "GigabitEthernet1/0/2");
        assert!(ports[1].is_blocking());
    }

    #[test]
    fn without_instance_column() {
        let text = "\
Port                        Role  State
GigabitEthernet1/6/0/21     DESI  Forwarding
Eth-Trunk6                  ROOT  Blocked
";
        let ports: Vec<_> = parse(text).collect();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].instance, None);
        assert_eq!(ports[1].interface, "Eth-Trunk6");
        assert_eq!(ports[1].state, "Blocked");
    }

    #[test]
    fn missing_state_defaults() {
        let text = "MSTID  Port  Role\n0  GE1/0/9  DESI\n";
        let ports: Vec<_> = parse(text).collect();
        assert_eq!(ports[0].state, "Unknown");
        assert!(!ports[0].is_blocking());
    }

    #[test]
    fn blocked_port_listing() {
        let text = "\
 MSTID  Port                        Role  State
 0      GigabitEthernet1/6/0/21     DESI  Forwarding
 0      GigabitEthernet1/6/0/22     ALTE  Discarding
 0      Eth-Trunk6                  ROOT  Forwarding
 0      XGE1/0/1                    DESI  Blocked
 0      XGE1/0/2                    BACK  blocking
";
        let ports: Vec<_> = parse(text).collect();
        assert_eq!(
            blocked_ports(&ports),
            vec![
                "GigabitEthernet1/6/0/22",
                "XGigabitEthernet1/0/1",
                "XGigabitEthernet1/0/2"
            ]
        );
    }
}
