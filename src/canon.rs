//! Interface name canonicalization.
//!
//! Switch output mixes abbreviated and full interface spellings (`GE1/0/1`,
//! `GigabitEthernet1/0/1`, `XGE 1/0/1`, `eth-trunk6`). Every parser runs its
//! interface-shaped columns through [`canonical`] so that the store only ever
//! sees one spelling per port.
//!
//! Rules are applied in order. Longer prefixes come before the shorter ones
//! they would otherwise shadow (`XGE` before `GE`).

/// Abbreviation → full form. An abbreviation only expands when a digit
/// follows it, so vendor spellings such as `gei-0/4/0/20` are left alone.
pub const EXPANSIONS: &[(&str, &str)] = &[
    ("XGE", "XGigabitEthernet"),
    ("GE", "GigabitEthernet"),
    ("Te", "TenGigabitEthernet"),
];

/// Canonical prefix of link-aggregation interfaces.
pub const AGGREGATE_PREFIX: &str = "Eth-Trunk";

/// Full form → short display label, longest first.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("XGigabitEthernet", "XGi"),
    ("TenGigabitEthernet", "10Gi"),
    ("Ten-GigabitEthernet", "10Gi"),
    ("GigabitEthernet", "Gi"),
];

/// Map a raw interface token to its canonical spelling.
///
/// Idempotent: `canonical(&canonical(x)) == canonical(x)`.
pub fn canonical(raw: &str) -> String {
    let mut name: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if name.is_empty() {
        return name;
    }

    for (short, full) in EXPANSIONS {
        if let Some(rest) = strip_prefix_ignore_case(&name, short) {
            if rest.starts_with(|c: char| c.is_ascii_digit()) {
                name = format!("{full}{rest}");
                break;
            }
        }
    }

    if let Some(rest) = strip_prefix_ignore_case(&name, AGGREGATE_PREFIX) {
        name = format!("{AGGREGATE_PREFIX}{rest}");
    }

    name.replace('\\', "/")
}

/// Whether the interface is a link-aggregation group.
pub fn is_aggregate(name: &str) -> bool {
    canonical(name).starts_with(AGGREGATE_PREFIX)
}

/// Numeric group id of an aggregation interface (`Eth-Trunk6` → 6).
pub fn aggregate_id(name: &str) -> Option<u32> {
    let name = canonical(name);
    let rest = name.strip_prefix(AGGREGATE_PREFIX)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Short label for diagrams (`GigabitEthernet1/0/1` → `Gi1/0/1`).
pub fn abbreviate(name: &str) -> String {
    for (full, short) in ABBREVIATIONS {
        if let Some(rest) = name.strip_prefix(full) {
            return format!("{short}{rest}");
        }
    }
    name.to_string()
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_abbreviations() {
        assert_eq!(canonical("GE1/0/1"), "GigabitEthernet1/0/1");
        assert_eq!(canonical("XGE2/0/10"), "XGigabitEthernet2/0/10");
        assert_eq!(canonical("Te0/52"), "TenGigabitEthernet0/52");
        assert_eq!(canonical("ge1/6/0/21"), "GigabitEthernet1/6/0/21");
    }

    #[test]
    fn strips_embedded_whitespace() {
        assert_eq!(canonical("XGE 1/0/1"), "XGigabitEthernet1/0/1");
        assert_eq!(canonical(" GE 1/0/0 "), "GigabitEthernet1/0/0");
    }

    #[test]
    fn aggregation_prefix_capitalization() {
        assert_eq!(canonical("Eth-Trunk1"), "Eth-Trunk1");
        assert_eq!(canonical("eth-trunk6"), "Eth-Trunk6");
        assert_eq!(canonical("ETH-TRUNK10"), "Eth-Trunk10");
    }

    #[test]
    fn unifies_separators() {
        assert_eq!(canonical("GE1\\0\\1"), "GigabitEthernet1/0/1");
    }

    #[test]
    fn leaves_full_and_foreign_names_alone() {
        assert_eq!(canonical("GigabitEthernet1/0/1"), "GigabitEthernet1/0/1");
        assert_eq!(canonical("TenGigabitEthernet0/52"), "TenGigabitEthernet0/52");
        assert_eq!(canonical("gei-0/4/0/20"), "gei-0/4/0/20");
        assert_eq!(canonical("MEth0/0/1"), "MEth0/0/1");
        assert_eq!(canonical(""), "");
        assert_eq!(canonical("   "), "");
    }

    #[test]
    fn idempotent() {
        let inputs = [
            "GE1/0/1",
            "XGE 1/0/1",
            "Te0/52",
            "eth-trunk6",
            "GigabitEthernet1/0/1",
            "XGigabitEthernet2/0/10",
            "gei-0/4/0/20",
            "Vlanif100",
            "GE1\\0\\3",
            "",
        ];
        for raw in inputs {
            let once = canonical(raw);
            assert_eq!(canonical(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn aggregate_helpers() {
        assert!(is_aggregate("eth-trunk6"));
        assert!(!is_aggregate("GE1/0/0"));
        assert_eq!(aggregate_id("Eth-Trunk6"), Some(6));
        assert_eq!(aggregate_id("eth-trunk10"), Some(10));
        assert_eq!(aggregate_id("GE1/0/1"), None);
    }

    #[test]
    fn abbreviates_for_labels() {
        assert_eq!(abbreviate("GigabitEthernet1/6/0/3"), "Gi1/6/0/3");
        assert_eq!(abbreviate("TenGigabitEthernet0/52"), "10Gi0/52");
        assert_eq!(abbreviate("XGigabitEthernet1/0/1"), "XGi1/0/1");
        assert_eq!(abbreviate("Eth-Trunk6"), "Eth-Trunk6");
    }
}
