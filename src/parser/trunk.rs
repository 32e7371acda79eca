//! `display eth-trunk` output.
//!
//! Two layouts are understood. The brief one puts the whole group on one
//! header line:
//!
//! ```text
//! Eth-Trunk6   NORMAL   1   1000M(a)  1000M(a)  up
//!   Port Status
//!   GE1/6/0/19    Product: GigabitEthernet     Status: up
//! ```
//!
//! The verbose one spreads it over labelled lines:
//!
//! ```text
//! Eth-Trunk1's state information is:
//! WorkingMode: LACP      Hash arithmetic: According to SIP-XOR-DIP
//! Operate status: up     Number Of Up Port In Trunk: 2
//! ----------------------------------------------------------------
//! PortName                      Status      Weight
//! GigabitEthernet1/0/1          Up          1
//! ```

use std::sync::LazyLock;

use regex::Regex;

use super::is_separator;
use crate::canon::canonical;
use crate::model::PortStatus;

/// Lines containing any of these switch the parser into member collection.
pub const MEMBER_MARKERS: &[&str] = &["Port Status", "PortName", "Member"];

static RE_BRIEF_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(Eth-Trunk\d+)\s+(\w+)\s+.*\s(up|down)\b").unwrap()
});
static RE_VERBOSE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(Eth-Trunk\d+)'s\s+state\s+information").unwrap()
});
static RE_WORKING_MODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)WorkingMode\s*:\s*(\S+)").unwrap());
static RE_OPERATE_STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Operate\s+status\s*:\s*(up|down)\b").unwrap());

/// An aggregation group and its member ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrunkGroup {
    pub name: String,
    pub mode: Option<String>,
    pub oper_status: Option<PortStatus>,
    /// Canonical member names, in output order, without duplicates.
    pub members: Vec<String>,
}

impl TrunkGroup {
    fn new(name: &str) -> Self {
        Self {
            name: canonical(name),
            mode: None,
            oper_status: None,
            members: Vec::new(),
        }
    }

    fn add_member(&mut self, raw: &str) {
        let name = canonical(raw);
        if !self.members.contains(&name) {
            self.members.push(name);
        }
    }
}

/// Whether the first token of `line` looks like a port name: a leading
/// letter and at least one digit.
pub fn looks_like_interface(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_alphabetic()) && token.contains(|c: char| c.is_ascii_digit())
}

/// Streaming group parser; a group is yielded when the next one starts or
/// the input ends.
pub struct TrunkParser<'a> {
    lines: std::str::Lines<'a>,
    current: Option<TrunkGroup>,
    in_members: bool,
}

impl<'a> TrunkParser<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            current: None,
            in_members: false,
        }
    }

    /// Start a new group, returning the one it replaces.
    fn open(&mut self, group: TrunkGroup) -> Option<TrunkGroup> {
        self.in_members = false;
        self.current.replace(group)
    }

    fn feed(&mut self, line: &str) -> Option<TrunkGroup> {
        if let Some(caps) = RE_BRIEF_HEADER.captures(line) {
            let mut group = TrunkGroup::new(&caps[1]);
            group.mode = Some(caps[2].to_ascii_uppercase());
            group.oper_status = PortStatus::parse(&caps[3]);
            return self.open(group);
        }
        if let Some(caps) = RE_VERBOSE_HEADER.captures(line) {
            return self.open(TrunkGroup::new(&caps[1]));
        }

        let group = self.current.as_mut()?;

        if let Some(caps) = RE_WORKING_MODE.captures(line) {
            group.mode = Some(caps[1].to_ascii_uppercase());
        }
        if let Some(caps) = RE_OPERATE_STATUS.captures(line) {
            group.oper_status = PortStatus::parse(&caps[1]);
        }
        if MEMBER_MARKERS.iter().any(|m| line.contains(m)) {
            self.in_members = true;
            return None;
        }
        if self.in_members && !is_separator(line) {
            match line.split_whitespace().next() {
                Some(token) if looks_like_interface(token) => group.add_member(token),
                _ => tracing::trace!(line, "dropping trunk member line"),
            }
        }
        None
    }
}

impl Iterator for TrunkParser<'_> {
    type Item = TrunkGroup;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(line) = self.lines.next() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(done) = self.feed(line) {
                return Some(done);
            }
        }
        self.current.take()
    }
}

/// Parse aggregation groups from `display eth-trunk` output.
pub fn parse(text: &str) -> TrunkParser<'_> {
    TrunkParser::new(text)
}
