//! Splits a decoded transcript into command blocks.
//!
//! A block starts at a prompt line such as `<Core>display lldp neighbor brief`,
//! `[Core]display eth-trunk` or `[~Core]display stp brief` and runs until the
//! next prompt line or the end of the transcript.

use std::sync::LazyLock;

use regex::Regex;

/// Command verbs that open a block. Matched case-insensitively.
pub const COMMAND_VERBS: &[&str] = &["display"];

static RE_PROMPT: LazyLock<Regex> = LazyLock::new(|| {
    let verbs = COMMAND_VERBS.join("|");
    Regex::new(&format!(
        r"(?im)^[ \t]*[<\[]~?[\w.\-]+[>\]][ \t]*((?:{verbs})\b[^\r\n]*)"
    ))
    .unwrap()
});

/// One command and the text it printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandBlock<'a> {
    pub command: &'a str,
    pub output: &'a str,
}

/// Split `text` into blocks, in transcript order.
///
/// A transcript without any recognized prompt yields no blocks.
pub fn split_blocks(text: &str) -> Vec<CommandBlock<'_>> {
    let prompts: Vec<_> = RE_PROMPT.captures_iter(text).collect();
    let mut blocks = Vec::with_capacity(prompts.len());

    for (i, caps) in prompts.iter().enumerate() {
        let (Some(whole), Some(command)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = prompts
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        blocks.push(CommandBlock {
            command: command.as_str().trim(),
            output: trim_blank_lines(&text[whole.end()..end]),
        });
    }

    blocks
}

/// Drop leading blank lines and trailing whitespace, keeping the indentation
/// of the first non-blank line.
fn trim_blank_lines(s: &str) -> &str {
    let mut start = 0;
    for line in s.split_inclusive('\n') {
        if line.trim().is_empty() {
            start += line.len();
        } else {
            break;
        }
    }
    s[start..].trim_end()
}
