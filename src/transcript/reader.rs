//! Byte-level decoding of captured transcripts.
//!
//! Captures come from terminal emulators on whatever workstation the operator
//! used, so the same command output may arrive as UTF-8 (with or without a
//! byte-order mark), UTF-16, UTF-32, or a national single/double-byte code
//! page. Decoding never fails: when nothing fits, a permissive single-byte
//! decode is used and a warning is logged if replacement characters appear.

use std::borrow::Cow;

use encoding_rs::{GBK, UTF_16BE, UTF_16LE, WINDOWS_1252};

/// Default ceiling for a single transcript (100 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 100 * 1024 * 1024;

/// Encoding a transcript was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    Gbk,
    /// Permissive single-byte fallback.
    Latin1,
}

impl TextEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf8Bom => "utf-8-sig",
            Self::Utf16Le => "utf-16-le",
            Self::Utf16Be => "utf-16-be",
            Self::Utf32Le => "utf-32-le",
            Self::Utf32Be => "utf-32-be",
            Self::Gbk => "gbk",
            Self::Latin1 => "latin-1",
        }
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded transcript text.
#[derive(Debug, Clone)]
pub struct DecodedText<'a> {
    pub text: Cow<'a, str>,
    pub encoding: TextEncoding,
    /// Whether U+FFFD replacement characters were introduced.
    pub lossy: bool,
}

/// Pick an encoding from the byte-order mark, if any.
///
/// Four-byte marks are checked first: the UTF-32 LE mark begins with the
/// UTF-16 LE one.
pub fn detect_bom(bytes: &[u8]) -> Option<(TextEncoding, usize)> {
    if bytes.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        Some((TextEncoding::Utf32Le, 4))
    } else if bytes.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) {
        Some((TextEncoding::Utf32Be, 4))
    } else if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some((TextEncoding::Utf8Bom, 3))
    } else if bytes.starts_with(&[0xFF, 0xFE]) {
        Some((TextEncoding::Utf16Le, 2))
    } else if bytes.starts_with(&[0xFE, 0xFF]) {
        Some((TextEncoding::Utf16Be, 2))
    } else {
        None
    }
}

/// Decode raw transcript bytes.
///
/// Order: byte-order mark, strict UTF-8, strict GBK, permissive single-byte.
pub fn decode(bytes: &[u8]) -> DecodedText<'_> {
    let decoded = match detect_bom(bytes) {
        Some((encoding, skip)) => decode_marked(&bytes[skip..], encoding),
        None => decode_unmarked(bytes),
    };

    if decoded.lossy {
        tracing::warn!(
            encoding = %decoded.encoding,
            "transcript contains undecodable bytes, replaced with U+FFFD"
        );
    }
    decoded
}

fn decode_marked(body: &[u8], encoding: TextEncoding) -> DecodedText<'_> {
    let (text, lossy) = match encoding {
        TextEncoding::Utf8Bom => match String::from_utf8_lossy(body) {
            Cow::Borrowed(s) => (Cow::Borrowed(s), false),
            Cow::Owned(s) => (Cow::Owned(s), true),
        },
        TextEncoding::Utf16Le => {
            let (text, had_errors) = UTF_16LE.decode_without_bom_handling(body);
            (text, had_errors)
        }
        TextEncoding::Utf16Be => {
            let (text, had_errors) = UTF_16BE.decode_without_bom_handling(body);
            (text, had_errors)
        }
        TextEncoding::Utf32Le => decode_utf32(body, u32::from_le_bytes),
        TextEncoding::Utf32Be => decode_utf32(body, u32::from_be_bytes),
        // Not produced by detect_bom.
        TextEncoding::Utf8 | TextEncoding::Gbk | TextEncoding::Latin1 => {
            return decode_unmarked(body);
        }
    };
    DecodedText {
        text,
        encoding,
        lossy,
    }
}

fn decode_unmarked(bytes: &[u8]) -> DecodedText<'_> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return DecodedText {
            text: Cow::Borrowed(text),
            encoding: TextEncoding::Utf8,
            lossy: false,
        };
    }

    if let Some(text) = GBK.decode_without_bom_handling_and_without_replacement(bytes) {
        return DecodedText {
            text,
            encoding: TextEncoding::Gbk,
            lossy: false,
        };
    }

    tracing::debug!("neither UTF-8 nor GBK fits, falling back to single-byte decoding");
    let (text, had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
    DecodedText {
        text,
        encoding: TextEncoding::Latin1,
        lossy: had_errors,
    }
}

fn decode_utf32(body: &[u8], read: fn([u8; 4]) -> u32) -> (Cow<'static, str>, bool) {
    let mut lossy = body.len() % 4 != 0;
    let mut out = String::with_capacity(body.len() / 4);
    for chunk in body.chunks_exact(4) {
        let unit = read([chunk[0], chunk[1], chunk[2], chunk[3]]);
        match char::from_u32(unit) {
            Some(c) => out.push(c),
            None => {
                out.push(char::REPLACEMENT_CHARACTER);
                lossy = true;
            }
        }
    }
    if body.len() % 4 != 0 {
        out.push(char::REPLACEMENT_CHARACTER);
    }
    (Cow::Owned(out), lossy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(s: &str, bom: bool) -> Vec<u8> {
        let mut out = if bom { vec![0xFF, 0xFE] } else { Vec::new() };
        for unit in s.encode_utf16() {
            out.extend_from_slice(&unit.to_le_bytes());
        }
        out
    }

    #[test]
    fn plain_utf8() {
        let decoded = decode("<Core>display version\n".as_bytes());
        assert_eq!(decoded.encoding, TextEncoding::Utf8);
        assert_eq!(decoded.text, "<Core>display version\n");
        assert!(!decoded.lossy);
    }

    #[test]
    fn utf8_with_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"<Core>display stp brief");
        let decoded = decode(&bytes);
        assert_eq!(decoded.encoding, TextEncoding::Utf8Bom);
        assert_eq!(decoded.text, "<Core>display stp brief");
    }

    #[test]
    fn utf16_le_with_bom() {
        let bytes = utf16le("[~Core]display eth-trunk", true);
        let decoded = decode(&bytes);
        assert_eq!(decoded.encoding, TextEncoding::Utf16Le);
        assert_eq!(decoded.text, "[~Core]display eth-trunk");
        assert!(!decoded.lossy);
    }

    #[test]
    fn utf16_be_with_bom() {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in "GE1/0/1".encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        let decoded = decode(&bytes);
        assert_eq!(decoded.encoding, TextEncoding::Utf16Be);
        assert_eq!(decoded.text, "GE1/0/1");
    }

    #[test]
    fn utf32_le_is_not_mistaken_for_utf16() {
        let mut bytes = vec![0xFF, 0xFE, 0x00, 0x00];
        for c in "up".chars() {
            bytes.extend_from_slice(&(c as u32).to_le_bytes());
        }
        let decoded = decode(&bytes);
        assert_eq!(decoded.encoding, TextEncoding::Utf32Le);
        assert_eq!(decoded.text, "up");
    }

    #[test]
    fn gbk_description_column() {
        // "接入" (access) in GBK.
        let mut bytes = b"GE1/0/1  up  up  ".to_vec();
        bytes.extend_from_slice(&[0xBD, 0xD3, 0xC8, 0xEB]);
        let decoded = decode(&bytes);
        assert_eq!(decoded.encoding, TextEncoding::Gbk);
        assert!(decoded.text.ends_with("接入"));
    }

    #[test]
    fn permissive_fallback_never_fails() {
        // 0x80 0xFF is invalid in both UTF-8 and GBK.
        let bytes = [b'u', b'p', 0x80, 0xFF];
        let decoded = decode(&bytes);
        assert_eq!(decoded.encoding, TextEncoding::Latin1);
        assert!(decoded.text.starts_with("up"));
        assert_eq!(decoded.text.chars().count(), 4);
    }
}
