//! Line tokenizer and field extractor
//!
//! Splits a raw line into its level, optional `:m"..."` message, optional
//! device timestamp and the remaining whitespace separated tokens.
//!
//! Extraction runs in a fixed order:
//!
//! 1. Level prefix (`[TAG]`, `TAG:` or `TAG `, ASCII case-insensitive)
//! 2. Message field, escape aware (`\"` and `\\`)
//! 3. First parseable `name:t=<int>` token
//! 4. What is left is split into field candidates (`name[:type]=value`)
//!    and residual words
//!
//! Nothing here fails: malformed input degrades to an INFO line whose
//! words all end up in the residual.

use crate::types::Level;

/// Marker that opens a message field
const MESSAGE_OPEN: &str = ":m\"";

/// Result of tokenizing one line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenizedLine {
    /// Detected level (INFO when no prefix matched)
    pub level: Level,
    /// Device timestamp from the first valid `:t=` token
    pub device_timestamp: Option<u32>,
    /// Unescaped message content, if a `:m"..."` field was present
    pub message: Option<String>,
    /// Tokens containing `=`, in line order
    pub field_tokens: Vec<String>,
    /// Tokens without `=`, in line order
    pub residual: Vec<String>,
}

impl TokenizedLine {
    /// Residual words joined back into a single string
    pub fn residual_text(&self) -> String {
        self.residual.join(" ")
    }
}

/// Tokenize a raw line (trailing newline already stripped)
pub fn tokenize(line: &str) -> TokenizedLine {
    let (level, rest) = split_level(line);
    let (message, rest) = match extract_message(rest) {
        Some((message, remaining)) => (Some(message), remaining),
        None => (None, rest.to_string()),
    };
    let (device_timestamp, tokens) = extract_timestamp(&rest);

    let (field_tokens, residual): (Vec<String>, Vec<String>) =
        tokens.into_iter().partition(|t| t.contains('='));

    TokenizedLine {
        level,
        device_timestamp,
        message,
        field_tokens,
        residual,
    }
}

/// Detect and strip a level prefix
///
/// Levels are tried in [`Level::ALL`] order and the first matching form wins.
/// Without a match the line is returned unchanged with level INFO.
pub fn split_level(line: &str) -> (Level, &str) {
    for level in Level::ALL {
        let tag = level.tag();
        let forms = [format!("[{tag}]"), format!("{tag}:"), format!("{tag} ")];
        for prefix in &forms {
            if starts_with_ignore_ascii_case(line, prefix) {
                return (level, line[prefix.len()..].trim());
            }
        }
    }
    (Level::Info, line)
}

fn starts_with_ignore_ascii_case(line: &str, prefix: &str) -> bool {
    line.len() >= prefix.len()
        && line.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Find the first well-formed `:m"..."` field
///
/// Returns the unescaped content and the line with the field removed (trimmed).
/// An opening marker without a closing quote is skipped and the search goes on.
pub fn extract_message(text: &str) -> Option<(String, String)> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(MESSAGE_OPEN) {
        let start = search_from + offset;
        let content_start = start + MESSAGE_OPEN.len();
        if let Some(content_len) = scan_quoted(&text[content_start..]) {
            let end = content_start + content_len + 1;
            let message = unescape(&text[content_start..content_start + content_len]);
            let remaining = format!("{}{}", &text[..start], &text[end..]);
            return Some((message, remaining.trim().to_string()));
        }
        search_from = content_start;
    }
    None
}

/// Length of quoted content up to (not including) the closing quote
fn scan_quoted(s: &str) -> Option<usize> {
    let mut chars = s.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => {
                // An escape consumes the next character, whatever it is
                chars.next()?;
            }
            '"' => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Undo `\"` and `\\` escapes. Other backslash pairs are kept verbatim.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(&next @ ('"' | '\\')) => {
                    out.push(next);
                    chars.next();
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Remove the first `name:t=<int>` token and return its masked value
///
/// Tokens that look like a timestamp but do not parse are left in place so the
/// field parser keeps them as a string payload.
pub fn extract_timestamp(text: &str) -> (Option<u32>, Vec<String>) {
    let mut device_ts = None;
    let mut remaining = Vec::new();

    for token in text.split_whitespace() {
        if device_ts.is_none() && is_timestamp_token(token) {
            if let Some(ts) = token
                .split_once('=')
                .and_then(|(_, raw)| parse_masked_u32(raw))
            {
                device_ts = Some(ts);
                continue;
            }
        }
        remaining.push(token.to_string());
    }

    (device_ts, remaining)
}

fn is_timestamp_token(token: &str) -> bool {
    match token.split_once('=') {
        Some((name_part, _)) => name_part
            .rsplit_once(':')
            .is_some_and(|(_, suffix)| suffix == "t"),
        None => false,
    }
}

/// Parse an integer, take its absolute value and keep the low 32 bits
///
/// The digits are reduced modulo 2^32 as they are read, so integers of any
/// length are accepted.
pub fn parse_masked_u32(raw: &str) -> Option<u32> {
    let digits = raw
        .strip_prefix('-')
        .or_else(|| raw.strip_prefix('+'))
        .unwrap_or(raw);
    if digits.is_empty() {
        return None;
    }

    let mut value: u64 = 0;
    for b in digits.bytes() {
        if !b.is_ascii_digit() {
            return None;
        }
        value = (value * 10 + u64::from(b - b'0')) & 0xFFFF_FFFF;
    }
    Some(value as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_level_bracket_prefix() {
        let (level, rest) = split_level("[ERROR] disk full");
        assert_eq!(level, Level::Error);
        assert_eq!(rest, "disk full");
    }

    #[test]
    fn test_level_colon_and_space_prefix() {
        assert_eq!(split_level("warning: low battery"), (Level::Warning, "low battery"));
        assert_eq!(split_level("DEBUG adc flushed"), (Level::Debug, "adc flushed"));
        assert_eq!(split_level("Info:x"), (Level::Info, "x"));
    }

    #[test]
    fn test_level_missing_defaults_to_info_unchanged() {
        let (level, rest) = split_level("  temp:f=23.5");
        assert_eq!(level, Level::Info);
        assert_eq!(rest, "  temp:f=23.5");
    }

    #[test]
    fn test_level_prefix_must_be_complete() {
        // "ERRORS" is not "ERROR " / "ERROR:" / "[ERROR]"
        let (level, rest) = split_level("ERRORS happened");
        assert_eq!(level, Level::Info);
        assert_eq!(rest, "ERRORS happened");
    }

    #[test]
    fn test_level_non_ascii_line() {
        let (level, rest) = split_level("é[INFO] x");
        assert_eq!(level, Level::Info);
        assert_eq!(rest, "é[INFO] x");
    }

    #[test]
    fn test_message_extraction() {
        let (msg, rest) = extract_message(r#":m"Temperature reading" temp:f=23.5 :t=1234"#).unwrap();
        assert_eq!(msg, "Temperature reading");
        assert_eq!(rest, "temp:f=23.5 :t=1234");
    }

    #[test]
    fn test_message_with_escapes() {
        let (msg, rest) = extract_message(r#"a:u=1 :m"say \"hi\" to C:\\tmp" b:u=2"#).unwrap();
        assert_eq!(msg, r#"say "hi" to C:\tmp"#);
        assert_eq!(rest, "a:u=1  b:u=2");
    }

    #[test]
    fn test_message_absent() {
        assert!(extract_message("temp:f=23.5 :t=1234").is_none());
        // Unterminated field is not a message
        assert!(extract_message(r#":m"never closed"#).is_none());
    }

    #[test]
    fn test_message_skips_unterminated_escape() {
        assert!(extract_message(r#":m"trailing\"#).is_none());
    }

    #[test]
    fn test_message_empty() {
        let (msg, rest) = extract_message(r#":m"" x:u=1"#).unwrap();
        assert_eq!(msg, "");
        assert_eq!(rest, "x:u=1");
    }

    #[test]
    fn test_unescape_keeps_unknown_escapes() {
        assert_eq!(unescape(r#"a\nb"#), r#"a\nb"#);
        assert_eq!(unescape(r#"\\\""#), r#"\""#);
    }

    #[test]
    fn test_timestamp_extraction() {
        let (ts, rest) = extract_timestamp("temp:f=23.5 :t=1234");
        assert_eq!(ts, Some(1234));
        assert_eq!(rest, vec!["temp:f=23.5"]);
    }

    #[test]
    fn test_timestamp_named_and_negative() {
        let (ts, rest) = extract_timestamp("tick:t=-42 x:u=1");
        assert_eq!(ts, Some(42));
        assert_eq!(rest, vec!["x:u=1"]);
    }

    #[test]
    fn test_timestamp_masked_to_32_bits() {
        let (ts, _) = extract_timestamp(":t=4294967297");
        assert_eq!(ts, Some(1));
    }

    #[test]
    fn test_masked_u32_beyond_128_bits() {
        assert_eq!(parse_masked_u32(&"9".repeat(50)), Some(u32::MAX));
        assert_eq!(
            parse_masked_u32("-340282366920938463463374607431768211461"),
            Some(5)
        );
        assert_eq!(parse_masked_u32(&format!("1{}", "0".repeat(40))), Some(0));
        assert_eq!(parse_masked_u32("+17"), Some(17));
        assert_eq!(parse_masked_u32("-"), None);
        assert_eq!(parse_masked_u32("12a"), None);
        assert_eq!(parse_masked_u32(""), None);
    }

    #[test]
    fn test_timestamp_first_valid_wins() {
        let (ts, rest) = extract_timestamp(":t=bad :t=7 :t=9");
        assert_eq!(ts, Some(7));
        assert_eq!(rest, vec![":t=bad", ":t=9"]);
    }

    #[test]
    fn test_tokenize_full_line() {
        let line = tokenize(r#"[INFO] :m"hello" x:i=5 :t=42"#);
        assert_eq!(line.level, Level::Info);
        assert_eq!(line.message.as_deref(), Some("hello"));
        assert_eq!(line.device_timestamp, Some(42));
        assert_eq!(line.field_tokens, vec!["x:i=5"]);
        assert!(line.residual.is_empty());
    }

    #[test]
    fn test_tokenize_residual_words() {
        let line = tokenize("[WARNING] Battery low v:f=3.21 now");
        assert_eq!(line.level, Level::Warning);
        assert_eq!(line.message, None);
        assert_eq!(line.field_tokens, vec!["v:f=3.21"]);
        assert_eq!(line.residual_text(), "Battery low now");
    }

    proptest! {
        #[test]
        fn test_tokenize_never_panics(line in "\\PC{0,80}") {
            let _ = tokenize(&line);
        }

        #[test]
        fn test_masked_u32_matches_abs_low_bits(v in any::<i64>()) {
            let expected = (v.unsigned_abs() & 0xFFFF_FFFF) as u32;
            prop_assert_eq!(parse_masked_u32(&v.to_string()), Some(expected));
        }

        #[test]
        fn test_masked_u32_matches_wide_integers(v in any::<u128>(), neg in any::<bool>()) {
            let raw = if neg { format!("-{}", v) } else { v.to_string() };
            prop_assert_eq!(parse_masked_u32(&raw), Some((v & 0xFFFF_FFFF) as u32));
        }

        #[test]
        fn test_escaped_message_roundtrip(content in "[ -~]{0,40}") {
            let escaped = content.replace('\\', "\\\\").replace('"', "\\\"");
            let line = format!(":m\"{}\" rest", escaped);
            let (msg, rest) = extract_message(&line).unwrap();
            prop_assert_eq!(msg, content);
            prop_assert_eq!(rest, "rest");
        }
    }
}
