//! Reader and writer for flat `key=value` property files.
//!
//! Follows the usual property-file conventions: `#` and `!` start comments,
//! the key ends at the first unescaped `=`, `:` or whitespace, a trailing
//! backslash continues the logical line, and `\t`, `\n`, `\r`, `\f`, `\uXXXX`
//! escapes are understood. Output is sorted by key so that the file is stable
//! across runs.

use std::collections::BTreeMap;

/// Whitespace allowed around the key/value separator.
const SEPARATOR_WS: &[char] = &[' ', '\t', '\x0c'];

/// Parses property text into a key-value map.
///
/// Lines that cannot be decoded (for example a malformed `\u` escape) are
/// skipped and reported through `tracing`; later duplicates win.
pub fn parse(text: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    for (line_no, line) in logical_lines(text) {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }
        match parse_entry(trimmed) {
            Some((key, value)) => {
                entries.insert(key, value);
            }
            None => tracing::warn!(line = line_no, "skipping malformed property line"),
        }
    }
    entries
}

/// Formats a key-value map as property text, one sorted entry per line.
pub fn format(header: &str, entries: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for line in header.lines() {
        out.push_str("# ");
        out.push_str(line);
        out.push('\n');
    }
    for (key, value) in entries {
        escape_into(&mut out, key, true);
        out.push('=');
        escape_into(&mut out, value, false);
        out.push('\n');
    }
    out
}

/// Joins physical lines ending in an odd number of backslashes with the
/// following line, dropping the continuation's leading whitespace.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut start = 0;
    let mut continuing = false;

    for (idx, raw) in text.lines().enumerate() {
        let piece = if continuing { raw.trim_start() } else { raw };
        if !continuing {
            start = idx + 1;
        }
        let trailing = piece.chars().rev().take_while(|&c| c == '\\').count();
        let is_comment = !continuing && {
            let t = piece.trim_start();
            t.starts_with('#') || t.starts_with('!')
        };
        if trailing % 2 == 1 && !is_comment {
            current.push_str(&piece[..piece.len() - 1]);
            continuing = true;
        } else {
            current.push_str(piece);
            lines.push((start, std::mem::take(&mut current)));
            continuing = false;
        }
    }
    if continuing {
        lines.push((start, current));
    }
    lines
}

fn parse_entry(line: &str) -> Option<(String, String)> {
    let mut key_end = line.len();
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = unescape(&line[..key_end])?;
    let mut rest = line[key_end..].trim_start_matches(SEPARATOR_WS);
    if let Some(stripped) = rest.strip_prefix(&['=', ':'][..]) {
        rest = stripped.trim_start_matches(SEPARATOR_WS);
    }
    let value = unescape(rest)?;
    Some((key, value))
}

fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return None;
                }
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Some(out)
}

fn escape_into(out: &mut String, s: &str, is_key: bool) {
    for (i, c) in s.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            '=' | ':' | '#' | '!' if is_key => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
}
