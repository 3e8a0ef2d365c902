//! Top-level definition boundaries in executable GraphQL source.
//!
//! The parser AST does not keep byte spans, so the source text of each
//! definition is recovered by scanning for balanced top-level braces while
//! skipping strings, block strings, comments and parenthesized argument lists.

use std::ops::Range;

/// Byte ranges of the top-level definitions in `source`, in order.
///
/// Kinds and names come from the parser; this only finds where each
/// definition starts and ends.
pub(crate) fn split_definitions(source: &str) -> Vec<Range<usize>> {
    let bytes = source.as_bytes();
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let mut depth = 0usize;
    let mut parens = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'"' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' => parens += 1,
            b')' => parens = parens.saturating_sub(1),
            b'{' if parens == 0 => {
                if start.is_none() {
                    start = Some(i);
                }
                depth += 1;
            }
            b'}' if parens == 0 => {
                depth = depth.saturating_sub(1);
                if depth == 0
                    && let Some(begin) = start.take()
                {
                    spans.push(begin..i + 1);
                }
            }
            b if b.is_ascii_whitespace() || b == b',' => {}
            _ => {
                if start.is_none() && depth == 0 {
                    start = Some(i);
                }
            }
        }
        i += 1;
    }

    spans
}

/// Returns the index just past the string starting at `i`.
fn skip_string(bytes: &[u8], i: usize) -> usize {
    if bytes[i..].starts_with(b"\"\"\"") {
        let mut j = i + 3;
        while j < bytes.len() {
            if bytes[j..].starts_with(b"\\\"\"\"") {
                j += 4;
            } else if bytes[j..].starts_with(b"\"\"\"") {
                return j + 3;
            } else {
                j += 1;
            }
        }
        return bytes.len();
    }

    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'"' => return j + 1,
            b'\n' => return j,
            _ => j += 1,
        }
    }
    bytes.len()
}
