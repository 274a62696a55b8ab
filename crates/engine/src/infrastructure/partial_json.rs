//! Lenient parsing of partially streamed JSON.
//!
//! The skeleton generation step streams a JSON tree token by token, so at
//! almost every increment the accumulated buffer is syntactically cut off -
//! mid-string, after a comma, after a key's colon. This module completes
//! such a buffer into valid JSON where possible (closing the open string,
//! dropping a dangling comma, closing open brackets) so the workflow can
//! inspect snapshots of the tree while it is still arriving.

use serde_json::Value;

/// Complete a truncated JSON buffer into a parseable document, or `None`
/// when the buffer cannot be repaired by appending (e.g. mismatched
/// brackets or a half-written key).
pub fn complete_json(input: &str) -> Option<String> {
    let trimmed = input.trim_start();
    if trimmed.is_empty() {
        return None;
    }

    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in trimmed.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    return None;
                }
            }
            '"' => in_string = true,
            _ => {}
        }
    }

    let mut out = trimmed.to_string();
    if escaped {
        // A trailing backslash cannot be closed; drop it with its string.
        out.pop();
    }
    if in_string {
        out.push('"');
    }

    // Tidy the tail so appended closers produce valid JSON.
    loop {
        let len = out.trim_end().len();
        out.truncate(len);
        if out.ends_with(',') {
            out.pop();
        } else {
            break;
        }
    }
    if out.ends_with(':') {
        out.push_str(" null");
    }

    for closer in stack.iter().rev() {
        out.push(*closer);
    }
    Some(out)
}

/// Parse a possibly truncated JSON buffer into a snapshot value. Returns
/// `None` when no valid snapshot can be recovered yet.
pub fn parse_partial(input: &str) -> Option<Value> {
    complete_json(input).and_then(|repaired| serde_json::from_str(&repaired).ok())
}
