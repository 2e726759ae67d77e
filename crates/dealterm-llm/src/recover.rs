//! Defensive JSON recovery from free-text model output.
//!
//! The model is not a typed RPC peer: responses wrap JSON in prose, code
//! fences, or emit several candidate objects. Recovery scans for the first
//! balanced brace (or bracket) span, string- and escape-aware, and tries
//! to parse it; on parse failure it moves on to the next balanced candidate
//! before giving up.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecoverError {
    #[error("no {0} found in model output")]
    NoCandidate(&'static str),
    #[error("all {tried} balanced {shape} candidates failed to parse")]
    AllCandidatesInvalid { shape: &'static str, tried: usize },
}

/// Recover the first parseable JSON object from `text`.
pub fn recover_object(text: &str) -> Result<Value, RecoverError> {
    recover(text, b'{', b'}', "object")
}

/// Recover the first parseable JSON array from `text`.
pub fn recover_array(text: &str) -> Result<Value, RecoverError> {
    recover(text, b'[', b']', "array")
}

fn recover(text: &str, open: u8, close: u8, shape: &'static str) -> Result<Value, RecoverError> {
    let bytes = text.as_bytes();
    let mut search_from = 0usize;
    let mut tried = 0usize;

    while let Some(start) = find_byte(bytes, open, search_from) {
        match balanced_end(bytes, start, open, close) {
            Some(end) => {
                tried += 1;
                let candidate = &text[start..=end];
                match serde_json::from_str::<Value>(candidate) {
                    Ok(value) => return Ok(value),
                    Err(err) => {
                        // Retry from the next opening delimiter.
                        tracing::debug!(%err, start, "balanced {shape} candidate failed to parse");
                        search_from = start + 1;
                    }
                }
            }
            // Unbalanced from this start (truncated output); later starts
            // inside the same span may still close.
            None => search_from = start + 1,
        }
    }

    if tried == 0 {
        Err(RecoverError::NoCandidate(shape))
    } else {
        Err(RecoverError::AllCandidatesInvalid { shape, tried })
    }
}

fn find_byte(bytes: &[u8], needle: u8, from: usize) -> Option<usize> {
    bytes.get(from..)?.iter().position(|&b| b == needle).map(|i| from + i)
}

/// Walk from `start` tracking nesting depth, skipping string contents and
/// escape sequences. Returns the index of the byte closing the span.
fn balanced_end(bytes: &[u8], start: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            _ if in_string => {}
            _ if b == open => depth += 1,
            _ if b == close => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}
