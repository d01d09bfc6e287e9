//! Line-level view of the persisted `.config` state.
//!
//! The merge evaluator and the editor own the format; this module only
//! classifies lines so callers can rewrite individual entries in place.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateLine<'a> {
    Set { key: &'a str, value: &'a str },
    Unset { key: &'a str },
    Other,
}

fn set_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9_]+)=(.*)$").expect("valid regex"))
}

fn unset_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^# ([A-Za-z0-9_]+) is not set$").expect("valid regex"))
}

/// Classify one line. A trailing `\n` / `\r\n` is ignored.
pub fn classify(line: &str) -> StateLine<'_> {
    let body = strip_terminator(line).0;
    if let Some(c) = set_re().captures(body) {
        if let (Some(k), Some(v)) = (c.get(1), c.get(2)) {
            return StateLine::Set {
                key: k.as_str(),
                value: v.as_str(),
            };
        }
    }
    if let Some(k) = unset_re().captures(body).and_then(|c| c.get(1)) {
        return StateLine::Unset { key: k.as_str() };
    }
    StateLine::Other
}

/// Split a line into its body and its original terminator.
pub fn strip_terminator(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// Lines with their terminators, so that joining them reproduces the input exactly.
pub fn lines_with_endings(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive('\n')
}

pub fn parse_entries(text: &str) -> Vec<(String, String)> {
    lines_with_endings(text)
        .filter_map(|line| match classify(line) {
            StateLine::Set { key, value } => Some((key.to_string(), value.to_string())),
            _ => None,
        })
        .collect()
}

pub fn lookup(text: &str, key: &str) -> Option<String> {
    lines_with_endings(text).find_map(|line| match classify(line) {
        StateLine::Set { key: k, value } if k == key => Some(value.to_string()),
        _ => None,
    })
}
