//! Classification of framed lines into control events and reply fragments.
//!
//! A control event starts with `<level>` (one priority digit in angle
//! brackets) immediately followed by `CTRL`. Everything else on the channel
//! belongs to the command currently awaiting its reply; the marker is the
//! only thing that separates the two, so it is matched strictly.

use std::collections::HashMap;

use crate::api::models::{ControlEvent, EventArgs};
use crate::types::constants::marker;
use crate::util::utils::unquote;

/// Outcome of classifying one framed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Classified {
    /// The line carried the event marker.
    Event(ControlEvent),
    /// The line is (part of) a command reply.
    Reply(String),
}

/// Classifies a framed line.
pub(crate) fn classify(line: &str) -> Classified {
    match strip_marker(line) {
        Some((level, body)) => Classified::Event(parse_event(level, body)),
        None => Classified::Reply(line.to_string()),
    }
}

/// Splits `<d>CTRL...` into the level digit and the text after `<d>`.
fn strip_marker(line: &str) -> Option<(u8, &str)> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 || bytes[0] != b'<' || !bytes[1].is_ascii_digit() || bytes[2] != b'>' {
        return None;
    }
    let body = &line[3..];
    body.starts_with(marker::EVENT).then(|| (bytes[1] - b'0', body))
}

/// Parses the text after the level prefix into a tag and its arguments.
///
/// Malformed argument tokens are never fatal: a token without `=` becomes a
/// flag with an empty value.
fn parse_event(level: u8, body: &str) -> ControlEvent {
    let mut tokens = tokenize(body).into_iter();
    let tag = tokens.next().unwrap_or_default().to_ascii_uppercase();

    let mut args: EventArgs = HashMap::new();
    for token in tokens {
        match token.split_once('=') {
            Some((key, value)) => args.insert(key.to_string(), unquote(value).to_string()),
            None => args.insert(token, String::new()),
        };
    }

    ControlEvent { level, tag, args }
}

/// Splits on whitespace, keeping double-quoted runs (e.g. `ssid="My Net"`)
/// inside a single token.
fn tokenize(body: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in body.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
