//! Line framing for the `wpa_cli` output stream.
//!
//! Raw chunks from the subprocess are split on `\n` and `\r`, decoded as
//! best-effort UTF-8 and trimmed. Empty segments are dropped. The idle
//! prompt never becomes a line: it is surfaced as [`Frame::Prompt`] so the
//! command channel can use it to terminate multi-line replies.

use bytes::BytesMut;
use std::io;
use tokio_util::codec::Decoder;

use crate::types::constants::marker;

/// One unit of framed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Frame {
    /// A trimmed, non-empty text line.
    Line(String),
    /// The interactive prompt was printed.
    Prompt,
}

/// Decoder turning the subprocess byte stream into [`Frame`]s.
#[derive(Debug, Default)]
pub(crate) struct LineFramer;

impl Decoder for LineFramer {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        loop {
            let Some(end) = buf.iter().position(|b| *b == b'\n' || *b == b'\r') else {
                // wpa_cli prints "> " without a terminator and then waits.
                if is_prompt(buf) {
                    buf.clear();
                    return Ok(Some(Frame::Prompt));
                }
                return Ok(None);
            };

            let segment = buf.split_to(end + 1);
            if let Some(frame) = frame_segment(&segment[..end]) {
                return Ok(Some(frame));
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        let rest = buf.split();
        Ok(frame_segment(&rest))
    }
}

fn is_prompt(bytes: &[u8]) -> bool {
    matches!(frame_segment(bytes), Some(Frame::Prompt))
}

/// Frames one terminator-free segment.
fn frame_segment(bytes: &[u8]) -> Option<Frame> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    // The prompt is redrawn in front of output that interrupts it, possibly
    // more than once.
    let mut line = trimmed;
    while let Some(rest) = line.strip_prefix(marker::PROMPT) {
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            break;
        }
        line = rest.trim_start();
    }
    if line.is_empty() {
        return Some(Frame::Prompt);
    }
    Some(Frame::Line(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(input: &[u8]) -> Vec<Frame> {
        let mut framer = LineFramer;
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(frame) = framer.decode_eof(&mut buf).expect("decode") {
            out.push(frame);
        }
        out
    }

    fn line(text: &str) -> Frame {
        Frame::Line(text.to_string())
    }

    #[test]
    fn splits_on_newline_and_carriage_return() {
        assert_eq!(
            frames(b"OK\r\n<3>CTRL-EVENT-SCAN-STARTED \rPONG\n"),
            vec![line("OK"), line("<3>CTRL-EVENT-SCAN-STARTED"), line("PONG")]
        );
    }

    #[test]
    fn drops_blank_segments() {
        assert_eq!(frames(b"\n\n   \r\n\tOK\t\n"), vec![line("OK")]);
    }

    #[test]
    fn bare_prompt_is_never_a_line() {
        assert_eq!(frames(b">\n"), vec![Frame::Prompt]);
        assert_eq!(frames(b"  >  \r\n"), vec![Frame::Prompt]);
    }

    #[test]
    fn unterminated_prompt_is_recognised() {
        let mut framer = LineFramer;
        let mut buf = BytesMut::from(&b"bssid=aa\nfreq=2412\n> "[..]);
        assert_eq!(framer.decode(&mut buf).unwrap(), Some(line("bssid=aa")));
        assert_eq!(framer.decode(&mut buf).unwrap(), Some(line("freq=2412")));
        assert_eq!(framer.decode(&mut buf).unwrap(), Some(Frame::Prompt));
        assert!(buf.is_empty());
    }

    #[test]
    fn waits_for_partial_line() {
        let mut framer = LineFramer;
        let mut buf = BytesMut::from(&b"<3>CTRL-EVENT-CONN"[..]);
        assert_eq!(framer.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"ECTED - done\n");
        assert_eq!(
            framer.decode(&mut buf).unwrap(),
            Some(line("<3>CTRL-EVENT-CONNECTED - done"))
        );
    }

    #[test]
    fn strips_redrawn_prompt_before_content() {
        assert_eq!(
            frames(b"> <3>CTRL-EVENT-SCAN-RESULTS\n"),
            vec![line("<3>CTRL-EVENT-SCAN-RESULTS")]
        );
    }

    #[test]
    fn repeated_prompts_collapse() {
        assert_eq!(frames(b"> >\n"), vec![Frame::Prompt]);
        assert_eq!(frames(b"> > PONG\n"), vec![line("PONG")]);
        assert_eq!(frames(b">>\n"), vec![line(">>")]);

        let mut framer = LineFramer;
        let mut buf = BytesMut::from(&b"> > "[..]);
        assert_eq!(framer.decode(&mut buf).unwrap(), Some(Frame::Prompt));
    }

    #[test]
    fn flushes_final_line_at_eof() {
        assert_eq!(frames(b"OK\nFAIL"), vec![line("OK"), line("FAIL")]);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let out = frames(b"ssid=caf\xff\n");
        assert_eq!(out.len(), 1);
        let Frame::Line(text) = &out[0] else {
            panic!("expected a line");
        };
        assert!(text.starts_with("ssid=caf"));
    }
}
