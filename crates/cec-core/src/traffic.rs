//! Parser for `cec-client --monitor` traffic lines.
//!
//! `cec-client` prints every frame it sees as a colon-separated hex dump:
//!
//! ```text
//! TRAFFIC: [          130873] >> 4f:36
//! DEBUG:   [          130874] >> Playback 1 (4) -> Broadcast (F): standby (36)
//! ```
//!
//! Only the `TRAFFIC` lines carry raw frames; everything else is ignored.

use crate::{BusEvent, FrameError, FrameResult};

const TRAFFIC_PREFIX: &str = "TRAFFIC:";
const INBOUND_MARKER: &str = ">>";
const OUTBOUND_MARKER: &str = "<<";

/// Parses one line of `cec-client` output.
///
/// Returns `Ok(None)` for lines that are not traffic dumps (log chatter,
/// prompts, blank lines).
///
/// # Errors
///
/// Returns a `FrameError` when a traffic line carries a malformed frame.
pub fn parse_traffic_line(line: &str) -> FrameResult<Option<BusEvent>> {
    let Some(rest) = line.trim_start().strip_prefix(TRAFFIC_PREFIX) else {
        return Ok(None);
    };

    let dump = match rest.find(INBOUND_MARKER).or_else(|| rest.find(OUTBOUND_MARKER)) {
        Some(pos) => rest.get(pos + INBOUND_MARKER.len()..).unwrap_or_default(),
        None => return Ok(None),
    };

    let frame = dump
        .trim()
        .split(':')
        .filter(|token| !token.is_empty())
        .map(|token| {
            u8::from_str_radix(token, 16).map_err(|_| FrameError::InvalidByte {
                token: token.to_string(),
            })
        })
        .collect::<FrameResult<Vec<u8>>>()?;

    BusEvent::from_frame(&frame).map(Some)
}
