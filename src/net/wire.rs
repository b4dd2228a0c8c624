//! Wire format for the remote endpoint connection
//!
//! Every message travels as a length-prefixed frame:
//!
//! ```text
//! ┌──────────────────┬────────────────────────────┐
//! │ Length (4 bytes) │ Payload (variable)         │
//! │ Big-endian u32   │ JSON reading or mode token │
//! └──────────────────┴────────────────────────────┘
//! ```
//!
//! Outbound payloads are one JSON object per reading:
//! `{"command": "RPM", "value": 3000.0}`; the value is an array of
//! code strings for trouble-code readings, a bare number otherwise.
//!
//! Inbound payloads are a single mode token
//! (`off|acceleration|police|pit|chase|hazard`); anything else is
//! ignored by the command channel.

use crate::error::{Error, Result};
use crate::obd::Reading;
use crate::state::Mode;
use std::io::{Read, Write};

/// Maximum accepted frame size (oversized frames close the connection)
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Write one length-prefixed frame
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(Error::Serialization(format!(
            "frame too large: {} bytes",
            payload.len()
        )));
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one length-prefixed frame into the reusable buffer
///
/// Returns `Ok(None)` when the read timed out before a frame arrived,
/// so callers can check their shutdown flags and try again.
pub fn read_frame<'a, R: Read>(reader: &mut R, buf: &'a mut Vec<u8>) -> Result<Option<&'a [u8]>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::Protocol(format!("frame too large: {} bytes", len)));
    }

    buf.clear();
    buf.resize(len, 0);
    reader.read_exact(buf)?;
    Ok(Some(buf.as_slice()))
}

/// Serialize a reading for the outbound stream
pub fn encode_reading(reading: &Reading) -> Result<Vec<u8>> {
    serde_json::to_vec(reading).map_err(|e| Error::Serialization(e.to_string()))
}

/// Parse an inbound command frame into a mode
///
/// `None` for anything outside the fixed vocabulary; the caller logs
/// and ignores it.
pub fn parse_command(payload: &[u8]) -> Option<Mode> {
    let text = String::from_utf8_lossy(payload);
    Mode::from_token(text.trim())
}
