//! RESP wire frames.
//!
//! The store protocol is line-oriented: commands travel as arrays of bulk
//! strings, replies as one of five frame types. Decoding is incremental so
//! a reply split across TCP reads is simply retried once more bytes arrive;
//! nothing is consumed from the buffer until a complete frame parses.

use super::error::StoreError;
use bytes::{Buf, BufMut, BytesMut};

// =============================================================================
// Frame
// =============================================================================

/// One RESP reply frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Simple string, e.g. `+OK`.
    Simple(String),
    /// Server error reply, e.g. `-ERR unknown command`.
    Error(String),
    /// Signed integer reply.
    Integer(i64),
    /// Bulk string; `None` is the nil bulk (`$-1`).
    Bulk(Option<Vec<u8>>),
    /// Array of frames; `None` is the nil array (`*-1`).
    Array(Option<Vec<Frame>>),
}

impl Frame {
    /// Returns true for the nil bulk and nil array replies.
    pub fn is_nil(&self) -> bool {
        matches!(self, Frame::Bulk(None) | Frame::Array(None))
    }

    /// Extracts UTF-8 text from a simple or bulk frame.
    ///
    /// Nil bulks become `None`; any other frame type is a protocol error,
    /// since the values crossing this boundary are UTF-8 text.
    pub fn into_text(self) -> Result<Option<String>, StoreError> {
        match self {
            Frame::Simple(s) => Ok(Some(s)),
            Frame::Bulk(None) => Ok(None),
            Frame::Bulk(Some(bytes)) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StoreError::Protocol("bulk value is not UTF-8".to_string())),
            other => Err(StoreError::Protocol(format!(
                "expected a text reply, got {other:?}"
            ))),
        }
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encodes a command as a RESP array of bulk strings.
pub fn encode_command(args: &[&[u8]]) -> BytesMut {
    let payload: usize = args.iter().map(|a| a.len() + 16).sum();
    let mut buf = BytesMut::with_capacity(16 + payload);
    buf.put_u8(b'*');
    buf.put_slice(args.len().to_string().as_bytes());
    buf.put_slice(b"\r\n");
    for arg in args {
        buf.put_u8(b'$');
        buf.put_slice(arg.len().to_string().as_bytes());
        buf.put_slice(b"\r\n");
        buf.put_slice(arg);
        buf.put_slice(b"\r\n");
    }
    buf
}

// =============================================================================
// Decoding
// =============================================================================

/// Attempts to parse one frame off the front of `buf`.
///
/// Returns `Ok(None)` while the buffer holds only a partial frame; bytes
/// are consumed exactly when a full frame parses.
pub fn parse_frame(buf: &mut BytesMut) -> Result<Option<Frame>, StoreError> {
    match parse_at(&buf[..], 0)? {
        Some((frame, consumed)) => {
            buf.advance(consumed);
            Ok(Some(frame))
        }
        None => Ok(None),
    }
}

/// Parses the frame starting at `pos`, returning it with the index one past
/// its final byte.
fn parse_at(buf: &[u8], pos: usize) -> Result<Option<(Frame, usize)>, StoreError> {
    let Some(&kind) = buf.get(pos) else {
        return Ok(None);
    };
    let Some((line, next)) = read_line(buf, pos + 1) else {
        return Ok(None);
    };
    match kind {
        b'+' => Ok(Some((Frame::Simple(line_text(line)?), next))),
        b'-' => Ok(Some((Frame::Error(line_text(line)?), next))),
        b':' => Ok(Some((Frame::Integer(line_int(line)?), next))),
        b'$' => {
            let declared = line_int(line)?;
            if declared < 0 {
                return Ok(Some((Frame::Bulk(None), next)));
            }
            let len = declared as usize;
            let end = next + len + 2;
            if buf.len() < end {
                return Ok(None);
            }
            if &buf[next + len..end] != b"\r\n" {
                return Err(StoreError::Protocol(
                    "bulk payload missing terminator".to_string(),
                ));
            }
            Ok(Some((Frame::Bulk(Some(buf[next..next + len].to_vec())), end)))
        }
        b'*' => {
            let declared = line_int(line)?;
            if declared < 0 {
                return Ok(Some((Frame::Array(None), next)));
            }
            let mut items = Vec::with_capacity(declared as usize);
            let mut cursor = next;
            for _ in 0..declared {
                match parse_at(buf, cursor)? {
                    Some((frame, after)) => {
                        items.push(frame);
                        cursor = after;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((Frame::Array(Some(items)), cursor)))
        }
        other => Err(StoreError::Protocol(format!(
            "unknown reply type byte 0x{other:02x}"
        ))),
    }
}

/// Returns the bytes up to the next CRLF and the index just past it.
fn read_line(buf: &[u8], from: usize) -> Option<(&[u8], usize)> {
    let hay = buf.get(from..)?;
    let rel = hay.windows(2).position(|w| w == b"\r\n")?;
    Some((&hay[..rel], from + rel + 2))
}

fn line_text(line: &[u8]) -> Result<String, StoreError> {
    std::str::from_utf8(line)
        .map(str::to_owned)
        .map_err(|_| StoreError::Protocol("reply line is not UTF-8".to_string()))
}

fn line_int(line: &[u8]) -> Result<i64, StoreError> {
    line_text(line)?
        .parse()
        .map_err(|_| StoreError::Protocol("reply line is not an integer".to_string()))
}
