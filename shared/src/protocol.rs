//! Message framing for the byte stream between client and server.
//!
//! Every message is a 4-byte header followed by its payload:
//!
//! ```text
//! [type: u8][len0][len1][len2][payload: len bytes]
//! ```
//!
//! `len` is the payload size only, 24-bit little-endian. Decoding never
//! consumes bytes itself: [`peek_frame`] hands back the payload and the caller
//! drops [`Frame::frame_len`] bytes from its buffer once it is done with them.

use crate::error::{FrameError, ProtocolError};

/// Size of the `[type][len0][len1][len2]` header.
pub const HEADER_LEN: usize = 4;

/// Largest payload a 24-bit length can describe.
pub const MAX_PAYLOAD_LEN: usize = 0xFF_FFFF;

/// Message type tags as they appear in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Client to server: button state since the last flush.
    Controls = 1,
    /// Server to client: full game snapshot.
    State = b's',
}

impl MessageType {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(MessageType::Controls),
            b's' => Some(MessageType::State),
            _ => None,
        }
    }
}

/// A complete message found at the front of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub kind: MessageType,
    pub payload: &'a [u8],
}

impl Frame<'_> {
    /// Bytes the caller must remove from the front of its buffer.
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }
}

/// Position of a header whose length is patched in by [`finish_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMark {
    payload_start: usize,
}

/// Appends a complete framed message to `out`.
pub fn encode_frame(
    out: &mut Vec<u8>,
    kind: MessageType,
    payload: &[u8],
) -> Result<(), ProtocolError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge { len: payload.len() });
    }
    out.reserve(HEADER_LEN + payload.len());
    out.push(kind.tag());
    out.extend_from_slice(&length_bytes(payload.len()));
    out.extend_from_slice(payload);
    Ok(())
}

/// Writes a header with a placeholder length; the payload is appended
/// directly to `out` afterwards.
pub fn begin_frame(out: &mut Vec<u8>, kind: MessageType) -> FrameMark {
    out.push(kind.tag());
    out.extend_from_slice(&[0, 0, 0]);
    FrameMark {
        payload_start: out.len(),
    }
}

/// Patches the length of a frame opened with [`begin_frame`].
///
/// On error the partial frame is removed from `out` again.
pub fn finish_frame(out: &mut Vec<u8>, mark: FrameMark) -> Result<(), ProtocolError> {
    let len = out.len() - mark.payload_start;
    if len > MAX_PAYLOAD_LEN {
        out.truncate(mark.payload_start - HEADER_LEN);
        return Err(ProtocolError::PayloadTooLarge { len });
    }
    out[mark.payload_start - 3..mark.payload_start].copy_from_slice(&length_bytes(len));
    Ok(())
}

/// Reads the 24-bit payload length from a header. `header` must hold at
/// least [`HEADER_LEN`] bytes.
pub fn declared_len(header: &[u8]) -> usize {
    usize::from(header[1]) | usize::from(header[2]) << 8 | usize::from(header[3]) << 16
}

/// Inspects the front of `buf` for a complete message of type `expected`.
pub fn peek_frame(buf: &[u8], expected: MessageType) -> Result<Frame<'_>, FrameError> {
    if buf.len() < HEADER_LEN {
        return Err(FrameError::NeedMoreData);
    }
    if buf[0] != expected.tag() {
        return Err(FrameError::UnexpectedType {
            found: buf[0],
            expected,
        });
    }
    let len = declared_len(buf);
    if buf.len() < HEADER_LEN + len {
        return Err(FrameError::NeedMoreData);
    }
    Ok(Frame {
        kind: expected,
        payload: &buf[HEADER_LEN..HEADER_LEN + len],
    })
}

fn length_bytes(len: usize) -> [u8; 3] {
    [len as u8, (len >> 8) as u8, (len >> 16) as u8]
}
