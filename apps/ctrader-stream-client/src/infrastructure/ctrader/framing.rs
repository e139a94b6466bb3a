//! Wire framing.
//!
//! Every frame on the stream is a 4-byte unsigned big-endian length
//! followed by exactly that many envelope bytes. The declared length is
//! untrusted input: it is checked against a configured cap before any
//! allocation happens, and an oversized frame tears the connection down
//! rather than being resynchronized.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;
use thiserror::Error;

use super::messages::ProtoMessage;

/// Width of the length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Default cap on a single frame's body.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 4 * 1024 * 1024;

/// Framing errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The declared (or produced) frame body exceeds the configured cap.
    #[error("frame of {declared} bytes exceeds the {max}-byte cap")]
    TooLarge {
        /// Length the peer declared, or the body we tried to produce.
        declared: u32,
        /// Configured cap.
        max: u32,
    },
}

/// Serialize an envelope into one on-wire frame.
///
/// # Errors
///
/// `TooLarge` when the encoded envelope exceeds `max_frame_size`.
pub fn encode_frame(envelope: &ProtoMessage, max_frame_size: u32) -> Result<Bytes, FrameError> {
    let body = envelope.encode_to_vec();
    let declared = u32::try_from(body.len()).map_err(|_| FrameError::TooLarge {
        declared: u32::MAX,
        max: max_frame_size,
    })?;
    if declared > max_frame_size {
        return Err(FrameError::TooLarge {
            declared,
            max: max_frame_size,
        });
    }

    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_LEN + body.len());
    frame.put_u32(declared);
    frame.extend_from_slice(&body);
    Ok(frame.freeze())
}

/// Accumulates raw stream bytes and extracts complete frames.
///
/// Extraction is lazy and restartable: `push` consumes as many complete
/// frames as the buffer holds and keeps any incomplete prefix or body for
/// the next delivery, so frames spanning multiple reads and multiple
/// frames per read both work. Owned by exactly one connection; `reset`
/// discards partial data on reconnect.
#[derive(Debug)]
pub struct FrameBuffer {
    buffer: BytesMut,
    max_frame_size: u32,
}

impl FrameBuffer {
    /// New buffer enforcing the given frame-size cap.
    #[must_use]
    pub fn new(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            max_frame_size,
        }
    }

    /// Append freshly read bytes and extract every complete frame.
    ///
    /// Returns the envelope byte regions in arrival order; the length
    /// prefixes are stripped.
    ///
    /// # Errors
    ///
    /// `TooLarge` when a declared length exceeds the cap. The buffer is
    /// left as-is; the caller is expected to drop the connection.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>, FrameError> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Bytes>, FrameError> {
        if self.buffer.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let declared = u32::from_be_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ]);
        if declared > self.max_frame_size {
            return Err(FrameError::TooLarge {
                declared,
                max: self.max_frame_size,
            });
        }

        let body_len = declared as usize;
        if self.buffer.len() < LENGTH_PREFIX_LEN + body_len {
            return Ok(None);
        }

        self.buffer.advance(LENGTH_PREFIX_LEN);
        Ok(Some(self.buffer.split_to(body_len).freeze()))
    }

    /// Bytes buffered but not yet forming a complete frame.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Discard any buffered partial frame (used when a connection drops).
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame(body: &[u8]) -> Vec<u8> {
        let mut out = (u32::try_from(body.len()).unwrap()).to_be_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn one_frame_in_one_delivery() {
        let mut buffer = FrameBuffer::default();
        let frames = buffer.push(&frame(b"hello")).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"hello");
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn two_frames_of_37_bytes_split_10_5_22() {
        // Frame 1: 4 + 12 = 16 bytes. Frame 2: 4 + 17 = 21 bytes. Total 37.
        let body_a = [0xAAu8; 12];
        let body_b = [0xBBu8; 17];
        let mut wire = frame(&body_a);
        wire.extend_from_slice(&frame(&body_b));
        assert_eq!(wire.len(), 37);

        let mut buffer = FrameBuffer::default();
        assert!(buffer.push(&wire[..10]).unwrap().is_empty());
        assert!(buffer.push(&wire[10..15]).unwrap().is_empty());
        let frames = buffer.push(&wire[15..]).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0][..], &body_a[..]);
        assert_eq!(&frames[1][..], &body_b[..]);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn split_inside_length_prefix() {
        let wire = frame(b"abc");
        let mut buffer = FrameBuffer::default();
        assert!(buffer.push(&wire[..2]).unwrap().is_empty());
        let frames = buffer.push(&wire[2..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"abc");
    }

    #[test]
    fn many_frames_in_one_delivery() {
        let mut wire = Vec::new();
        for i in 0..5u8 {
            wire.extend_from_slice(&frame(&[i; 3]));
        }

        let mut buffer = FrameBuffer::default();
        let frames = buffer.push(&wire).unwrap();
        assert_eq!(frames.len(), 5);
        assert_eq!(&frames[3][..], &[3, 3, 3]);
    }

    #[test]
    fn empty_body_frame() {
        let mut buffer = FrameBuffer::default();
        let frames = buffer.push(&frame(b"")).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_empty());
    }

    #[test]
    fn oversized_declared_length_is_rejected_before_allocation() {
        let mut buffer = FrameBuffer::new(1024);
        let wire = u32::MAX.to_be_bytes();
        assert!(matches!(
            buffer.push(&wire),
            Err(FrameError::TooLarge {
                declared: u32::MAX,
                max: 1024
            })
        ));
    }

    #[test]
    fn reset_discards_partial_frame() {
        let mut buffer = FrameBuffer::default();
        let wire = frame(b"partial");
        assert!(buffer.push(&wire[..6]).unwrap().is_empty());
        assert_eq!(buffer.pending(), 6);

        buffer.reset();
        assert_eq!(buffer.pending(), 0);

        // A fresh frame parses cleanly after the reset.
        let frames = buffer.push(&frame(b"next")).unwrap();
        assert_eq!(&frames[0][..], b"next");
    }

    #[test]
    fn encode_frame_writes_big_endian_prefix() {
        let envelope = ProtoMessage {
            payload_type: 51,
            payload: None,
            client_msg_id: None,
        };
        let bytes = encode_frame(&envelope, DEFAULT_MAX_FRAME_SIZE).unwrap();

        let declared = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(declared as usize, bytes.len() - LENGTH_PREFIX_LEN);

        let decoded = ProtoMessage::decode(&bytes[LENGTH_PREFIX_LEN..]).unwrap();
        assert_eq!(decoded.payload_type, 51);
    }

    #[test]
    fn encode_frame_enforces_cap() {
        let envelope = ProtoMessage {
            payload_type: 2131,
            payload: Some(vec![0; 128]),
            client_msg_id: None,
        };
        assert!(matches!(
            encode_frame(&envelope, 16),
            Err(FrameError::TooLarge { .. })
        ));
    }

    proptest! {
        /// Chunk-boundary independence: any partitioning of the byte
        /// stream yields the same ordered frames as a single delivery.
        #[test]
        fn chunking_does_not_change_extracted_frames(
            bodies in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..8),
            cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
        ) {
            let mut wire = Vec::new();
            for body in &bodies {
                wire.extend_from_slice(&frame(body));
            }

            let mut whole = FrameBuffer::default();
            let expected = whole.push(&wire).unwrap();

            let mut boundaries: Vec<usize> = cuts.iter().map(|c| c.index(wire.len() + 1)).collect();
            boundaries.push(0);
            boundaries.push(wire.len());
            boundaries.sort_unstable();
            boundaries.dedup();

            let mut incremental = FrameBuffer::default();
            let mut collected = Vec::new();
            for window in boundaries.windows(2) {
                collected.extend(incremental.push(&wire[window[0]..window[1]]).unwrap());
            }

            prop_assert_eq!(collected, expected);
            prop_assert_eq!(incremental.pending(), 0);
        }
    }
}
