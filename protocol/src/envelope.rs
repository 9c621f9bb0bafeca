//! The one-byte-discriminant wire envelope described in SPEC_FULL.md §4.1.
//! This is the implementation's own choice of framing, not a commitment any
//! collaborator client must replicate byte-for-byte — it only has to agree
//! with whatever decodes it on the other end of a given `Transport`.

use crate::packets::ControlPacket;
use crate::stream::{StreamChunk, StreamHead};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const TAG_CONTROL: u8 = 0x00;
const TAG_STREAM_HEAD: u8 = 0x01;
const TAG_STREAM_CHUNK: u8 = 0x02;
const TAG_RAW: u8 = 0x03;

/// A single transport frame after it has been stripped of its discriminant
/// byte: either a typed control packet, one half of a stream, or an opaque
/// game payload the relay never interprets.
#[derive(Clone, Debug)]
pub enum Frame {
    Control(ControlPacket),
    StreamHead(StreamHead),
    StreamChunk(StreamChunk),
    Raw(Bytes),
}

#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown frame discriminant {0:#04x}")]
    UnknownTag(u8),
    #[error("postcard decode error: {0}")]
    Decode(#[from] postcard::Error),
}

impl Frame {
    /// Serializes the frame into a fresh buffer, discriminant byte first.
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let mut buf = BytesMut::new();
        match self {
            Frame::Control(packet) => {
                buf.put_u8(TAG_CONTROL);
                let bytes = postcard::to_allocvec(packet)?;
                buf.put_slice(&bytes);
            }
            Frame::StreamHead(head) => {
                buf.put_u8(TAG_STREAM_HEAD);
                let bytes = postcard::to_allocvec(head)?;
                buf.put_slice(&bytes);
            }
            Frame::StreamChunk(chunk) => {
                buf.put_u8(TAG_STREAM_CHUNK);
                let bytes = postcard::to_allocvec(chunk)?;
                buf.put_slice(&bytes);
            }
            Frame::Raw(payload) => {
                buf.put_u8(TAG_RAW);
                buf.put_slice(payload);
            }
        }
        Ok(buf.freeze())
    }

    /// Parses a frame off the wire. `Raw` payloads are returned without any
    /// further decoding — the relay is not allowed to look inside them.
    pub fn decode(mut bytes: Bytes) -> Result<Self, FrameError> {
        if bytes.is_empty() {
            return Err(FrameError::Empty);
        }
        let tag = bytes.get_u8();
        Ok(match tag {
            TAG_CONTROL => Frame::Control(postcard::from_bytes(&bytes)?),
            TAG_STREAM_HEAD => Frame::StreamHead(postcard::from_bytes(&bytes)?),
            TAG_STREAM_CHUNK => Frame::StreamChunk(postcard::from_bytes(&bytes)?),
            TAG_RAW => Frame::Raw(bytes),
            other => return Err(FrameError::UnknownTag(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::RoomClosed;
    use crate::reasons::CloseReason;

    #[test]
    fn control_packet_round_trips() {
        let frame = Frame::Control(ControlPacket::RoomClosed(RoomClosed {
            reason: CloseReason::Error,
        }));
        let encoded = frame.encode().unwrap();
        let decoded = Frame::decode(encoded).unwrap();
        assert!(matches!(
            decoded,
            Frame::Control(ControlPacket::RoomClosed(RoomClosed {
                reason: CloseReason::Error
            }))
        ));
    }

    #[test]
    fn raw_payload_is_untouched() {
        let payload = Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let frame = Frame::Raw(payload.clone());
        let encoded = frame.encode().unwrap();
        let decoded = Frame::decode(encoded).unwrap();
        match decoded {
            Frame::Raw(bytes) => assert_eq!(bytes, payload),
            _ => panic!("expected raw frame"),
        }
    }

    #[test]
    fn empty_frame_is_rejected() {
        assert!(matches!(
            Frame::decode(Bytes::new()),
            Err(FrameError::Empty)
        ));
    }
}
