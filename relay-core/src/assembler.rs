//! Stream reassembly (§4.1): one assembler instance is kept per remote peer,
//! indexed by stream id — ids only need to be unique within a single peer's
//! streams, never globally.

use crate::compress;
use crate::error::FrameDecodeError;
use bytes::{Bytes, BytesMut};
use protocol::{ControlPacket, RoomInfo, RoomList, RoomState, StreamChunk, StreamHead, StreamPayloadType};
use std::collections::HashMap;

struct PartialStream {
    total_len: u32,
    payload_type: StreamPayloadType,
    compressed: bool,
    buffer: BytesMut,
}

/// Owned per-peer; dropping it (on disconnect) drops every in-flight stream
/// for that peer, matching the "no leaking by stream-id across peers" rule.
#[derive(Default)]
pub struct StreamAssembler {
    streams: HashMap<u32, PartialStream>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_head(&mut self, head: StreamHead) {
        self.streams.insert(
            head.stream_id,
            PartialStream {
                total_len: head.total_len,
                payload_type: head.payload_type,
                compressed: head.compressed,
                buffer: BytesMut::new(),
            },
        );
    }

    /// Appends one chunk. Returns the reassembled, decoded packet once the
    /// stream completes (either `last` arrived or the declared total was
    /// reached), or `None` while still accumulating.
    pub fn on_chunk(&mut self, chunk: StreamChunk) -> Result<Option<ControlPacket>, FrameDecodeError> {
        let partial = self
            .streams
            .get_mut(&chunk.stream_id)
            .ok_or(FrameDecodeError::ChunkWithoutHead(chunk.stream_id))?;
        partial.buffer.extend_from_slice(&chunk.data);

        let complete = chunk.last || partial.buffer.len() as u32 >= partial.total_len;
        if !complete {
            return Ok(None);
        }

        let partial = self.streams.remove(&chunk.stream_id).expect("just matched above");
        let raw: Bytes = if partial.compressed {
            compress::decompress(&partial.buffer)?.into()
        } else {
            partial.buffer.freeze()
        };

        Ok(Some(decode_payload(partial.payload_type, &raw)?))
    }
}

fn decode_payload(payload_type: StreamPayloadType, raw: &[u8]) -> Result<ControlPacket, FrameDecodeError> {
    Ok(match payload_type {
        StreamPayloadType::RoomInfo => {
            ControlPacket::RoomInfo(postcard::from_bytes::<RoomInfo>(raw).map_err(protocol::FrameError::from)?)
        }
        StreamPayloadType::RoomList => {
            ControlPacket::RoomList(postcard::from_bytes::<RoomList>(raw).map_err(protocol::FrameError::from)?)
        }
        StreamPayloadType::RoomState => {
            ControlPacket::RoomState(postcard::from_bytes::<RoomState>(raw).map_err(protocol::FrameError::from)?)
        }
    })
}
