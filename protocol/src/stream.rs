//! Wire types for the framing/stream-assembly layer (§4.1): a control packet
//! too large for one frame goes out as a [`StreamHead`] followed by ordered
//! [`StreamChunk`]s, the last one flagged accordingly.

use serde::{Deserialize, Serialize};

/// Default chunk payload size. Not pinned by the protocol — peers agree
/// through the head's declared `total`, not through this constant — but it's
/// what this implementation emits.
pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024;

/// Announces an incoming stream: its id (unique per sending peer), the total
/// byte length to expect, the tag identifying how to decode the reassembled
/// bytes, and whether the chunk payloads are deflate-compressed.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct StreamHead {
    pub stream_id: u32,
    pub total_len: u32,
    pub payload_type: StreamPayloadType,
    pub compressed: bool,
}

/// One ordered slice of a stream's payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamChunk {
    pub stream_id: u32,
    pub data: bytes::Bytes,
    pub last: bool,
}

/// What the reassembled bytes decode into. Only the payloads actually large
/// enough to warrant streaming need a tag here.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamPayloadType {
    RoomInfo,
    RoomList,
    RoomState,
}
