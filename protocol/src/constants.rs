//! Fixed, protocol-level constants.

/// Identifies the relay to a UDP discovery probe. Arbitrary but stable for
/// the lifetime of the protocol (a real deployment would pin this to the
/// value its clients already expect; picked here as a stand-in since the
/// exact magic is a collaborator/wire concern per §1).
pub const DISCOVERY_MAGIC: u8 = 0xC7;

/// The relay's protocol-major version, compared against `RoomCreationRequest`/
/// `RoomJoin`'s `version` field.
pub const SERVER_MAJOR_VERSION: i32 = 1;

/// Size of the discovery reply: one magic byte + a 4-byte big-endian version.
pub const DISCOVERY_REPLY_SIZE: usize = 5;

/// A room's state snapshot is rejected past this size (§3, `rawState` cap).
pub const MAX_ROOM_STATE_BYTES: usize = 1 << 20;

/// Above this size a [`crate::packets::RoomInfo`]/[`crate::packets::RoomList`]
/// is sent through the streaming layer instead of as one frame.
pub const STREAM_SPLIT_THRESHOLD: usize = 4 * 1024;

/// Capacity of a connection's early-packet queue (§3).
pub const EARLY_PACKET_QUEUE_CAPACITY: usize = 3;

pub fn discovery_reply() -> [u8; DISCOVERY_REPLY_SIZE] {
    let mut buf = [0u8; DISCOVERY_REPLY_SIZE];
    buf[0] = DISCOVERY_MAGIC;
    buf[1..5].copy_from_slice(&SERVER_MAJOR_VERSION.to_be_bytes());
    buf
}
