//! The wire-level types shared between the relay core and its transport
//! layer: ids, control packets, close/reject reasons, and the framing
//! envelope used to carry both control packets and opaque game payloads.
//! Nothing in this crate knows how to route a packet — it only knows how to
//! name and (de)serialize one.

pub mod constants;
pub mod envelope;
pub mod ids;
pub mod packets;
pub mod reasons;
pub mod stream;

pub use envelope::{Frame, FrameError};
pub use ids::{ConnectionId, GameType, RoomId};
pub use packets::*;
pub use reasons::{CloseReason, MessageType, RejectReason};
pub use stream::{DEFAULT_CHUNK_SIZE, StreamChunk, StreamHead, StreamPayloadType};
