//! Typed, loggable errors. Nothing in this crate turns an attacker-reachable
//! failure into a panic — see SPEC_FULL.md §7.

use protocol::ConnectionId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoomError {
    #[error("room state of {0} bytes exceeds the cap")]
    StateTooLarge(usize),
    #[error("connection {0} is not a member of this room")]
    UnknownConnection(ConnectionId),
}

#[derive(Error, Debug)]
pub enum FrameDecodeError {
    #[error("chunk for stream {0} arrived without a preceding head")]
    ChunkWithoutHead(u32),
    #[error("failed to inflate a compressed stream")]
    Decompress(#[from] std::io::Error),
    #[error(transparent)]
    Wire(#[from] protocol::FrameError),
}
