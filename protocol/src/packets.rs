//! The control-packet protocol (§4.6): every typed message the relay,
//! rooms and listing cache exchange with hosts and clients. Opaque game
//! payloads never appear here — they travel as [`crate::envelope::Frame::Raw`]
//! and only get wrapped with a [`ConnectionPacketWrap`] envelope by the room.

use crate::ids::{ConnectionId, GameType, RoomId};
use crate::reasons::{CloseReason, MessageType, RejectReason};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A room's opaque, host-provided state snapshot. Capped at
/// [`crate::constants::MAX_ROOM_STATE_BYTES`]; larger snapshots are rejected
/// by `Room::set_state` before they ever reach the wire.
pub type RawState = Bytes;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomCreationRequest {
    pub version: i32,
    pub game_type: Option<GameType>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomLink {
    pub room_id: RoomId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomClosed {
    pub reason: CloseReason,
}

/// Joins and commits to the room in one step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomJoin {
    pub room_id: RoomId,
    pub game_type: Option<GameType>,
    pub with_password: bool,
    pub password: u16,
}

/// Same gating as [`RoomJoin`] but only probes — on success the caller gets
/// [`RoomJoinAccepted`] and is *not* attached to the room.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomJoinRequest {
    pub room_id: RoomId,
    pub game_type: Option<GameType>,
    pub with_password: bool,
    pub password: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomJoinAccepted {
    pub room_id: RoomId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomJoinDenied {
    pub room_id: Option<RoomId>,
    pub reason: RejectReason,
}

/// Host-only; see `Room::set_configuration`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomConfig {
    pub is_public: bool,
    pub is_protected: bool,
    pub password: u16,
    pub can_request_state: bool,
}

/// Host-only; see `Room::set_state`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomState {
    pub state: RawState,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomInfoRequest {
    pub room_id: RoomId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub is_protected: bool,
    pub game_type: Option<GameType>,
    /// `None` when the room is not public, per `Room::send_room_state`.
    pub state: Option<RawState>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomListRequest {
    pub game_type: GameType,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoomList {
    pub states: Vec<(RoomId, RawState)>,
    pub protected_rooms: Vec<RoomId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionJoin {
    pub con_id: ConnectionId,
    pub address_hash: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionClosed {
    pub con_id: ConnectionId,
    pub reason: CloseReason,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionIdling {
    pub con_id: ConnectionId,
}

/// Carries one opaque game payload plus its logical destination/source and
/// reliability class. See §4.3's forwarding protocol.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionPacketWrap {
    pub con_id: ConnectionId,
    pub is_tcp: bool,
    pub raw: Bytes,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerInfo {
    pub version: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HostToast {
    pub message: MessageType,
}

/// Free-text operator broadcast (§6 "operator surface"), sent to every
/// room's host. Distinct from [`HostToast`], whose `message` is a closed
/// set of canned reasons rather than operator-supplied text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerBroadcast {
    pub text: String,
}

/// Every typed message exchanged above the opaque-payload layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ControlPacket {
    ServerInfo(ServerInfo),
    RoomCreationRequest(RoomCreationRequest),
    RoomLink(RoomLink),
    RoomClosureRequest,
    RoomClosed(RoomClosed),
    RoomJoin(RoomJoin),
    RoomJoinRequest(RoomJoinRequest),
    RoomJoinAccepted(RoomJoinAccepted),
    RoomJoinDenied(RoomJoinDenied),
    RoomConfig(RoomConfig),
    RoomState(RoomState),
    RoomStateRequest,
    RoomInfoRequest(RoomInfoRequest),
    RoomInfo(RoomInfo),
    RoomInfoDenied,
    RoomListRequest(RoomListRequest),
    RoomList(RoomList),
    ConnectionJoin(ConnectionJoin),
    ConnectionClosed(ConnectionClosed),
    ConnectionIdling(ConnectionIdling),
    ConnectionPacketWrap(ConnectionPacketWrap),
    HostToast(HostToast),
    ServerBroadcast(ServerBroadcast),
}
