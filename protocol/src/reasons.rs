//! The small closed enums exchanged alongside control packets: why a room or
//! connection closed, why a join was rejected, and the host-bound toast kinds.

use serde::{Deserialize, Serialize};

/// Why a room (and therefore its connections) closed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    Closed,
    Error,
    ServerClosed,
    OutdatedClient,
    OutdatedServer,
    ObsoleteClient,
    Blacklisted,
}

/// Why a `RoomJoin`/`RoomJoinRequest` was rejected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    RoomNotFound,
    ServerClosing,
    Incompatible,
    PasswordRequired,
    InvalidPassword,
}

/// Short host-bound toasts: the relay tells the host "that operation of
/// yours was denied/noted" without tearing anything down.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    AlreadyHosting,
    RoomClosureDenied,
    ConfigureDenied,
    StatingDenied,
    ConClosureDenied,
    PacketSpamming,
    ServerClosing,
}
