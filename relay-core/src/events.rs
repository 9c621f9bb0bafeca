//! The two-thread handoff (§5/§9): everything the network loop learns about
//! a connection crosses into the main loop as one of these events over a
//! bounded `mpsc` channel. The main loop never reaches back into socket
//! state; it only ever answers through a connection's own outbound sender.

use crate::status::RelayStatus;
use crate::timers::TimerKey;
use protocol::{Frame, GameType};
use std::net::IpAddr;
use tokio::sync::{mpsc, oneshot};

/// One frame queued for delivery to a connection's network-loop writer.
#[derive(Clone, Debug)]
pub struct OutboundFrame {
    pub frame: Frame,
    /// `true` = send via the reliable/ordered path, `false` = best-effort.
    pub reliable: bool,
}

impl OutboundFrame {
    pub fn reliable(frame: Frame) -> Self {
        Self {
            frame,
            reliable: true,
        }
    }
    pub fn unreliable(frame: Frame) -> Self {
        Self {
            frame,
            reliable: false,
        }
    }
}

/// Programmatic equivalents of the operator console (§6 "operator surface").
pub enum AdminCommand {
    CloseRoom {
        short_id: String,
        reply: oneshot::Sender<bool>,
    },
    BroadcastText {
        message: String,
        reply: oneshot::Sender<usize>,
    },
    Status {
        reply: oneshot::Sender<RelayStatus>,
    },
    SetBlacklist {
        addresses: Vec<IpAddr>,
        reply: oneshot::Sender<()>,
    },
    SetSpamLimit {
        packets_per_3s: u32,
        reply: oneshot::Sender<()>,
    },
    RefreshRoomState {
        short_id: String,
        reply: oneshot::Sender<bool>,
    },
    RefreshTypeList {
        game_type: GameType,
        reply: oneshot::Sender<()>,
    },
    SetDebugLogging {
        enabled: bool,
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// What the network loop learned and is posting to the main loop.
pub enum RelayEvent {
    Connected {
        id: protocol::ConnectionId,
        addr: IpAddr,
        outbound: mpsc::Sender<OutboundFrame>,
    },
    Disconnected {
        id: protocol::ConnectionId,
    },
    Inbound {
        id: protocol::ConnectionId,
        frame: Frame,
        reliable: bool,
    },
    /// An unstructured/garbled frame arrived — a protocol violation that
    /// should kick the offender (§4.5 "obsolete protocol").
    Malformed {
        id: protocol::ConnectionId,
    },
    /// The network loop's own idle timer fired for this connection (§4.3
    /// idle propagation). The main loop owns the "already notified" flag;
    /// this event only ever asks it to consider raising one.
    Idle {
        id: protocol::ConnectionId,
    },
    Timer(TimerKey),
    Admin(AdminCommand),
}

/// Suppresses `RoomId` appearing in the `Timer` debug print without requiring
/// it to implement every trait `TimerKey` does.
impl std::fmt::Debug for RelayEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayEvent::Connected { id, addr, .. } => {
                f.debug_struct("Connected").field("id", id).field("addr", addr).finish()
            }
            RelayEvent::Disconnected { id } => f.debug_struct("Disconnected").field("id", id).finish(),
            RelayEvent::Inbound { id, reliable, .. } => f
                .debug_struct("Inbound")
                .field("id", id)
                .field("reliable", reliable)
                .finish(),
            RelayEvent::Malformed { id } => f.debug_struct("Malformed").field("id", id).finish(),
            RelayEvent::Idle { id } => f.debug_struct("Idle").field("id", id).finish(),
            RelayEvent::Timer(key) => f.debug_tuple("Timer").field(key).finish(),
            RelayEvent::Admin(_) => f.write_str("Admin(..)"),
        }
    }
}
