//! The virtual-connection layer (§4.2): per-connection bookkeeping the main
//! loop owns. The socket itself — and the stream assembler that turns its
//! bytes into frames — stays in the network loop; this struct only holds
//! what the relay's routing logic needs.

use crate::early_queue::EarlyPacketQueue;
use crate::events::OutboundFrame;
use crate::rate::RateKeeper;
use protocol::ConnectionId;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct Connection {
    pub id: ConnectionId,
    pub addr: IpAddr,
    outbound: mpsc::Sender<OutboundFrame>,
    pub packet_rate: RateKeeper,
    pub idle_notified: bool,
    pub early_queue: EarlyPacketQueue,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        addr: IpAddr,
        outbound: mpsc::Sender<OutboundFrame>,
        spam_limit: u32,
        early_queue_capacity: usize,
    ) -> Self {
        Self {
            id,
            addr,
            outbound,
            packet_rate: RateKeeper::new(spam_limit, Duration::from_secs(3)),
            idle_notified: false,
            early_queue: EarlyPacketQueue::new(early_queue_capacity),
        }
    }

    /// Sends one frame to this connection's network-loop writer. Silently
    /// drops the send if the writer has already gone away — the matching
    /// `Disconnected` event will arrive on its own and clean things up.
    pub fn send(&self, frame: OutboundFrame) {
        if let Err(err) = self.outbound.try_send(frame) {
            tracing::debug!(con_id = %self.id, ?err, "outbound channel unavailable, dropping frame");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// A cheap clone of the outbound sender, handed to code (the room, the
    /// listing cache's delivery path) that needs to push frames to this
    /// connection without borrowing it for as long as the call takes.
    pub fn sender(&self) -> mpsc::Sender<OutboundFrame> {
        self.outbound.clone()
    }
}
