//! The room state machine (§4.3): owns the host and its clients, routes
//! opaque game payloads between them, and closes deterministically.

use crate::error::RoomError;
use crate::events::OutboundFrame;
use bytes::Bytes;
use protocol::constants::{MAX_ROOM_STATE_BYTES, STREAM_SPLIT_THRESHOLD};
use protocol::{
    CloseReason, ConnectionClosed, ConnectionId, ConnectionIdling, ConnectionJoin,
    ConnectionPacketWrap, ControlPacket, Frame, GameType, RoomClosed, RoomId, RoomInfo,
    StreamChunk, StreamHead, StreamPayloadType, DEFAULT_CHUNK_SIZE,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// What happened when a connection that was attached to the room dropped.
pub enum DisconnectOutcome {
    /// The host dropped — the room just cascaded closed. The caller owns
    /// tearing down every listed connection at the transport level.
    HostClosed(Vec<ConnectionId>),
    ClientRemoved,
    NotAMember,
    AlreadyClosed,
}

pub enum ForwardResult {
    Forwarded,
    /// The client-side `conID` in a host-originated wrap has no match. The
    /// only case where a phantom id gets reported back (§4.3).
    UnknownTarget,
    NotAMember,
}

pub struct Room {
    pub id: RoomId,
    pub game_type: Option<GameType>,
    host: ConnectionId,
    host_sender: mpsc::Sender<OutboundFrame>,
    clients: HashMap<ConnectionId, mpsc::Sender<OutboundFrame>>,
    pub created_at: Instant,
    pub closed_at: Option<Instant>,
    pub last_state_received: Option<Instant>,
    pub last_state_requested: Option<Instant>,
    pub is_public: bool,
    pub is_protected: bool,
    pub can_request_state: bool,
    pub requesting_state: bool,
    pub password: u16,
    pub raw_state: Bytes,
    pub packets_forwarded: u64,
    closed: bool,
}

fn send_control(sender: &mpsc::Sender<OutboundFrame>, packet: ControlPacket) {
    if let Err(err) = sender.try_send(OutboundFrame::reliable(Frame::Control(packet))) {
        tracing::debug!(?err, "dropping control packet, receiver gone");
    }
}

fn send_raw(sender: &mpsc::Sender<OutboundFrame>, raw: Bytes, reliable: bool) {
    let frame = OutboundFrame {
        frame: Frame::Raw(raw),
        reliable,
    };
    if let Err(err) = sender.try_send(frame) {
        tracing::debug!(?err, "dropping raw payload, receiver gone");
    }
}

/// Splits `packet` (already known to be oversized) into a head + chunks and
/// sends them in order. Used whenever a `RoomInfo`/`RoomList`/`RoomState`
/// exceeds [`STREAM_SPLIT_THRESHOLD`].
fn send_streamed(sender: &mpsc::Sender<OutboundFrame>, stream_id: u32, payload_type: StreamPayloadType, encoded: &[u8]) {
    let head = StreamHead {
        stream_id,
        total_len: encoded.len() as u32,
        payload_type,
        compressed: false,
    };
    if let Err(err) = sender.try_send(OutboundFrame::reliable(Frame::StreamHead(head))) {
        tracing::debug!(?err, "dropping stream head, receiver gone");
        return;
    }
    for chunk_bytes in encoded.chunks(DEFAULT_CHUNK_SIZE) {
        let last = chunk_bytes.as_ptr() as usize + chunk_bytes.len()
            == encoded.as_ptr() as usize + encoded.len();
        let chunk = StreamChunk {
            stream_id,
            data: Bytes::copy_from_slice(chunk_bytes),
            last,
        };
        if let Err(err) = sender.try_send(OutboundFrame::reliable(Frame::StreamChunk(chunk))) {
            tracing::debug!(?err, "dropping stream chunk, receiver gone");
            return;
        }
    }
}

impl Room {
    pub fn new(
        id: RoomId,
        game_type: Option<GameType>,
        host: ConnectionId,
        host_sender: mpsc::Sender<OutboundFrame>,
    ) -> Self {
        Self {
            id,
            game_type,
            host,
            host_sender,
            clients: HashMap::new(),
            created_at: Instant::now(),
            closed_at: None,
            last_state_received: None,
            last_state_requested: None,
            is_public: false,
            is_protected: false,
            can_request_state: false,
            requesting_state: false,
            password: 0,
            raw_state: Bytes::new(),
            packets_forwarded: 0,
            closed: false,
        }
    }

    pub fn host_id(&self) -> ConnectionId {
        self.host
    }

    /// Sends an arbitrary control packet to the host. Used for things the
    /// room itself doesn't originate — operator broadcasts, shutdown warnings.
    pub fn notify_host(&self, packet: ControlPacket) {
        send_control(&self.host_sender, packet);
    }

    pub fn is_host(&self, id: ConnectionId) -> bool {
        self.host == id
    }

    pub fn has_member(&self, id: ConnectionId) -> bool {
        self.host == id || self.clients.contains_key(&id)
    }

    pub fn has_client(&self, id: ConnectionId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn client_ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.clients.keys().copied()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// §4.3 `connected(c)`: announce the join to the host, then add the
    /// client. `address_hash` is the stable, non-reversible digest over the
    /// client's `IpAddr` (see `relay_core::hash::address_hash`).
    pub fn connected(&mut self, id: ConnectionId, sender: mpsc::Sender<OutboundFrame>, address_hash: u64) {
        if self.closed {
            return;
        }
        send_control(
            &self.host_sender,
            ControlPacket::ConnectionJoin(ConnectionJoin { con_id: id, address_hash }),
        );
        self.clients.insert(id, sender);
    }

    /// §4.3 `disconnected(c, reason)`.
    pub fn disconnected(&mut self, id: ConnectionId, reason: CloseReason) -> DisconnectOutcome {
        if self.closed {
            return DisconnectOutcome::AlreadyClosed;
        }
        if id == self.host {
            match self.close(reason) {
                Some(ids) => DisconnectOutcome::HostClosed(ids),
                None => DisconnectOutcome::AlreadyClosed,
            }
        } else if self.clients.remove(&id).is_some() {
            send_control(
                &self.host_sender,
                ControlPacket::ConnectionClosed(ConnectionClosed { con_id: id, reason }),
            );
            DisconnectOutcome::ClientRemoved
        } else {
            DisconnectOutcome::NotAMember
        }
    }

    /// §4.3 `disconnectedQuietly(c, reason)`: used when the host itself asks
    /// to close one of its clients — no need to tell the host about its own
    /// request.
    pub fn disconnected_quietly(&mut self, id: ConnectionId) -> bool {
        self.clients.remove(&id).is_some()
    }

    /// §4.3 idle propagation. The caller (Relay) is responsible for the
    /// per-connection "already notified" flag; this only emits the packet.
    pub fn notify_idle(&mut self, id: ConnectionId) {
        if !self.has_member(id) {
            return;
        }
        send_control(
            &self.host_sender,
            ControlPacket::ConnectionIdling(ConnectionIdling { con_id: id }),
        );
    }

    /// §4.3 forwarding protocol, client → host leg.
    pub fn forward_from_client(&mut self, from: ConnectionId, raw: Bytes, reliable: bool) -> ForwardResult {
        if !self.clients.contains_key(&from) {
            return ForwardResult::NotAMember;
        }
        self.packets_forwarded += 1;
        send_control(
            &self.host_sender,
            ControlPacket::ConnectionPacketWrap(ConnectionPacketWrap {
                con_id: from,
                is_tcp: reliable,
                raw,
            }),
        );
        ForwardResult::Forwarded
    }

    /// §4.3 forwarding protocol, host → client leg. `from_host` guards
    /// against anyone but the host invoking this.
    pub fn forward_from_host(&mut self, from_host: ConnectionId, target: ConnectionId, raw: Bytes, reliable: bool) -> ForwardResult {
        if from_host != self.host {
            return ForwardResult::NotAMember;
        }
        match self.clients.get(&target) {
            Some(sender) => {
                self.packets_forwarded += 1;
                send_raw(sender, raw, reliable);
                ForwardResult::Forwarded
            }
            None => {
                send_control(
                    &self.host_sender,
                    ControlPacket::ConnectionClosed(ConnectionClosed {
                        con_id: target,
                        reason: CloseReason::Error,
                    }),
                );
                ForwardResult::UnknownTarget
            }
        }
    }

    /// §4.3 `setConfiguration`.
    pub fn set_configuration(&mut self, is_public: bool, is_protected: bool, password: u16, can_request_state: bool) {
        self.is_public = is_public;
        self.is_protected = is_protected;
        self.password = password;
        self.can_request_state = can_request_state;
    }

    /// §4.3 `setState`.
    pub fn set_state(&mut self, state: Bytes) -> Result<(), RoomError> {
        if state.len() > MAX_ROOM_STATE_BYTES {
            return Err(RoomError::StateTooLarge(state.len()));
        }
        self.raw_state = state;
        self.requesting_state = false;
        self.last_state_received = Some(Instant::now());
        Ok(())
    }

    /// §4.3 `requestState`. Returns whether a request was actually emitted.
    pub fn request_state(&mut self, now: Instant, state_timeout: Duration) -> bool {
        if self.requesting_state {
            return false;
        }
        let should_request = match self.last_state_requested {
            None => true,
            Some(last) => now.duration_since(last) >= state_timeout,
        };
        if !should_request {
            return false;
        }
        self.requesting_state = true;
        self.last_state_requested = Some(now);
        send_control(&self.host_sender, ControlPacket::RoomStateRequest);
        true
    }

    pub fn is_state_outdated(&self, now: Instant, state_lifetime: Duration) -> bool {
        match self.last_state_received {
            None => true,
            Some(last) => now.duration_since(last) >= state_lifetime,
        }
    }

    pub fn should_request_state(&self) -> bool {
        self.can_request_state
    }

    /// §4.3 `sendRoomState(c)`. `stream_id` must be unique for the target
    /// connection; the caller owns allocating it.
    pub fn send_room_state(&self, target: &mpsc::Sender<OutboundFrame>, stream_id: u32) {
        let state = if self.is_public {
            Some(self.raw_state.clone())
        } else {
            None
        };
        let info = RoomInfo {
            room_id: self.id,
            is_protected: self.is_protected,
            game_type: self.game_type,
            state,
        };
        let size = info.state.as_ref().map(|s| s.len()).unwrap_or(0);
        if size > STREAM_SPLIT_THRESHOLD {
            let encoded = postcard::to_allocvec(&info).expect("RoomInfo always encodes");
            send_streamed(target, stream_id, StreamPayloadType::RoomInfo, &encoded);
        } else {
            send_control(target, ControlPacket::RoomInfo(info));
        }
    }

    /// §4.3 `close(reason)`. Idempotent: the first call marks the room
    /// closed *before* notifying anyone (so any inbound event that races
    /// this call sees a closed room and is a no-op), notifies the host, then
    /// every client, then drops the client map. Returns every connection id
    /// that must be torn down at the transport level, or `None` if the room
    /// was already closed.
    pub fn close(&mut self, reason: CloseReason) -> Option<Vec<ConnectionId>> {
        if self.closed {
            return None;
        }
        self.closed = true;
        self.closed_at = Some(Instant::now());

        send_control(&self.host_sender, ControlPacket::RoomClosed(RoomClosed { reason }));

        let mut torn_down = Vec::with_capacity(self.clients.len() + 1);
        torn_down.push(self.host);
        for (id, sender) in self.clients.drain() {
            send_control(&sender, ControlPacket::RoomClosed(RoomClosed { reason }));
            torn_down.push(id);
        }
        Some(torn_down)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    fn test_room() -> (Room, mpsc::Receiver<OutboundFrame>) {
        let (tx, rx) = mpsc::channel(16);
        let room = Room::new(RoomId::new(7).unwrap(), Some(GameType::new("T")), ConnectionId::new(1), tx);
        (room, rx)
    }

    fn expect_control(rx: &mut mpsc::Receiver<OutboundFrame>) -> ControlPacket {
        match rx.try_recv() {
            Ok(OutboundFrame { frame: Frame::Control(packet), .. }) => packet,
            other => panic!("expected a control packet, got {other:?}"),
        }
    }

    #[test]
    fn host_never_ends_up_in_clients() {
        let (mut room, mut host_rx) = test_room();
        let (client_tx, _client_rx) = mpsc::channel(4);
        room.connected(ConnectionId::new(2), client_tx, 0xDEADBEEF);
        assert!(!room.has_client(room.host_id()));
        assert!(room.has_client(ConnectionId::new(2)));
        assert!(matches!(expect_control(&mut host_rx), ControlPacket::ConnectionJoin(_)));
    }

    #[test]
    fn client_wrap_round_trip() {
        let (mut room, mut host_rx) = test_room();
        let (client_tx, mut client_rx) = mpsc::channel(4);
        room.connected(ConnectionId::new(2), client_tx, 0);

        let raw = Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(matches!(
            room.forward_from_client(ConnectionId::new(2), raw.clone(), true),
            ForwardResult::Forwarded
        ));
        // Drain the join notice first.
        let _ = host_rx.try_recv();
        match expect_control(&mut host_rx) {
            ControlPacket::ConnectionPacketWrap(wrap) => {
                assert_eq!(wrap.con_id, ConnectionId::new(2));
                assert!(wrap.is_tcp);
                assert_eq!(wrap.raw, raw);
            }
            other => panic!("unexpected {other:?}"),
        }

        let reply = Bytes::from_static(&[0xFE, 0xED]);
        assert!(matches!(
            room.forward_from_host(room.host_id(), ConnectionId::new(2), reply.clone(), false),
            ForwardResult::Forwarded
        ));
        match client_rx.try_recv() {
            Ok(OutboundFrame { frame: Frame::Raw(bytes), reliable: false }) => assert_eq!(bytes, reply),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrap_to_unknown_target_reports_phantom_id() {
        let (mut room, mut host_rx) = test_room();
        let _ = host_rx.try_recv(); // nothing queued yet, still fine to drain
        let outcome = room.forward_from_host(room.host_id(), ConnectionId::new(99), Bytes::new(), true);
        assert!(matches!(outcome, ForwardResult::UnknownTarget));
        match expect_control(&mut host_rx) {
            ControlPacket::ConnectionClosed(closed) => {
                assert_eq!(closed.con_id, ConnectionId::new(99));
                assert_eq!(closed.reason, CloseReason::Error);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn close_is_idempotent_and_cascades() {
        let (mut room, mut host_rx) = test_room();
        let (client_tx, mut client_rx) = mpsc::channel(4);
        room.connected(ConnectionId::new(2), client_tx, 0);
        let _ = host_rx.try_recv(); // join notice

        let ids = room.close(CloseReason::Error).expect("first close reports ids");
        assert_eq!(ids.len(), 2);
        assert!(room.is_closed());
        assert_eq!(room.client_count(), 0);
        assert!(matches!(expect_control(&mut host_rx), ControlPacket::RoomClosed(_)));
        assert!(matches!(expect_control(&mut client_rx), ControlPacket::RoomClosed(_)));

        assert!(room.close(CloseReason::Error).is_none());
        assert_eq!(host_rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn request_state_respects_timeout_and_in_flight_flag() {
        let (mut room, mut host_rx) = test_room();
        let now = Instant::now();
        assert!(room.request_state(now, Duration::from_millis(100)));
        let _ = expect_control(&mut host_rx);
        // Already awaiting a reply: no second request.
        assert!(!room.request_state(now, Duration::from_millis(100)));
        room.set_state(Bytes::from_static(b"state")).unwrap();
        // Requested again immediately: too soon.
        assert!(!room.request_state(now, Duration::from_millis(100)));
        // After the timeout elapses, a new request goes out.
        assert!(room.request_state(now + Duration::from_millis(200), Duration::from_millis(100)));
    }

    #[test]
    fn state_over_cap_is_rejected() {
        let (mut room, _host_rx) = test_room();
        let oversized = Bytes::from(vec![0u8; MAX_ROOM_STATE_BYTES + 1]);
        assert!(matches!(room.set_state(oversized), Err(RoomError::StateTooLarge(_))));
    }
}
