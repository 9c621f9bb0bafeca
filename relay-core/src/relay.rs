//! The dispatcher (§4.5): owns every room and connection, handles every
//! control packet, gates access, serves discovery. This is the single
//! `tokio::task` described in §5 — everything else only ever talks to it
//! through `RelayEvent`s on a bounded channel.

use crate::config::RelayConfig;
use crate::connection::Connection;
use crate::events::{AdminCommand, OutboundFrame, RelayEvent};
use crate::hash::address_hash;
use crate::listing::{JoinOutcome, ListingCache};
use crate::rate::RateKeeper;
use crate::room::{DisconnectOutcome, Room};
use crate::status::{RelayStatus, RoomStatus};
use crate::timers::{TimerKey, Timers};
use protocol::constants::EARLY_PACKET_QUEUE_CAPACITY;
use protocol::{
    CloseReason, ConnectionClosed, ConnectionId, ControlPacket, Frame, GameType, HostToast,
    MessageType, RejectReason, RoomId, RoomJoinAccepted, RoomJoinDenied,
    RoomLink, RoomList, ServerBroadcast,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// The deferred-close grace period (§4.2, §5): buffered sends get this long
/// to flush before the connection's outbound sender is actually dropped.
const DEFERRED_CLOSE_DELAY: Duration = Duration::from_millis(50);

pub struct Relay {
    config: RelayConfig,
    rooms: HashMap<RoomId, Room>,
    con_to_room: HashMap<ConnectionId, RoomId>,
    types: HashMap<GameType, HashSet<RoomId>>,
    listing: HashMap<GameType, ListingCache>,
    pending_info: HashMap<RoomId, Vec<ConnectionId>>,
    connections: HashMap<ConnectionId, Connection>,
    /// FIFO of connections with no room yet, oldest first. Bounds
    /// `max_unattached_connections` (§9.1) without needing a reverse index
    /// into `connections`.
    unattached_order: VecDeque<ConnectionId>,
    join_rate: HashMap<IpAddr, RateKeeper>,
    info_rate: HashMap<IpAddr, RateKeeper>,
    list_rate: HashMap<IpAddr, RateKeeper>,
    timers: Timers,
    next_stream_id: u32,
    closing: bool,
    shutdown_reply: Option<tokio::sync::oneshot::Sender<()>>,
    event_tx: mpsc::Sender<RelayEvent>,
    debug_logging_hook: Option<Arc<dyn Fn(bool) + Send + Sync>>,
}

impl Relay {
    pub fn new(config: RelayConfig, event_tx: mpsc::Sender<RelayEvent>) -> Self {
        Self {
            config,
            rooms: HashMap::new(),
            con_to_room: HashMap::new(),
            types: HashMap::new(),
            listing: HashMap::new(),
            pending_info: HashMap::new(),
            connections: HashMap::new(),
            unattached_order: VecDeque::new(),
            join_rate: HashMap::new(),
            info_rate: HashMap::new(),
            list_rate: HashMap::new(),
            timers: Timers::new(),
            next_stream_id: 0,
            closing: false,
            shutdown_reply: None,
            event_tx,
            debug_logging_hook: None,
        }
    }

    /// Lets `relay-server` wire `set_debug_logging` through to its
    /// `tracing-subscriber` `EnvFilter` reload handle without this crate
    /// knowing anything about the logging setup.
    pub fn set_debug_logging_hook(&mut self, hook: Arc<dyn Fn(bool) + Send + Sync>) {
        self.debug_logging_hook = Some(hook);
    }

    /// The main loop. Runs until the event channel closes (every sender —
    /// every network-loop task plus the admin surface — has been dropped).
    pub async fn run(mut self, mut rx: mpsc::Receiver<RelayEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle_event(event);
        }
        tracing::info!("relay event channel closed, main loop exiting");
    }

    fn handle_event(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Connected { id, addr, outbound } => self.on_connected(id, addr, outbound),
            RelayEvent::Disconnected { id } => self.on_disconnected(id),
            RelayEvent::Inbound { id, frame, reliable } => self.on_inbound(id, frame, reliable),
            RelayEvent::Malformed { id } => {
                tracing::warn!(con_id = %id, "malformed frame, disconnecting");
                self.kick(id, CloseReason::Error);
            }
            RelayEvent::Idle { id } => self.on_idle(id),
            RelayEvent::Timer(key) => self.on_timer(key),
            RelayEvent::Admin(cmd) => self.on_admin(cmd),
        }
    }

    // ---- ingress ---------------------------------------------------

    fn on_connected(&mut self, id: ConnectionId, addr: IpAddr, outbound: mpsc::Sender<OutboundFrame>) {
        if self.closing || self.config.is_address_blacklisted(&addr) {
            tracing::info!(con_id = %id, %addr, "rejecting connection at ingress");
            return; // dropping `outbound` here is what tears the transport down
        }
        if self.unattached_order.len() >= self.config.max_unattached_connections {
            if let Some(oldest) = self.unattached_order.pop_front() {
                tracing::warn!(con_id = %oldest, "unattached-connection cap reached, evicting oldest");
                self.connections.remove(&oldest);
            }
        }
        self.connections.insert(
            id,
            Connection::new(id, addr, outbound, self.config.spam_limit, EARLY_PACKET_QUEUE_CAPACITY),
        );
        self.unattached_order.push_back(id);
        tracing::debug!(con_id = %id, %addr, "connection opened");
        // Tells the peer our protocol version up front, mirroring the
        // teacher's post-handshake "inform_client_of_connection" ack — a
        // client can then pick outdatedClient/outdatedServer behavior before
        // ever sending a RoomCreationRequest.
        self.send_notice(
            id,
            ControlPacket::ServerInfo(protocol::ServerInfo {
                version: protocol::constants::SERVER_MAJOR_VERSION,
            }),
        );
    }

    fn on_disconnected(&mut self, id: ConnectionId) {
        self.connections.remove(&id);
        self.unattached_order.retain(|&queued| queued != id);
        if let Some(room_id) = self.con_to_room.remove(&id) {
            if let Some(room) = self.rooms.get_mut(&room_id) {
                if let DisconnectOutcome::HostClosed(members) = room.disconnected(id, CloseReason::Closed) {
                    self.teardown_room(room_id, members);
                }
            }
        }
    }

    fn on_idle(&mut self, id: ConnectionId) {
        let already_notified = match self.connections.get(&id) {
            Some(conn) => conn.idle_notified,
            None => return,
        };
        if already_notified {
            return;
        }
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.idle_notified = true;
        }
        if let Some(room_id) = self.con_to_room.get(&id).copied() {
            if let Some(room) = self.rooms.get_mut(&room_id) {
                room.notify_idle(id);
            }
        }
    }

    fn on_inbound(&mut self, id: ConnectionId, frame: Frame, reliable: bool) {
        if !self.connections.contains_key(&id) {
            return;
        }
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.idle_notified = false;
        }

        let is_host = self
            .con_to_room
            .get(&id)
            .and_then(|room_id| self.rooms.get(room_id))
            .map(|room| room.is_host(id))
            .unwrap_or(false);
        if !is_host {
            let now = Instant::now();
            let within_limit = match self.connections.get_mut(&id) {
                Some(conn) => conn.packet_rate.record(now),
                None => return,
            };
            if !within_limit {
                tracing::warn!(con_id = %id, "packet rate exceeded, kicking");
                if let Some(room_id) = self.con_to_room.get(&id).copied() {
                    if let Some(room) = self.rooms.get(&room_id) {
                        room.notify_host(ControlPacket::HostToast(HostToast { message: MessageType::PacketSpamming }));
                    }
                }
                self.kick(id, CloseReason::Error);
                return;
            }
        }

        match frame {
            Frame::Control(packet) => self.handle_control(id, packet),
            Frame::Raw(raw) => self.handle_raw(id, raw, reliable),
            Frame::StreamHead(_) | Frame::StreamChunk(_) => {
                debug_assert!(false, "stream reassembly belongs to the network loop, not the main loop");
                tracing::warn!(con_id = %id, "unexpected bare stream frame reached the relay");
            }
        }
    }

    fn handle_raw(&mut self, id: ConnectionId, raw: bytes::Bytes, reliable: bool) {
        match self.con_to_room.get(&id).copied() {
            Some(room_id) => {
                let Some(room) = self.rooms.get_mut(&room_id) else {
                    debug_assert!(false, "conToRoom entry without a matching room");
                    self.con_to_room.remove(&id);
                    return;
                };
                if !room.is_host(id) {
                    room.forward_from_client(id, raw, reliable);
                }
            }
            None => {
                if let Some(conn) = self.connections.get_mut(&id) {
                    if !conn.early_queue.push(raw, reliable) {
                        tracing::debug!(con_id = %id, "early-packet queue full, dropping payload");
                    }
                }
            }
        }
    }

    // ---- control-packet routing (§4.5) -------------------------------

    fn handle_control(&mut self, id: ConnectionId, packet: ControlPacket) {
        match packet {
            ControlPacket::RoomCreationRequest(req) => self.handle_room_creation(id, req.version, req.game_type),
            ControlPacket::RoomClosureRequest => self.handle_room_closure_request(id),
            ControlPacket::RoomJoinRequest(req) => self.handle_join(id, req.room_id, req.game_type, req.with_password, req.password, false),
            ControlPacket::RoomJoin(req) => self.handle_join(id, req.room_id, req.game_type, req.with_password, req.password, true),
            ControlPacket::RoomConfig(cfg) => self.handle_room_config(id, cfg),
            ControlPacket::RoomState(st) => self.handle_room_state(id, st.state),
            ControlPacket::RoomInfoRequest(req) => self.handle_room_info_request(id, req.room_id),
            ControlPacket::RoomListRequest(req) => self.handle_room_list_request(id, req.game_type),
            ControlPacket::ConnectionClosed(req) => self.handle_connection_closed_from_host(id, req),
            ControlPacket::ConnectionPacketWrap(wrap) => {
                if let Some(room_id) = self.con_to_room.get(&id).copied() {
                    if let Some(room) = self.rooms.get_mut(&room_id) {
                        room.forward_from_host(id, wrap.con_id, wrap.raw, wrap.is_tcp);
                    }
                }
            }
            // Everything else in the protocol is server→client only; a client
            // sending one of these is violating the protocol.
            _ => {
                tracing::warn!(con_id = %id, "client sent a server-only control packet, disconnecting");
                self.kick(id, CloseReason::ObsoleteClient);
            }
        }
    }

    fn handle_room_creation(&mut self, id: ConnectionId, version: i32, game_type: Option<GameType>) {
        if self.closing {
            self.send_notice(id, ControlPacket::RoomClosed(protocol::RoomClosed { reason: CloseReason::ServerClosed }));
            self.kick(id, CloseReason::ServerClosed);
            return;
        }
        if version != protocol::constants::SERVER_MAJOR_VERSION {
            let reason = if version < protocol::constants::SERVER_MAJOR_VERSION {
                CloseReason::OutdatedClient
            } else {
                CloseReason::OutdatedServer
            };
            self.send_notice(id, ControlPacket::RoomClosed(protocol::RoomClosed { reason }));
            self.kick(id, reason);
            return;
        }
        if let Some(gt) = game_type {
            if self.config.is_type_blacklisted(&gt) {
                self.send_notice(id, ControlPacket::RoomClosed(protocol::RoomClosed { reason: CloseReason::Blacklisted }));
                self.kick(id, CloseReason::Blacklisted);
                return;
            }
        }
        if self.is_hosting(id) {
            self.send_notice(id, ControlPacket::HostToast(HostToast { message: MessageType::AlreadyHosting }));
            return;
        }
        let room_id = self.mint_room_id();
        let Some(conn) = self.connections.get(&id) else { return };
        let room = Room::new(room_id, game_type, id, conn.sender());
        self.rooms.insert(room_id, room);
        self.con_to_room.insert(id, room_id);
        self.unattached_order.retain(|&queued| queued != id);
        if let Some(gt) = game_type {
            self.types.entry(gt).or_default().insert(room_id);
        }
        tracing::info!(con_id = %id, room = %room_id, "room created");
        self.send_notice(id, ControlPacket::RoomLink(RoomLink { room_id }));
    }

    fn handle_room_closure_request(&mut self, id: ConnectionId) {
        if let Some(room_id) = self.con_to_room.get(&id).copied() {
            if let Some(room) = self.rooms.get_mut(&room_id) {
                if room.is_host(id) {
                    if let Some(members) = room.close(CloseReason::Closed) {
                        self.teardown_room(room_id, members);
                    }
                    return;
                }
            }
        }
        self.send_notice(id, ControlPacket::HostToast(HostToast { message: MessageType::RoomClosureDenied }));
    }

    fn is_hosting(&self, id: ConnectionId) -> bool {
        self.con_to_room
            .get(&id)
            .and_then(|room_id| self.rooms.get(room_id))
            .map(|room| room.is_host(id))
            .unwrap_or(false)
    }

    /// §4.5 `RoomJoin`/`RoomJoinRequest` evaluation order, shared by both.
    fn evaluate_join(&mut self, requester: ConnectionId, room_id: RoomId, game_type: Option<GameType>, with_password: bool, password: u16, addr: IpAddr, now: Instant) -> Result<(), RejectReason> {
        if self.is_hosting(requester) {
            // Same visible effect as "not found" — don't leak that the
            // requester is blocked specifically because they're a host.
            return Err(RejectReason::RoomNotFound);
        }
        if self.closing {
            return Err(RejectReason::ServerClosing);
        }
        let Some(room) = self.rooms.get(&room_id) else {
            return Err(RejectReason::RoomNotFound);
        };
        let allowed = {
            let rate = self
                .join_rate
                .entry(addr)
                .or_insert_with(|| RateKeeper::new(self.config.join_limit, Duration::from_secs(60)));
            rate.record(now)
        };
        if !allowed {
            return Err(RejectReason::RoomNotFound);
        }
        let mismatch = match (room.game_type, game_type) {
            (Some(a), Some(b)) => a != b,
            (None, Some(_)) | (Some(_), None) => !self.config.accept_no_type,
            (None, None) => false,
        };
        if mismatch {
            return Err(RejectReason::Incompatible);
        }
        if room.is_protected {
            if !with_password {
                return Err(RejectReason::PasswordRequired);
            }
            if password != room.password {
                return Err(RejectReason::InvalidPassword);
            }
        }
        Ok(())
    }

    fn handle_join(&mut self, id: ConnectionId, room_id: RoomId, game_type: Option<GameType>, with_password: bool, password: u16, commit: bool) {
        let Some(addr) = self.connections.get(&id).map(|c| c.addr) else { return };
        let now = Instant::now();
        match self.evaluate_join(id, room_id, game_type, with_password, password, addr, now) {
            Err(reason) => {
                self.send_notice(id, ControlPacket::RoomJoinDenied(RoomJoinDenied { room_id: Some(room_id), reason }));
            }
            Ok(()) => {
                if !commit {
                    self.send_notice(id, ControlPacket::RoomJoinAccepted(RoomJoinAccepted { room_id }));
                    return;
                }
                // Unhook any previous (client-side) room membership, notifying its host.
                if let Some(prev_room_id) = self.con_to_room.remove(&id) {
                    if let Some(prev_room) = self.rooms.get_mut(&prev_room_id) {
                        prev_room.disconnected(id, CloseReason::Closed);
                    }
                }
                let Some(sender) = self.connections.get(&id).map(|c| c.sender()) else { return };
                let addr_hash = address_hash(addr);
                let Some(room) = self.rooms.get_mut(&room_id) else { return };
                room.connected(id, sender, addr_hash);
                self.con_to_room.insert(id, room_id);
                self.unattached_order.retain(|&queued| queued != id);

                let queued = self
                    .connections
                    .get_mut(&id)
                    .map(|conn| conn.early_queue.drain())
                    .unwrap_or_default();
                if !queued.is_empty() {
                    if let Some(room) = self.rooms.get_mut(&room_id) {
                        for packet in queued {
                            room.forward_from_client(id, packet.raw, packet.reliable);
                        }
                    }
                }
            }
        }
    }

    fn handle_room_config(&mut self, id: ConnectionId, cfg: protocol::RoomConfig) {
        let Some(room_id) = self.con_to_room.get(&id).copied() else { return };
        let Some(room) = self.rooms.get_mut(&room_id) else { return };
        if !room.is_host(id) {
            self.send_notice(id, ControlPacket::HostToast(HostToast { message: MessageType::ConfigureDenied }));
            return;
        }
        room.set_configuration(cfg.is_public, cfg.is_protected, cfg.password, cfg.can_request_state);
        self.touch_listing_configuration(room_id);
    }

    fn handle_room_state(&mut self, id: ConnectionId, state: protocol::RawState) {
        let Some(room_id) = self.con_to_room.get(&id).copied() else { return };
        let Some(room) = self.rooms.get_mut(&room_id) else { return };
        if !room.is_host(id) {
            self.send_notice(id, ControlPacket::HostToast(HostToast { message: MessageType::StatingDenied }));
            return;
        }
        match room.set_state(state) {
            Ok(()) => {
                self.flush_pending_info(room_id);
                self.touch_listing_state(room_id);
            }
            Err(crate::error::RoomError::StateTooLarge(len)) => {
                tracing::warn!(con_id = %id, len, "host sent oversized room state");
                self.kick(id, CloseReason::Error);
            }
            Err(_) => {}
        }
    }

    fn handle_room_info_request(&mut self, id: ConnectionId, room_id: RoomId) {
        let Some(addr) = self.connections.get(&id).map(|c| c.addr) else { return };
        let now = Instant::now();
        let allowed = {
            let rate = self
                .info_rate
                .entry(addr)
                .or_insert_with(|| RateKeeper::new(self.config.info_limit, Duration::from_secs(3)));
            rate.record(now)
        };
        if !allowed {
            self.send_notice(id, ControlPacket::RoomInfoDenied);
            return;
        }
        if !self.rooms.contains_key(&room_id) {
            self.send_notice(id, ControlPacket::RoomInfoDenied);
            return;
        }
        let state_lifetime = self.config.state_lifetime();
        let state_timeout = self.config.state_timeout();
        let needs_request = {
            let room = self.rooms.get(&room_id).expect("checked above");
            room.should_request_state() && room.is_state_outdated(now, state_lifetime)
        };
        if needs_request {
            let room = self.rooms.get_mut(&room_id).expect("checked above");
            room.request_state(now, state_timeout);
            self.pending_info.entry(room_id).or_default().push(id);
            if !self.timers.is_armed(&TimerKey::PendingInfoFlush(room_id)) {
                self.timers.arm(TimerKey::PendingInfoFlush(room_id), state_timeout, self.event_tx.clone());
            }
            return;
        }
        let Some(sender) = self.connections.get(&id).map(|c| c.sender()) else { return };
        let stream_id = self.alloc_stream_id();
        let room = self.rooms.get(&room_id).expect("checked above");
        room.send_room_state(&sender, stream_id);
    }

    fn handle_room_list_request(&mut self, id: ConnectionId, game_type: GameType) {
        let Some(addr) = self.connections.get(&id).map(|c| c.addr) else { return };
        let now = Instant::now();
        let allowed = {
            let rate = self
                .list_rate
                .entry(addr)
                .or_insert_with(|| RateKeeper::new(self.config.list_limit, Duration::from_secs(3)));
            rate.record(now)
        };
        if !allowed || !self.types.contains_key(&game_type) {
            self.send_notice(id, ControlPacket::RoomList(RoomList::default()));
            return;
        }

        let cache = self.listing.entry(game_type).or_default();
        if matches!(cache.join(id), JoinOutcome::AlreadyRefreshing) {
            return;
        }

        let room_ids: Vec<RoomId> = self.types.get(&game_type).map(|ids| ids.iter().copied().collect()).unwrap_or_default();
        for rid in room_ids {
            let Some(room) = self.rooms.get_mut(&rid) else { continue };
            if room.is_public && room.should_request_state() && room.is_state_outdated(now, self.config.state_lifetime()) {
                if room.request_state(now, self.config.state_timeout()) {
                    if let Some(cache) = self.listing.get_mut(&game_type) {
                        cache.mark_requesting(rid);
                    }
                }
            }
        }

        let snapshot = self.build_listing_snapshot(game_type);
        let recipients = self.listing.get_mut(&game_type).and_then(|c| c.settle(snapshot.clone()));
        match recipients {
            Some(recipients) => self.deliver_room_list(&snapshot, recipients),
            None => {
                self.timers.arm(TimerKey::TypeListRefresh(game_type), self.config.list_timeout(), self.event_tx.clone());
            }
        }
    }

    fn handle_connection_closed_from_host(&mut self, id: ConnectionId, req: ConnectionClosed) {
        let Some(room_id) = self.con_to_room.get(&id).copied() else { return };
        let Some(room) = self.rooms.get_mut(&room_id) else { return };
        if !room.is_host(id) {
            self.send_notice(id, ControlPacket::HostToast(HostToast { message: MessageType::ConClosureDenied }));
            return;
        }
        if !room.has_client(req.con_id) {
            return;
        }
        room.disconnected_quietly(req.con_id);
        self.con_to_room.remove(&req.con_id);
        self.schedule_deferred_close(req.con_id);
    }

    // ---- listing helpers --------------------------------------------

    fn build_listing_snapshot(&self, game_type: GameType) -> RoomList {
        let mut list = RoomList::default();
        if let Some(ids) = self.types.get(&game_type) {
            for &rid in ids {
                let Some(room) = self.rooms.get(&rid) else { continue };
                if !room.is_public {
                    continue;
                }
                if room.should_request_state() {
                    list.states.push((rid, room.raw_state.clone()));
                }
                if room.is_protected {
                    list.protected_rooms.push(rid);
                }
            }
        }
        list
    }

    fn deliver_room_list(&self, list: &RoomList, recipients: Vec<ConnectionId>) {
        for rid in recipients {
            if let Some(conn) = self.connections.get(&rid) {
                conn.send(OutboundFrame::reliable(Frame::Control(ControlPacket::RoomList(list.clone()))));
            }
        }
    }

    fn touch_listing_configuration(&mut self, room_id: RoomId) {
        let Some(room) = self.rooms.get(&room_id) else { return };
        let Some(gt) = room.game_type else { return };
        let still_listed = room.is_public;
        let is_protected = room.is_protected;
        let state = if still_listed && room.should_request_state() {
            Some(room.raw_state.clone())
        } else {
            None
        };
        if let Some(cache) = self.listing.get_mut(&gt) {
            cache.on_configuration_changed(room_id, still_listed, is_protected, state);
        }
    }

    fn touch_listing_state(&mut self, room_id: RoomId) {
        let Some(room) = self.rooms.get(&room_id) else { return };
        let Some(gt) = room.game_type else { return };
        let snapshot = self.build_listing_snapshot(gt);
        if let Some(cache) = self.listing.get_mut(&gt) {
            if let Some(recipients) = cache.on_state_received(room_id, || snapshot.clone()) {
                self.deliver_room_list(&snapshot, recipients);
            }
        }
    }

    fn flush_pending_info(&mut self, room_id: RoomId) {
        self.timers.cancel(&TimerKey::PendingInfoFlush(room_id));
        let Some(requesters) = self.pending_info.remove(&room_id) else { return };
        if !self.rooms.contains_key(&room_id) {
            for requester in requesters {
                self.send_notice(requester, ControlPacket::RoomInfoDenied);
            }
            return;
        }
        // Stream ids are allocated up front so `room` only ever needs to be
        // borrowed once the book-keeping that needs `&mut self` is done.
        let mut targets = Vec::with_capacity(requesters.len());
        for requester in requesters {
            if let Some(sender) = self.connections.get(&requester).map(|c| c.sender()) {
                targets.push((sender, self.alloc_stream_id()));
            }
        }
        let room = self.rooms.get(&room_id).expect("checked above");
        for (sender, stream_id) in targets {
            room.send_room_state(&sender, stream_id);
        }
    }

    // ---- teardown -----------------------------------------------------

    fn send_notice(&self, id: ConnectionId, packet: ControlPacket) {
        if let Some(conn) = self.connections.get(&id) {
            conn.send(OutboundFrame::reliable(Frame::Control(packet)));
        }
    }

    fn schedule_deferred_close(&mut self, id: ConnectionId) {
        self.timers.arm(TimerKey::DeferredClose(id), DEFERRED_CLOSE_DELAY, self.event_tx.clone());
    }

    /// Kicks a still-connected offender: detaches it from its room (if any,
    /// cascading a host's closure) and schedules the deferred transport
    /// close so anything already queued still flushes.
    fn kick(&mut self, id: ConnectionId, reason: CloseReason) {
        if let Some(room_id) = self.con_to_room.remove(&id) {
            if let Some(room) = self.rooms.get_mut(&room_id) {
                if let DisconnectOutcome::HostClosed(members) = room.disconnected(id, reason) {
                    self.teardown_room(room_id, members);
                }
            }
        }
        self.unattached_order.retain(|&queued| queued != id);
        self.schedule_deferred_close(id);
    }

    /// Removes a closed room from every index (§8 invariant: "room removed
    /// ⇒ every entry for its clients in conToRoom removed, timers
    /// cancelled, type index and listing cache entry removed"), then
    /// schedules every former member's transport for deferred close.
    fn teardown_room(&mut self, room_id: RoomId, member_ids: Vec<ConnectionId>) {
        let game_type = self.rooms.remove(&room_id).and_then(|room| room.game_type);
        self.timers.cancel_room(room_id);
        if let Some(requesters) = self.pending_info.remove(&room_id) {
            for requester in requesters {
                self.send_notice(requester, ControlPacket::RoomInfoDenied);
            }
        }
        if let Some(gt) = game_type {
            let mut type_now_empty = false;
            if let Some(ids) = self.types.get_mut(&gt) {
                ids.remove(&room_id);
                type_now_empty = ids.is_empty();
                if type_now_empty {
                    self.types.remove(&gt);
                }
            }
            if let Some(cache) = self.listing.get_mut(&gt) {
                cache.on_configuration_changed(room_id, false, false, None);
                if type_now_empty {
                    self.listing.remove(&gt);
                }
            }
        }
        for member in member_ids {
            self.con_to_room.remove(&member);
            self.schedule_deferred_close(member);
        }
    }

    fn alloc_stream_id(&mut self) -> u32 {
        self.next_stream_id = self.next_stream_id.wrapping_add(1);
        self.next_stream_id
    }

    fn mint_room_id(&mut self) -> RoomId {
        loop {
            if let Some(id) = RoomId::new(rand::random()) {
                if !self.rooms.contains_key(&id) {
                    return id;
                }
            }
        }
    }

    // ---- timers ---------------------------------------------------------

    fn on_timer(&mut self, key: TimerKey) {
        match key {
            TimerKey::DeferredClose(id) => {
                self.connections.remove(&id);
            }
            TimerKey::PendingInfoFlush(room_id) => self.flush_pending_info(room_id),
            TimerKey::TypeListRefresh(game_type) => {
                let snapshot = self.build_listing_snapshot(game_type);
                if let Some(cache) = self.listing.get_mut(&game_type) {
                    let recipients = cache.watchdog_fire(snapshot.clone());
                    self.deliver_room_list(&snapshot, recipients);
                }
            }
            TimerKey::ShutdownGrace => self.finish_shutdown(),
        }
    }

    // ---- operator surface (§6) -------------------------------------------

    fn on_admin(&mut self, cmd: AdminCommand) {
        match cmd {
            AdminCommand::CloseRoom { short_id, reply } => {
                let outcome = RoomId::from_short(&short_id).and_then(|room_id| {
                    self.rooms
                        .get_mut(&room_id)
                        .and_then(|room| room.close(CloseReason::Closed))
                        .map(|members| (room_id, members))
                });
                let found = outcome.is_some();
                if let Some((room_id, members)) = outcome {
                    self.teardown_room(room_id, members);
                }
                let _ = reply.send(found);
            }
            AdminCommand::BroadcastText { message, reply } => {
                for room in self.rooms.values() {
                    room.notify_host(ControlPacket::ServerBroadcast(ServerBroadcast { text: message.clone() }));
                }
                let _ = reply.send(self.rooms.len());
            }
            AdminCommand::Status { reply } => {
                let rooms = self
                    .rooms
                    .iter()
                    .map(|(id, room)| RoomStatus {
                        short_id: id.to_short(),
                        game_type: room.game_type.map(|gt| gt.as_str().to_string()),
                        client_count: room.client_count(),
                        is_public: room.is_public,
                        is_protected: room.is_protected,
                        packets_forwarded: room.packets_forwarded,
                    })
                    .collect();
                let status = RelayStatus {
                    connection_count: self.connections.len(),
                    room_count: self.rooms.len(),
                    closing: self.closing,
                    rooms,
                };
                let _ = reply.send(status);
            }
            AdminCommand::SetBlacklist { addresses, reply } => {
                self.config.blacklist = addresses.into_iter().collect();
                let _ = reply.send(());
            }
            AdminCommand::SetSpamLimit { packets_per_3s, reply } => {
                // Only affects connections accepted from here on — existing
                // `RateKeeper`s already baked in the old limit at construction.
                self.config.spam_limit = packets_per_3s;
                let _ = reply.send(());
            }
            AdminCommand::RefreshRoomState { short_id, reply } => {
                let now = Instant::now();
                let ok = RoomId::from_short(&short_id)
                    .and_then(|room_id| self.rooms.get_mut(&room_id))
                    .map(|room| room.request_state(now, self.config.state_timeout()))
                    .unwrap_or(false);
                let _ = reply.send(ok);
            }
            AdminCommand::RefreshTypeList { game_type, reply } => {
                let now = Instant::now();
                let room_ids: Vec<RoomId> = self.types.get(&game_type).map(|ids| ids.iter().copied().collect()).unwrap_or_default();
                for rid in room_ids {
                    let Some(room) = self.rooms.get_mut(&rid) else { continue };
                    if room.is_public && room.should_request_state() && room.request_state(now, self.config.state_timeout()) {
                        if let Some(cache) = self.listing.get_mut(&game_type) {
                            cache.mark_requesting(rid);
                        }
                    }
                }
                if self.listing.get(&game_type).map(|c| c.is_refreshing()).unwrap_or(false) {
                    self.timers.arm(TimerKey::TypeListRefresh(game_type), self.config.list_timeout(), self.event_tx.clone());
                }
                let _ = reply.send(());
            }
            AdminCommand::SetDebugLogging { enabled, reply } => {
                if let Some(hook) = &self.debug_logging_hook {
                    hook(enabled);
                }
                let _ = reply.send(());
            }
            AdminCommand::Shutdown { reply } => self.begin_shutdown(reply),
        }
    }

    fn begin_shutdown(&mut self, reply: tokio::sync::oneshot::Sender<()>) {
        if self.closing {
            let _ = reply.send(());
            return;
        }
        self.closing = true;
        tracing::info!("relay stopping");
        if self.config.warn_closing {
            for room in self.rooms.values() {
                room.notify_host(ControlPacket::HostToast(HostToast { message: MessageType::ServerClosing }));
            }
        }
        self.shutdown_reply = Some(reply);
        self.timers.arm(TimerKey::ShutdownGrace, self.config.close_wait(), self.event_tx.clone());
    }

    /// §4.5 shutdown sequence: close every room with `serverClosed`, drop
    /// every cache (flushing pending requesters rather than leaving them
    /// waiting), then release whoever is waiting on the shutdown to finish.
    fn finish_shutdown(&mut self) {
        let room_ids: Vec<RoomId> = self.rooms.keys().copied().collect();
        for room_id in room_ids {
            let Some(room) = self.rooms.get_mut(&room_id) else { continue };
            if let Some(members) = room.close(CloseReason::ServerClosed) {
                self.teardown_room(room_id, members);
            }
        }

        let game_types: Vec<GameType> = self.listing.keys().copied().collect();
        for gt in game_types {
            if let Some(mut cache) = self.listing.remove(&gt) {
                let recipients = cache.drain_with_empty_list();
                self.deliver_room_list(&RoomList::default(), recipients);
            }
        }

        for (_, requesters) in self.pending_info.drain() {
            for requester in requesters {
                self.send_notice(requester, ControlPacket::RoomInfoDenied);
            }
        }

        self.timers.cancel_all();
        if let Some(reply) = self.shutdown_reply.take() {
            let _ = reply.send(());
        }
        tracing::info!("relay shutdown sequence complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{GameType, RoomCreationRequest, RoomJoin};

    fn spawn_relay() -> (Relay, mpsc::Sender<RelayEvent>) {
        let (tx, _rx) = mpsc::channel(64);
        (Relay::new(RelayConfig::default(), tx.clone()), tx)
    }

    fn connect(relay: &mut Relay, id: u32, addr: &str) -> mpsc::Receiver<OutboundFrame> {
        let (outbound_tx, mut outbound_rx) = mpsc::channel(64);
        relay.handle_event(RelayEvent::Connected {
            id: ConnectionId::new(id),
            addr: addr.parse().unwrap(),
            outbound: outbound_tx,
        });
        // Drain the greeting `ServerInfo` sent on connect so call sites only
        // ever see the control packets their own scenario triggers.
        assert!(matches!(expect_control(&mut outbound_rx), ControlPacket::ServerInfo(_)));
        outbound_rx
    }

    fn expect_control(rx: &mut mpsc::Receiver<OutboundFrame>) -> ControlPacket {
        match rx.try_recv() {
            Ok(OutboundFrame { frame: Frame::Control(packet), .. }) => packet,
            other => panic!("expected a control packet, got {other:?}"),
        }
    }

    #[test]
    fn forwarding_round_trip_scenario() {
        let (mut relay, _tx) = spawn_relay();
        let mut host_rx = connect(&mut relay, 1, "10.0.0.1:1");
        let mut client_rx = connect(&mut relay, 2, "10.0.0.2:1");

        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(1),
            frame: Frame::Control(ControlPacket::RoomCreationRequest(RoomCreationRequest {
                version: protocol::constants::SERVER_MAJOR_VERSION,
                game_type: Some(GameType::new("T")),
            })),
            reliable: true,
        });
        let room_id = match expect_control(&mut host_rx) {
            ControlPacket::RoomLink(link) => link.room_id,
            other => panic!("unexpected {other:?}"),
        };

        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(2),
            frame: Frame::Control(ControlPacket::RoomJoin(RoomJoin {
                room_id,
                game_type: Some(GameType::new("T")),
                with_password: false,
                password: 0,
            })),
            reliable: true,
        });
        match expect_control(&mut host_rx) {
            ControlPacket::ConnectionJoin(join) => assert_eq!(join.con_id, ConnectionId::new(2)),
            other => panic!("unexpected {other:?}"),
        }

        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(2),
            frame: Frame::Raw(bytes::Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF])),
            reliable: true,
        });
        match expect_control(&mut host_rx) {
            ControlPacket::ConnectionPacketWrap(wrap) => {
                assert_eq!(wrap.con_id, ConnectionId::new(2));
                assert!(wrap.is_tcp);
                assert_eq!(&wrap.raw[..], &[0xDE, 0xAD, 0xBE, 0xEF]);
            }
            other => panic!("unexpected {other:?}"),
        }

        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(1),
            frame: Frame::Control(ControlPacket::ConnectionPacketWrap(protocol::ConnectionPacketWrap {
                con_id: ConnectionId::new(2),
                is_tcp: false,
                raw: bytes::Bytes::from_static(&[0xFE, 0xED]),
            })),
            reliable: true,
        });
        match client_rx.try_recv() {
            Ok(OutboundFrame { frame: Frame::Raw(raw), reliable: false }) => assert_eq!(&raw[..], &[0xFE, 0xED]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn early_packets_flush_in_order_on_join() {
        let (mut relay, _tx) = spawn_relay();
        let mut host_rx = connect(&mut relay, 1, "10.0.0.1:1");
        let _client_rx = connect(&mut relay, 2, "10.0.0.2:1");

        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(1),
            frame: Frame::Control(ControlPacket::RoomCreationRequest(RoomCreationRequest {
                version: protocol::constants::SERVER_MAJOR_VERSION,
                game_type: None,
            })),
            reliable: true,
        });
        let room_id = match expect_control(&mut host_rx) {
            ControlPacket::RoomLink(link) => link.room_id,
            other => panic!("unexpected {other:?}"),
        };

        for payload in [&b"A"[..], &b"B"[..], &b"C"[..]] {
            relay.handle_event(RelayEvent::Inbound {
                id: ConnectionId::new(2),
                frame: Frame::Raw(bytes::Bytes::copy_from_slice(payload)),
                reliable: true,
            });
        }

        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(2),
            frame: Frame::Control(ControlPacket::RoomJoin(RoomJoin {
                room_id,
                game_type: None,
                with_password: false,
                password: 0,
            })),
            reliable: true,
        });

        let _join_notice = expect_control(&mut host_rx);
        for expected in [&b"A"[..], &b"B"[..], &b"C"[..]] {
            match expect_control(&mut host_rx) {
                ControlPacket::ConnectionPacketWrap(wrap) => assert_eq!(&wrap.raw[..], expected),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn host_disconnect_cascades_to_clients() {
        let (mut relay, _tx) = spawn_relay();
        let mut host_rx = connect(&mut relay, 1, "10.0.0.1:1");
        let mut client_rx = connect(&mut relay, 2, "10.0.0.2:1");

        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(1),
            frame: Frame::Control(ControlPacket::RoomCreationRequest(RoomCreationRequest { version: 1, game_type: None })),
            reliable: true,
        });
        let room_id = match expect_control(&mut host_rx) {
            ControlPacket::RoomLink(link) => link.room_id,
            other => panic!("unexpected {other:?}"),
        };
        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(2),
            frame: Frame::Control(ControlPacket::RoomJoin(RoomJoin { room_id, game_type: None, with_password: false, password: 0 })),
            reliable: true,
        });
        let _join_notice = expect_control(&mut host_rx);

        relay.handle_event(RelayEvent::Disconnected { id: ConnectionId::new(1) });

        assert!(matches!(expect_control(&mut client_rx), ControlPacket::RoomClosed(closed) if closed.reason == CloseReason::Closed));
        assert!(!relay.rooms.contains_key(&room_id));
        assert!(!relay.con_to_room.contains_key(&ConnectionId::new(2)));
    }

    #[test]
    fn password_gate_scenario() {
        let (mut relay, _tx) = spawn_relay();
        let mut host_rx = connect(&mut relay, 1, "10.0.0.1:1");
        let mut client_rx = connect(&mut relay, 2, "10.0.0.2:1");

        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(1),
            frame: Frame::Control(ControlPacket::RoomCreationRequest(RoomCreationRequest { version: 1, game_type: None })),
            reliable: true,
        });
        let room_id = match expect_control(&mut host_rx) {
            ControlPacket::RoomLink(link) => link.room_id,
            other => panic!("unexpected {other:?}"),
        };
        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(1),
            frame: Frame::Control(ControlPacket::RoomConfig(protocol::RoomConfig {
                is_public: true,
                is_protected: true,
                password: 0x1234,
                can_request_state: false,
            })),
            reliable: true,
        });

        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(2),
            frame: Frame::Control(ControlPacket::RoomJoinRequest(protocol::RoomJoinRequest {
                room_id,
                game_type: None,
                with_password: false,
                password: 0,
            })),
            reliable: true,
        });
        assert!(matches!(
            expect_control(&mut client_rx),
            ControlPacket::RoomJoinDenied(denied) if denied.reason == RejectReason::PasswordRequired
        ));

        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(2),
            frame: Frame::Control(ControlPacket::RoomJoinRequest(protocol::RoomJoinRequest {
                room_id,
                game_type: None,
                with_password: true,
                password: 0x0000,
            })),
            reliable: true,
        });
        assert!(matches!(
            expect_control(&mut client_rx),
            ControlPacket::RoomJoinDenied(denied) if denied.reason == RejectReason::InvalidPassword
        ));

        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(2),
            frame: Frame::Control(ControlPacket::RoomJoinRequest(protocol::RoomJoinRequest {
                room_id,
                game_type: None,
                with_password: true,
                password: 0x1234,
            })),
            reliable: true,
        });
        assert!(matches!(
            expect_control(&mut client_rx),
            ControlPacket::RoomJoinAccepted(accepted) if accepted.room_id == room_id
        ));
    }

    #[test]
    fn rate_limited_info_request_is_denied() {
        let (mut relay, _tx) = spawn_relay();
        let mut client_rx = connect(&mut relay, 1, "10.0.0.9:1");
        for _ in 0..relay.config.info_limit {
            relay.handle_event(RelayEvent::Inbound {
                id: ConnectionId::new(1),
                frame: Frame::Control(ControlPacket::RoomInfoRequest(protocol::RoomInfoRequest { room_id: RoomId::new(7).unwrap() })),
                reliable: true,
            });
            assert!(matches!(expect_control(&mut client_rx), ControlPacket::RoomInfoDenied));
        }
        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(1),
            frame: Frame::Control(ControlPacket::RoomInfoRequest(protocol::RoomInfoRequest { room_id: RoomId::new(7).unwrap() })),
            reliable: true,
        });
        assert!(matches!(expect_control(&mut client_rx), ControlPacket::RoomInfoDenied));
    }

    #[test]
    fn list_request_coalesces_concurrent_requesters() {
        let (mut relay, _tx) = spawn_relay();
        let game_type = GameType::new("T");

        let mut host_rxs = Vec::new();
        let mut room_ids = Vec::new();
        for host_id in 1..=5u32 {
            let mut host_rx = connect(&mut relay, host_id, &format!("10.0.1.{host_id}:1"));
            relay.handle_event(RelayEvent::Inbound {
                id: ConnectionId::new(host_id),
                frame: Frame::Control(ControlPacket::RoomCreationRequest(RoomCreationRequest {
                    version: protocol::constants::SERVER_MAJOR_VERSION,
                    game_type: Some(game_type),
                })),
                reliable: true,
            });
            let room_id = match expect_control(&mut host_rx) {
                ControlPacket::RoomLink(link) => link.room_id,
                other => panic!("unexpected {other:?}"),
            };
            relay.handle_event(RelayEvent::Inbound {
                id: ConnectionId::new(host_id),
                frame: Frame::Control(ControlPacket::RoomConfig(protocol::RoomConfig {
                    is_public: true,
                    is_protected: false,
                    password: 0,
                    can_request_state: true,
                })),
                reliable: true,
            });
            room_ids.push(room_id);
            host_rxs.push(host_rx);
        }

        // Every room is still missing its first state, so all five are
        // outdated and a refresh pass must start.
        let mut client_a_rx = connect(&mut relay, 100, "10.0.2.1:1");
        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(100),
            frame: Frame::Control(ControlPacket::RoomListRequest(protocol::RoomListRequest { game_type })),
            reliable: true,
        });
        for host_rx in &mut host_rxs {
            assert!(matches!(expect_control(host_rx), ControlPacket::RoomStateRequest));
        }

        // A second requester arriving while the refresh is in flight must
        // not kick off a second round of `RoomStateRequest`s.
        let mut client_b_rx = connect(&mut relay, 101, "10.0.2.2:1");
        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(101),
            frame: Frame::Control(ControlPacket::RoomListRequest(protocol::RoomListRequest { game_type })),
            reliable: true,
        });
        for host_rx in &mut host_rxs {
            assert!(host_rx.try_recv().is_err());
        }
        assert!(client_a_rx.try_recv().is_err());
        assert!(client_b_rx.try_recv().is_err());

        // Hosts answer one by one; only the last reply flushes the list, and
        // both requesters get the exact same snapshot.
        for (idx, host_id) in (1..=5u32).enumerate() {
            relay.handle_event(RelayEvent::Inbound {
                id: ConnectionId::new(host_id),
                frame: Frame::Control(ControlPacket::RoomState(protocol::RoomState {
                    state: bytes::Bytes::copy_from_slice(format!("state-{host_id}").as_bytes()),
                })),
                reliable: true,
            });
            if idx + 1 < 5 {
                assert!(client_a_rx.try_recv().is_err());
                assert!(client_b_rx.try_recv().is_err());
            }
        }

        let list_a = match expect_control(&mut client_a_rx) {
            ControlPacket::RoomList(list) => list,
            other => panic!("unexpected {other:?}"),
        };
        let list_b = match expect_control(&mut client_b_rx) {
            ControlPacket::RoomList(list) => list,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(list_a.states.len(), 5);
        for room_id in &room_ids {
            assert!(list_a.states.iter().any(|(id, _)| id == room_id));
            assert!(list_b.states.iter().any(|(id, _)| id == room_id));
        }
        assert_eq!(list_a.states, list_b.states);
    }

    #[test]
    fn close_room_restores_pre_create_bookkeeping() {
        let (mut relay, _tx) = spawn_relay();
        let before_rooms = relay.rooms.len();
        let before_con_to_room = relay.con_to_room.len();
        let before_types_t = relay.types.get(&GameType::new("T")).map(|ids| ids.len()).unwrap_or(0);

        let mut host_rx = connect(&mut relay, 1, "10.0.0.1:1");
        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(1),
            frame: Frame::Control(ControlPacket::RoomCreationRequest(RoomCreationRequest {
                version: protocol::constants::SERVER_MAJOR_VERSION,
                game_type: Some(GameType::new("T")),
            })),
            reliable: true,
        });
        let room_id = match expect_control(&mut host_rx) {
            ControlPacket::RoomLink(link) => link.room_id,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(relay.rooms.len(), before_rooms + 1);
        assert_eq!(relay.con_to_room.len(), before_con_to_room + 1);

        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(1),
            frame: Frame::Control(ControlPacket::RoomClosureRequest),
            reliable: true,
        });

        assert_eq!(relay.rooms.len(), before_rooms);
        assert_eq!(relay.con_to_room.len(), before_con_to_room);
        assert_eq!(
            relay.types.get(&GameType::new("T")).map(|ids| ids.len()).unwrap_or(0),
            before_types_t
        );
        assert!(!relay.rooms.contains_key(&room_id));
    }

    #[test]
    fn repeating_the_same_configuration_does_not_duplicate_the_listing_entry() {
        let (mut relay, _tx) = spawn_relay();
        let game_type = GameType::new("T");
        let mut host_rx = connect(&mut relay, 1, "10.0.0.1:1");
        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(1),
            frame: Frame::Control(ControlPacket::RoomCreationRequest(RoomCreationRequest {
                version: protocol::constants::SERVER_MAJOR_VERSION,
                game_type: Some(game_type),
            })),
            reliable: true,
        });
        let room_id = match expect_control(&mut host_rx) {
            ControlPacket::RoomLink(link) => link.room_id,
            other => panic!("unexpected {other:?}"),
        };

        // Any `RoomListRequest`, even an empty one, is what materializes the
        // per-type cache that `setConfiguration` touches.
        let mut client_rx = connect(&mut relay, 2, "10.0.0.2:1");
        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(2),
            frame: Frame::Control(ControlPacket::RoomListRequest(protocol::RoomListRequest { game_type })),
            reliable: true,
        });
        assert!(matches!(expect_control(&mut host_rx), ControlPacket::RoomStateRequest));
        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(1),
            frame: Frame::Control(ControlPacket::RoomState(protocol::RoomState { state: bytes::Bytes::new() })),
            reliable: true,
        });
        let _initial_list = expect_control(&mut client_rx);

        let cfg = protocol::RoomConfig { is_public: true, is_protected: true, password: 0, can_request_state: true };
        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(1),
            frame: Frame::Control(ControlPacket::RoomConfig(cfg.clone())),
            reliable: true,
        });
        let first = relay.listing.get(&game_type).map(|c| c.current()).unwrap();

        relay.handle_event(RelayEvent::Inbound {
            id: ConnectionId::new(1),
            frame: Frame::Control(ControlPacket::RoomConfig(cfg)),
            reliable: true,
        });
        let second = relay.listing.get(&game_type).map(|c| c.current()).unwrap();

        assert_eq!(first.protected_rooms, vec![room_id]);
        assert_eq!(second.protected_rooms, vec![room_id]);
        assert_eq!(
            first.states.iter().filter(|(id, _)| *id == room_id).count(),
            1
        );
        assert_eq!(
            second.states.iter().filter(|(id, _)| *id == room_id).count(),
            1
        );
    }
}
