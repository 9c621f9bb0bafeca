//! Per-type room listing cache (§4.4): a prebuilt `RoomList` body plus
//! coalesced-refresh bookkeeping. The cache never walks the room table or
//! talks to a connection's sender itself — it only tracks *which* connection
//! ids are owed a reply and hands them back to the relay to deliver, so it
//! stays ignorant of the room/connection tables and transport channels
//! sitting beside it.

use protocol::{RawState, RoomId, RoomList};
use std::collections::HashSet;
use std::time::Instant;

fn upsert_state(states: &mut Vec<(RoomId, RawState)>, room: RoomId, state: RawState) {
    match states.iter_mut().find(|(id, _)| *id == room) {
        Some(entry) => entry.1 = state,
        None => states.push((room, state)),
    }
}

/// What a fresh `RoomListRequest` should do next.
pub enum JoinOutcome {
    /// No refresh currently in flight for this type — the caller must walk
    /// the type's rooms, call `Room::request_state` on each outdated one,
    /// report every id that actually started one via [`ListingCache::mark_requesting`],
    /// then call [`ListingCache::settle`].
    RefreshNeeded,
    /// A refresh is already underway; the requester was queued and will be
    /// served once it completes (or its watchdog fires).
    AlreadyRefreshing,
}

#[derive(Default)]
pub struct ListingCache {
    body: RoomList,
    requesting: HashSet<RoomId>,
    pending: Vec<protocol::ConnectionId>,
    last_update: Option<Instant>,
}

impl ListingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_refreshing(&self) -> bool {
        !self.requesting.is_empty()
    }

    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    /// §4.4: queue `requester` for the next flush, report whether a refresh
    /// pass needs to be started.
    pub fn join(&mut self, requester: protocol::ConnectionId) -> JoinOutcome {
        let outcome = if self.is_refreshing() {
            JoinOutcome::AlreadyRefreshing
        } else {
            JoinOutcome::RefreshNeeded
        };
        self.pending.push(requester);
        outcome
    }

    pub fn mark_requesting(&mut self, room: RoomId) {
        self.requesting.insert(room);
    }

    /// Call once after driving every outdated room's `request_state`. If none
    /// of them actually started a request, flushes right away with
    /// `snapshot` (a fresh, fully up-to-date list) and returns the ids to
    /// deliver it to; otherwise leaves the refresh in flight (the caller
    /// should arm a watchdog) and returns `None`.
    pub fn settle(&mut self, snapshot: RoomList) -> Option<Vec<protocol::ConnectionId>> {
        if self.requesting.is_empty() {
            Some(self.flush(snapshot))
        } else {
            None
        }
    }

    /// §4.4 `setState` mutation hook. `snapshot` is only evaluated (and thus
    /// only needs to be built) when this was the last outstanding room.
    pub fn on_state_received(&mut self, room: RoomId, snapshot: impl FnOnce() -> RoomList) -> Option<Vec<protocol::ConnectionId>> {
        self.requesting.remove(&room);
        if self.requesting.is_empty() && !self.pending.is_empty() {
            Some(self.flush(snapshot()))
        } else {
            None
        }
    }

    /// §4.4 `setConfiguration` mutation hook.
    pub fn on_configuration_changed(&mut self, room: RoomId, still_listed: bool, is_protected: bool, state: Option<RawState>) {
        if !still_listed {
            self.body.states.retain(|(id, _)| *id != room);
            self.body.protected_rooms.retain(|id| *id != room);
            return;
        }
        if let Some(state) = state {
            upsert_state(&mut self.body.states, room, state);
        }
        if is_protected {
            if !self.body.protected_rooms.contains(&room) {
                self.body.protected_rooms.push(room);
            }
        } else {
            self.body.protected_rooms.retain(|id| *id != room);
        }
    }

    /// The per-type `listTimeout` watchdog firing: flush whatever is current
    /// regardless of rooms still owing a reply.
    pub fn watchdog_fire(&mut self, snapshot: RoomList) -> Vec<protocol::ConnectionId> {
        self.requesting.clear();
        self.flush(snapshot)
    }

    fn flush(&mut self, snapshot: RoomList) -> Vec<protocol::ConnectionId> {
        self.body = snapshot;
        self.last_update = Some(Instant::now());
        self.pending.drain(..).collect()
    }

    pub fn current(&self) -> RoomList {
        self.body.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.body.states.is_empty()
            && self.body.protected_rooms.is_empty()
            && self.pending.is_empty()
            && self.requesting.is_empty()
    }

    /// Shutdown/teardown: every still-pending requester is owed the empty
    /// list rather than being left hanging (§4.5 shutdown sequence, §9
    /// cancellation).
    pub fn drain_with_empty_list(&mut self) -> Vec<protocol::ConnectionId> {
        self.requesting.clear();
        self.pending.drain(..).collect()
    }
}
