//! Deferred work and watchdogs (§5, §9 "deferred work and watchdogs"): every
//! suspension point is its own `tokio::spawn`ed sleep, keyed so cancellation
//! is O(1) and so closing a room or shutting down never leaves an orphaned
//! task racing the state it used to refer to.

use crate::events::RelayEvent;
use protocol::{ConnectionId, GameType, RoomId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TimerKey {
    /// Flushes `pending_info` for a room once `stateTimeout` elapses.
    PendingInfoFlush(RoomId),
    /// Flushes a listing-cache refresh for a type once `listTimeout` elapses.
    TypeListRefresh(GameType),
    /// The one-tick deferred close that lets a connection's last sends flush.
    DeferredClose(ConnectionId),
    /// The `closeWait` shutdown grace period.
    ShutdownGrace,
}

pub struct Timers {
    handles: HashMap<TimerKey, JoinHandle<()>>,
}

impl Timers {
    pub fn new() -> Self {
        Self {
            handles: HashMap::new(),
        }
    }

    /// Arms (re-arming replaces) a timer that fires `RelayEvent::Timer(key)`
    /// on `tx` after `after`.
    pub fn arm(&mut self, key: TimerKey, after: Duration, tx: mpsc::Sender<RelayEvent>) {
        self.cancel(&key);
        let fired_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(RelayEvent::Timer(fired_key)).await;
        });
        self.handles.insert(key, handle);
    }

    /// Cancels a timer if armed. Returns whether one was actually cancelled.
    pub fn cancel(&mut self, key: &TimerKey) -> bool {
        if let Some(handle) = self.handles.remove(key) {
            handle.abort();
            true
        } else {
            false
        }
    }

    pub fn is_armed(&self, key: &TimerKey) -> bool {
        self.handles.contains_key(key)
    }

    /// Cancels every timer keyed by the given room (closure cascade, §5).
    pub fn cancel_room(&mut self, room_id: RoomId) {
        self.cancel(&TimerKey::PendingInfoFlush(room_id));
    }

    /// Cancels every outstanding timer (shutdown, §5).
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}
