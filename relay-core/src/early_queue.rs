//! Bounded FIFO of opaque payloads received before a connection has joined
//! a room (§3, §4.5 "queue flushing").

use bytes::Bytes;
use std::collections::VecDeque;

/// One queued payload plus the reliability it arrived with, so it can be
/// replayed to the host with the same `isTCP` flag once the room is known.
#[derive(Clone, Debug)]
pub struct EarlyPacket {
    pub raw: Bytes,
    pub reliable: bool,
}

pub struct EarlyPacketQueue {
    capacity: usize,
    items: VecDeque<EarlyPacket>,
}

impl EarlyPacketQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Enqueues one payload. Returns `false` (and drops the *new* payload,
    /// preserving arrival order of what's already queued) if the queue was
    /// already at capacity — the peer is expected to retransmit.
    pub fn push(&mut self, raw: Bytes, reliable: bool) -> bool {
        if self.items.len() >= self.capacity {
            return false;
        }
        self.items.push_back(EarlyPacket { raw, reliable });
        true
    }

    /// Drains every queued payload in FIFO order.
    pub fn drain(&mut self) -> Vec<EarlyPacket> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_arrival_order_and_drops_overflow_silently() {
        let mut queue = EarlyPacketQueue::new(3);
        assert!(queue.push(Bytes::from_static(b"A"), true));
        assert!(queue.push(Bytes::from_static(b"B"), true));
        assert!(queue.push(Bytes::from_static(b"C"), true));
        assert!(!queue.push(Bytes::from_static(b"D"), true));

        let drained = queue.drain();
        let raws: Vec<_> = drained.iter().map(|p| p.raw.clone()).collect();
        assert_eq!(
            raws,
            vec![
                Bytes::from_static(b"A"),
                Bytes::from_static(b"B"),
                Bytes::from_static(b"C"),
            ]
        );
        assert!(queue.is_empty());
    }
}
