//! The "read status" half of the operator surface (§6): counts and
//! per-room traffic counters a collaborator CLI or HTTP admin route can
//! render without reaching into `Relay` internals.

use protocol::RoomId;

#[derive(Clone, Debug, Default)]
pub struct RoomStatus {
    pub short_id: String,
    pub game_type: Option<String>,
    pub client_count: usize,
    pub is_public: bool,
    pub is_protected: bool,
    pub packets_forwarded: u64,
}

#[derive(Clone, Debug, Default)]
pub struct RelayStatus {
    pub connection_count: usize,
    pub room_count: usize,
    pub closing: bool,
    pub rooms: Vec<RoomStatus>,
}

impl RelayStatus {
    pub fn room(&self, id: RoomId) -> Option<&RoomStatus> {
        self.rooms.iter().find(|r| r.short_id == id.to_short())
    }
}
