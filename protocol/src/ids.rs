//! Identifier types shared across the relay: room ids, connection ids and
//! the compact type tag that labels a game implementation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Alphabet used for the url-safe short form of [`RoomId`] and [`ConnectionId`].
/// Digits and letters minus visually ambiguous characters (0/O, 1/I/l).
const SHORT_ID_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

fn encode_short(mut value: u64) -> String {
    if value == 0 {
        return (SHORT_ID_ALPHABET[0] as char).to_string();
    }
    let base = SHORT_ID_ALPHABET.len() as u64;
    let mut chars = Vec::new();
    while value > 0 {
        let digit = (value % base) as usize;
        chars.push(SHORT_ID_ALPHABET[digit]);
        value /= base;
    }
    chars.reverse();
    String::from_utf8(chars).expect("alphabet is ASCII")
}

fn decode_short(text: &str) -> Option<u64> {
    let base = SHORT_ID_ALPHABET.len() as u64;
    let mut value: u64 = 0;
    for c in text.bytes() {
        let digit = SHORT_ID_ALPHABET.iter().position(|&b| b == c)? as u64;
        value = value.checked_mul(base)?.checked_add(digit)?;
    }
    Some(value)
}

/// A room's 64-bit id. Never zero — zero is reserved for "uncreated".
#[derive(Copy, Clone, Serialize, Deserialize)]
pub struct RoomId(u64);

impl RoomId {
    /// Builds a `RoomId`, returning `None` for the reserved zero value.
    pub fn new(value: u64) -> Option<Self> {
        if value == 0 { None } else { Some(Self(value)) }
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// The url-safe short form presented in shareable links.
    pub fn to_short(self) -> String {
        encode_short(self.0)
    }

    /// Parses a short form back into a `RoomId`. Rejects the value that would
    /// decode to the reserved zero id.
    pub fn from_short(text: &str) -> Option<Self> {
        Self::new(decode_short(text)?)
    }
}

// Hashing/equality are over the 64-bit id only, matching the room's identity
// contract (host membership doesn't factor in).
impl PartialEq for RoomId {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for RoomId {}
impl std::hash::Hash for RoomId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
impl fmt::Debug for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoomId({}, \"{}\")", self.0, self.to_short())
    }
}
impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_short())
    }
}

/// A connection's process-lifetime-unique id.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(u32);

impl ConnectionId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn to_short(self) -> String {
        encode_short(self.0 as u64)
    }
}
impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}
impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compact, fixed-width label identifying the game implementation carried in
/// a room. At most 8 ASCII-ish bytes. `None` marks an ungated-but-invisible
/// room (invariant (vi) in the data model: never listed).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameType([u8; 8]);

impl GameType {
    /// Builds a `GameType` from a label, truncating (never panicking) at 8 bytes.
    pub fn new(label: &str) -> Self {
        let mut bytes = [0u8; 8];
        let src = label.as_bytes();
        let len = src.len().min(8);
        bytes[..len].copy_from_slice(&src[..len]);
        Self(bytes)
    }

    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(8);
        std::str::from_utf8(&self.0[..len]).unwrap_or("")
    }
}
impl fmt::Debug for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GameType({:?})", self.as_str())
    }
}
impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_rejects_zero() {
        assert!(RoomId::new(0).is_none());
        assert!(RoomId::new(7).is_some());
    }

    #[test]
    fn short_form_round_trips() {
        for raw in [1u64, 7, 42, 9_999_999, u64::MAX] {
            let id = RoomId::new(raw).unwrap();
            let short = id.to_short();
            let parsed = RoomId::from_short(&short).unwrap();
            assert_eq!(parsed.get(), raw);
        }
    }

    #[test]
    fn game_type_truncates_and_round_trips_text() {
        let t = GameType::new("ternio-xl-extended");
        assert_eq!(t.as_str(), "ternio-x");
        let short = GameType::new("go");
        assert_eq!(short.as_str(), "go");
    }
}
