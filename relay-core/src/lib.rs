//! Transport-agnostic relay logic: the room/listing state machine, the
//! single-actor dispatcher that owns it, and everything that feeds or is fed
//! by that actor. Nothing here knows how a byte reaches the wire — that's
//! `relay-server`'s job, talking to this crate only through [`events::RelayEvent`],
//! [`events::OutboundFrame`] and [`config::RelayConfig`].

pub mod assembler;
pub mod compress;
pub mod config;
pub mod connection;
pub mod early_queue;
pub mod error;
pub mod events;
pub mod hash;
pub mod listing;
pub mod rate;
pub mod relay;
pub mod room;
pub mod status;
pub mod timers;

pub use config::RelayConfig;
pub use connection::Connection;
pub use events::{AdminCommand, OutboundFrame, RelayEvent};
pub use relay::Relay;
pub use status::{RelayStatus, RoomStatus};
