//! Numeric limits and policy the core consumes (§6). The *source* of these
//! values (a config file format, a CLI flag set, …) is a collaborator
//! concern; `relay-server` happens to load them from JSON the same way the
//! teacher's `lobby::reload_config` loads `GameConfig.json`, but nothing in
//! `relay-core` depends on that.

use protocol::GameType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Packets/3s per connection before it gets kicked. 0 disables the check.
    pub spam_limit: u32,
    /// Joins/minute per source address.
    pub join_limit: u32,
    /// Info requests/3s per source address.
    pub info_limit: u32,
    /// List requests/3s per source address.
    pub list_limit: u32,
    pub state_timeout_ms: u64,
    pub state_lifetime_ms: u64,
    pub list_timeout_ms: u64,
    pub list_lifetime_ms: u64,
    pub close_wait_secs: u64,
    pub warn_closing: bool,
    pub accept_no_type: bool,
    pub blacklisted_types: HashSet<String>,
    pub blacklist: HashSet<IpAddr>,
    pub warn_deprecated: bool,
    /// Open-question resolution (§9.1): caps the number of connections that
    /// may sit unattached (with a live early-packet queue) at once.
    pub max_unattached_connections: usize,
    /// How long the network loop waits for *any* inbound frame on a
    /// connection before raising [`crate::events::RelayEvent::Idle`] (§4.3
    /// idle propagation). Transport-level, not enforced by `Relay` itself.
    pub idle_timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            spam_limit: 200,
            join_limit: 30,
            info_limit: 10,
            list_limit: 10,
            state_timeout_ms: 5_000,
            state_lifetime_ms: 10_000,
            list_timeout_ms: 2_000,
            list_lifetime_ms: 10_000,
            close_wait_secs: 5,
            warn_closing: true,
            accept_no_type: true,
            blacklisted_types: HashSet::new(),
            blacklist: HashSet::new(),
            warn_deprecated: true,
            max_unattached_connections: 4096,
            idle_timeout_ms: 30_000,
        }
    }
}

impl RelayConfig {
    pub fn state_timeout(&self) -> Duration {
        Duration::from_millis(self.state_timeout_ms)
    }
    pub fn state_lifetime(&self) -> Duration {
        Duration::from_millis(self.state_lifetime_ms)
    }
    pub fn list_timeout(&self) -> Duration {
        Duration::from_millis(self.list_timeout_ms)
    }
    pub fn list_lifetime(&self) -> Duration {
        Duration::from_millis(self.list_lifetime_ms)
    }
    pub fn close_wait(&self) -> Duration {
        Duration::from_secs(self.close_wait_secs)
    }
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn is_type_blacklisted(&self, game_type: &GameType) -> bool {
        self.blacklisted_types.contains(game_type.as_str())
    }

    pub fn is_address_blacklisted(&self, addr: &IpAddr) -> bool {
        self.blacklist.contains(addr)
    }
}
