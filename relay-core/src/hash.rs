//! Address hashing for `ConnectionJoin.address_hash` (§9.1 open-question
//! resolution): a stable, non-reversible digest a host can use to tell
//! "is this the same remote peer as before" without the relay handing out
//! the raw `IpAddr`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::sync::OnceLock;

static PROCESS_SEED: OnceLock<u64> = OnceLock::new();

fn process_seed() -> u64 {
    *PROCESS_SEED.get_or_init(rand::random)
}

/// Keyed only over the address, never the port, so a peer hashes the same
/// across reconnects. NATed peers sharing one public IP collide on purpose —
/// the protocol never uses this hash for lookup, only for display.
pub fn address_hash(addr: IpAddr) -> u64 {
    let mut hasher = DefaultHasher::new();
    process_seed().hash(&mut hasher);
    addr.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_address_hashes_the_same_within_a_process() {
        let a: IpAddr = "203.0.113.7".parse().unwrap();
        assert_eq!(address_hash(a), address_hash(a));
    }

    #[test]
    fn port_does_not_factor_in() {
        // address_hash only ever takes an IpAddr, so there is nothing to
        // accidentally key on a port in the first place.
        let a: IpAddr = "203.0.113.7".parse().unwrap();
        let b: IpAddr = "203.0.113.8".parse().unwrap();
        assert_ne!(address_hash(a), address_hash(b));
    }
}
