//! `ServerIDMap` (§4.4 step 2): resolves a `ServerId` to the address
//! its `cseg-net`/session listener is reachable at. SPEC_FULL adds
//! this as the missing piece `getAnySpaceConnection` needs to turn a
//! server id into something `sirikata_stream::Endpoint::connect` can
//! dial — the distilled spec leaves it implicit. The real HTTP
//! directory service named in §6 is an out-of-scope collaborator that
//! would provide another implementation of this same trait.

use sirikata_types::{Address4, ServerId};
use std::collections::HashMap;

pub trait ServerIDMap: Send + Sync {
    fn resolve(&self, server: ServerId) -> Option<Address4>;
    /// A server id to try for a fresh session — used by
    /// `getAnySpaceConnection` (§4.4 step 2).
    fn any_server(&self) -> Option<ServerId>;
}

/// A fixed id->address table, the natural fit for a small test
/// deployment or a space process configured with a static server
/// list rather than a directory service.
pub struct StaticServerIDMap {
    addrs: HashMap<ServerId, Address4>,
}

impl StaticServerIDMap {
    pub fn new(entries: impl IntoIterator<Item = (ServerId, Address4)>) -> Self {
        Self { addrs: entries.into_iter().collect() }
    }
}

impl ServerIDMap for StaticServerIDMap {
    fn resolve(&self, server: ServerId) -> Option<Address4> {
        self.addrs.get(&server).cloned()
    }

    fn any_server(&self) -> Option<ServerId> {
        use rand::seq::IteratorRandom;
        self.addrs.keys().copied().choose(&mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_returns_registered_address() {
        let server = ServerId::assigned(4).unwrap();
        let map = StaticServerIDMap::new([(server, Address4::new("127.0.0.1", 9000))]);
        assert_eq!(map.resolve(server), Some(Address4::new("127.0.0.1", 9000)));
        assert_eq!(map.any_server(), Some(server));
    }

    #[test]
    fn empty_map_has_no_known_server() {
        let map = StaticServerIDMap::new([]);
        assert_eq!(map.any_server(), None);
    }
}
