//! Opaque identifiers used throughout the space/proximity core.

use std::fmt;
use uuid::Uuid;

/// A space server identifier. `0` is a reserved sentinel meaning
/// "no server" or "any server" depending on context — see
/// [`ServerId::ANY`]. Assigned servers always hold a nonzero value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ServerId(u32);

impl ServerId {
    /// Sentinel used on the wire and in `send(destServer=0)` to mean
    /// "unknown" or "pick one at random".
    pub const ANY: ServerId = ServerId(0);

    /// Construct a `ServerId` from a raw wire value. Does not validate
    /// nonzero-ness: `0` round-trips to [`ServerId::ANY`].
    pub const fn from_raw(v: u32) -> Self {
        ServerId(v)
    }

    /// Construct an assigned (nonzero) server id. Returns `None` for `0`.
    pub fn assigned(v: u32) -> Option<Self> {
        if v == 0 {
            None
        } else {
            Some(ServerId(v))
        }
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_any(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            write!(f, "ServerId(ANY)")
        } else {
            write!(f, "ServerId({})", self.0)
        }
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            write!(f, "<any>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Identifier of a CSEG node (a process hosting a shard of lower trees).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct CsegNodeId(pub u32);

impl fmt::Display for CsegNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cseg-{}", self.0)
    }
}

/// A space (virtual world instance) identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct SpaceId(pub Uuid);

impl fmt::Debug for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpaceId({})", self.0)
    }
}

/// A 128-bit opaque object identifier, unique within a [`SpaceId`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ObjectReference(pub Uuid);

impl ObjectReference {
    pub fn random() -> Self {
        ObjectReference(Uuid::new_v4())
    }
}

impl fmt::Debug for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectReference({})", self.0)
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An object scoped to the space it lives in — the unit of identity
/// used by queries, sessions, and the location cache.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct SpaceObjectReference {
    pub space: SpaceId,
    pub object: ObjectReference,
}

impl SpaceObjectReference {
    pub fn new(space: SpaceId, object: ObjectReference) -> Self {
        Self { space, object }
    }
}

impl fmt::Display for SpaceObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.space.0, self.object.0)
    }
}

/// A host/port pair, e.g. for a space server's CSEG listener or a
/// session endpoint.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct Address4 {
    pub host: String,
    pub port: u16,
}

impl Address4 {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl fmt::Display for Address4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Which identifier class a query/subscription belongs to — an object
/// querying the world, or a space server querying its peers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub enum QuerierId {
    Object(SpaceObjectReference),
    Server(ServerId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_id_any_is_zero() {
        assert!(ServerId::ANY.is_any());
        assert_eq!(ServerId::from_raw(0), ServerId::ANY);
        assert!(ServerId::assigned(0).is_none());
        assert_eq!(ServerId::assigned(7).unwrap().raw(), 7);
    }

    #[test]
    fn space_object_reference_roundtrip() {
        let s = SpaceId(Uuid::new_v4());
        let o = ObjectReference::random();
        let sor = SpaceObjectReference::new(s, o);
        let encoded = bincode::serialize(&sor).unwrap();
        let decoded: SpaceObjectReference = bincode::deserialize(&encoded).unwrap();
        assert_eq!(sor, decoded);
    }
}
