//! A single reliable-stream connection to one peer, with logical
//! substreams multiplexed inside it (§2, §6 glossary: "Substream").
//!
//! `qp2p` already gives us an ordered, reliable, congestion-controlled
//! channel per connection; a substream here is a tag carried inside
//! each envelope so several independent logical channels (e.g. one per
//! object, for the object<->space fabric in §4.4) can share one
//! physical connection without the session layer juggling raw QUIC
//! streams itself.

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// A substream identifier, scoped to one [`Connection`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct SubstreamId(pub u32);

/// Whether a send must preserve ordering relative to other sends on
/// the same substream. Unordered sends may be delivered out of order
/// but are still reliable (never silently dropped) — matching §2's
/// "ordered/unordered reliable datagrams" requirement.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Ordering {
    Ordered,
    Unordered,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct Envelope {
    pub substream: SubstreamId,
    pub ordering: Ordering,
    #[serde(with = "serde_bytes_vec")]
    pub payload: Vec<u8>,
}

mod serde_bytes_vec {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(v)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        <Vec<u8>>::deserialize(d)
    }
}

/// A live connection to one remote endpoint. Wraps a `qp2p::Connection`
/// plus the incoming-message stream qp2p hands back on connect/accept.
pub struct Connection {
    pub(crate) remote: SocketAddr,
    pub(crate) inner: qp2p::Connection,
}

impl Connection {
    pub(crate) fn new(remote: SocketAddr, inner: qp2p::Connection) -> Self {
        Self { remote, inner }
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.remote
    }

    /// Send `payload` on `substream`, waiting for delivery
    /// confirmation at the transport layer. Ordered sends observe
    /// per-substream FIFO order (§5's "session messages observe
    /// send-order per destination").
    pub async fn send(
        &self,
        substream: SubstreamId,
        ordering: Ordering,
        payload: Vec<u8>,
    ) -> Result<()> {
        let envelope = Envelope { substream, ordering, payload };
        let bytes = bincode::serialize(&envelope)?;
        // Priority 0: session/object traffic has no priority tiers in
        // this core; retry policy is inherited from the endpoint's
        // `qp2p::Config`, matching the teacher's `send_with` default.
        self.inner
            .send_with(Bytes::from(bytes), 0, None)
            .await
            .map_err(|e| Error::Send(self.remote, e))
    }

    pub fn close(&self) {
        self.inner.close(None);
    }
}

/// Decode one incoming message off a connection's `qp2p::ConnectionIncoming`.
pub(crate) fn decode_envelope(bytes: Bytes) -> Result<Envelope> {
    Ok(bincode::deserialize(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_roundtrip() {
        let env = Envelope {
            substream: SubstreamId(7),
            ordering: Ordering::Unordered,
            payload: vec![1, 2, 3, 4],
        };
        let bytes = bincode::serialize(&env).unwrap();
        let back: Envelope = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.substream, env.substream);
        assert_eq!(back.ordering, env.ordering);
        assert_eq!(back.payload, env.payload);
    }
}
