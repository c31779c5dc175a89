//! Time synchronization client (§4.4 step 2: "runs time sync over an
//! OHDP port; session open is deferred until time sync converges").
//! SPEC_FULL leaves the actual clock-sync algorithm out of scope —
//! this crate only needs the interface a `SessionManager` blocks
//! `openConnectionStartSession` on.

use async_trait::async_trait;
use sirikata_types::ServerId;
use std::net::SocketAddr;
use std::time::Duration;

/// The offset a clock sync round converged on, added to local time to
/// approximate the remote server's clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockOffset(pub Duration);

#[async_trait]
pub trait TimeSyncClient: Send + Sync {
    /// Run one round of time sync against `server` at `addr`, and
    /// return the converged offset. A session is not opened until this
    /// completes (§4.4 step 2).
    async fn sync(&self, server: ServerId, addr: SocketAddr) -> ClockOffset;
}

/// A client that reports zero offset immediately — appropriate when
/// local and space-server clocks are already synchronized (e.g. NTP),
/// or for tests that don't exercise clock skew.
#[derive(Default)]
pub struct NoOpTimeSyncClient;

#[async_trait]
impl TimeSyncClient for NoOpTimeSyncClient {
    async fn sync(&self, _server: ServerId, _addr: SocketAddr) -> ClockOffset {
        ClockOffset(Duration::ZERO)
    }
}
