//! Location Service Cache (§4.2): the per-space-server record of
//! every object's last-known location, orientation, bounds, mesh, and
//! physics state, with change notification for the Proximity Engine
//! and Session Manager to subscribe to.

mod cache;
mod listener;

pub use cache::{InMemoryLocationServiceCache, LocationEntry, LocationServiceCache};
pub use listener::LocationUpdateListener;
