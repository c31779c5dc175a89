//! Proximity Engine (§4.3): four query handlers — `{server,object} x
//! {static,dynamic}` — each producing an incremental stream of
//! `Addition`/`Removal` events over a live [`sirikata_loc`] cache.

pub mod engine;
pub mod error;
pub mod handler;
pub mod strand;
pub mod types;
pub mod wire;

pub use engine::{ProximityEngine, QueryMigrationData};
pub use error::{Error, Result};
pub use handler::{BruteForceHandler, QueryHandler};
pub use strand::{ProxCommand, ProxHandle, DEFAULT_REBUILD_INTERVAL, DEFAULT_TICK_INTERVAL};
pub use types::{classify, ObjectClass, ProximityEvent, Query, SolidAngle, Transience, NO_UPDATE_MAX_RESULTS};
pub use wire::{AngleUpdate, MaxResultsUpdate, QueryParamsMessage};
