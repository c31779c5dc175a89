//! A live connection to one space server (§4.4), plus the frame format
//! shared by the session-management and object-message traffic carried
//! over it.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sirikata_messaging::{ObjectMessage, SessionMsg};
use sirikata_stream::{Connection, Ordering, SubstreamId};
use sirikata_types::ServerId;

/// Session-management and object traffic share one substream per
/// connection; the tagged [`Frame`] enum is what distinguishes them,
/// not the substream id.
pub const SESSION_SUBSTREAM: SubstreamId = SubstreamId(0);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Frame {
    Session(SessionMsg),
    Object(ObjectMessage),
}

impl Frame {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

/// One object<->server session's transport: a single reliable-stream
/// [`Connection`] to `server`, shared by every object whose active
/// session currently points at it.
pub struct SpaceNodeConnection {
    server: ServerId,
    connection: Connection,
}

impl SpaceNodeConnection {
    pub fn new(server: ServerId, connection: Connection) -> Self {
        Self { server, connection }
    }

    pub fn server(&self) -> ServerId {
        self.server
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub async fn send_frame(&self, frame: &Frame) -> Result<()> {
        let bytes = frame.encode()?;
        self.connection
            .send(SESSION_SUBSTREAM, Ordering::Ordered, bytes)
            .await
            .map_err(|e| Error::Stream(self.server, e))
    }
}
