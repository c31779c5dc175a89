use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no query registered for querier {0:?}")]
    UnknownQuery(sirikata_types::QuerierId),
    #[error("invalid query parameters: {0}")]
    InvalidQuery(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
