use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("mesh upload failed: {0}")]
    Upload(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
