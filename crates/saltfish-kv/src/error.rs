use thiserror::Error;

pub type Result<T> = std::result::Result<T, KvError>;

#[derive(Debug, Clone, Error)]
pub enum KvError {
    #[error("could not connect to the storage backend: {0}")]
    Connection(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}
