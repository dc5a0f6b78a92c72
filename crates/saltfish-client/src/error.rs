use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The server could not be reached at all.
    #[error("could not reach the saltfish server: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The transport delivered the request but the call itself failed.
    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),

    /// The server processed the request and rejected it with an in-band
    /// status.
    #[error("{operation} rejected with {status}: {msg}")]
    Rejected {
        operation: &'static str,
        status: String,
        msg: String,
    },
}

impl ClientError {
    /// Status name of an in-band rejection (`"DUPLICATE_DATASET_NAME"`,
    /// ...), if this is one.
    pub fn status(&self) -> Option<&str> {
        match self {
            ClientError::Rejected { status, .. } => Some(status),
            _ => None,
        }
    }
}
