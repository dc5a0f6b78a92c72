use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetadataError>;

/// The complete error taxonomy of the metadata layer. The RPC boundary maps
/// each variant onto exactly one response status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("no dataset exists with the given id")]
    InvalidDatasetId,

    #[error("the user id does not exist")]
    InvalidUserId,

    #[error("no user exists with username {0}")]
    InvalidUsername(String),

    #[error("the user already owns a dataset with the same name")]
    DuplicateDatasetName,

    #[error("sql connection error: {0}")]
    Sql(String),
}

impl From<sqlx::Error> for MetadataError {
    fn from(e: sqlx::Error) -> Self {
        MetadataError::Sql(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for MetadataError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        MetadataError::Sql(e.to_string())
    }
}
