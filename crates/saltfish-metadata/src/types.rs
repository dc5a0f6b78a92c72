use chrono::{DateTime, Utc};

/// Parameters for inserting a dataset row. The id is resolved by the caller
/// (client-supplied or freshly generated) before the insert.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// 24 raw bytes.
    pub id: Vec<u8>,
    pub user_id: i64,
    /// Opaque serialized schema blob; immutable once inserted.
    pub schema: Vec<u8>,
    pub name: String,
    pub private: bool,
    pub frozen: bool,
}

/// A dataset row joined with its owner, as served by listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDetail {
    pub id: Vec<u8>,
    pub user_id: i64,
    pub schema: Vec<u8>,
    pub name: String,
    pub private: bool,
    pub frozen: bool,
    pub created: DateTime<Utc>,
    pub username: String,
    pub email: String,
}
