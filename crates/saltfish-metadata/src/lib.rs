//! Saltfish Metadata Store
//!
//! Typed wrapper over relational storage for dataset metadata. While record
//! payloads live in the KV object store, this crate tracks:
//!
//! - which datasets exist, who owns them, and their immutable schemas;
//! - the `private`/`frozen` flags and creation timestamps;
//! - the user-facing listing view (joined with the external `users`
//!   relation for usernames and emails).
//!
//! ## Backends
//!
//! - [`MySqlMetadataStore`]: production backend over MariaDB/MySQL through a
//!   `sqlx` connection pool. The pool is thread-safe, so callers hit it
//!   directly instead of bouncing through a dedicated worker thread.
//!   Transport-level failures are retried transparently before surfacing
//!   [`MetadataError::Sql`].
//! - [`MemoryMetadataStore`]: in-process backend for tests and local
//!   development, with a seedable users relation.
//!
//! All implementations are `Send + Sync` and shared as
//! `Arc<dyn MetadataStore>`.

pub mod error;
pub mod memory;
pub mod mysql;
pub mod types;

pub use error::{MetadataError, Result};
pub use memory::MemoryMetadataStore;
pub use mysql::MySqlMetadataStore;
pub use types::{DatasetConfig, DatasetDetail};

use async_trait::async_trait;

/// Metadata store contract.
///
/// Schemas are opaque byte blobs to this layer; parsing and validation live
/// with the caller. Every method maps storage failures into the
/// [`MetadataError`] taxonomy, never panicking across the boundary.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Returns the serialized schema of the dataset.
    ///
    /// # Errors
    ///
    /// - `InvalidDatasetId` when no row exists for the id.
    /// - `Sql` when the backend could not be reached after retries.
    async fn fetch_schema(&self, dataset_id: &[u8]) -> Result<Vec<u8>>;

    /// Inserts a new dataset row.
    ///
    /// # Errors
    ///
    /// - `InvalidUserId` when the owner fails the foreign-key check.
    /// - `DuplicateDatasetName` when the owner already has a dataset of
    ///   that name.
    /// - `Sql` for anything else, including an id collision (callers check
    ///   idempotency before inserting).
    async fn create_dataset(&self, dataset: DatasetConfig) -> Result<()>;

    /// Deletes the dataset row, returning the number of rows removed
    /// (0 or 1, so deleting twice is observable but not an error).
    async fn delete_dataset(&self, dataset_id: &[u8]) -> Result<u64>;

    /// Returns the dataset row joined with its owner's username and email.
    ///
    /// # Errors
    ///
    /// - `InvalidDatasetId` when no row exists for the id.
    async fn get_dataset_by_id(&self, dataset_id: &[u8]) -> Result<DatasetDetail>;

    /// All datasets owned by `user_id`, sorted by name. An unknown user
    /// simply owns no datasets.
    async fn get_datasets_by_user(&self, user_id: i64) -> Result<Vec<DatasetDetail>>;

    /// All datasets owned by the user with `username`, sorted by name.
    ///
    /// # Errors
    ///
    /// - `InvalidUsername` when no such user exists.
    async fn get_datasets_by_username(&self, username: &str) -> Result<Vec<DatasetDetail>>;
}
