//! Async key-value object store interface.
//!
//! The store keeps opaque values in named buckets. Objects carry secondary
//! `(name, value)` index pairs and a causal context: a store racing another
//! writer under a stale context may produce siblings, which the backend
//! reduces to a single canonical value through the resolver registered at
//! construction. Callers therefore fetch before storing, threading the
//! fetched context into the subsequent store.
//!
//! The production driver is an external collaborator; [`MemoryKvStore`]
//! implements the same contract in process for development and tests.

pub mod error;
pub mod memory;
pub mod object;

pub use error::{KvError, Result};
pub use memory::MemoryKvStore;
pub use object::{Fetched, KvObject, PutContext};

use async_trait::async_trait;

/// Store backend contract. Implementations are internally thread-safe and
/// shared as `Arc<dyn KvStore>`.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetches the object at `(bucket, key)`, resolving siblings if any.
    ///
    /// Always yields a causal context to thread into a following
    /// [`store`](KvStore::store), whether or not a value exists.
    async fn fetch(&self, bucket: &str, key: &[u8]) -> Result<Fetched>;

    /// Writes an object. A missing or stale causal context does not fail
    /// the write; it may create siblings resolved on a later fetch.
    async fn store(&self, object: KvObject) -> Result<()>;
}
