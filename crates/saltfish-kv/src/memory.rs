//! In-memory [`KvStore`] backend.
//!
//! Mirrors the causal-context semantics of the production store: every key
//! carries a version counter handed out as the put context; a store under a
//! stale or missing context against an existing key creates siblings, which
//! the next fetch reduces through the configured resolver. Also carries
//! failure-injection switches for exercising the error paths in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::error::{KvError, Result};
use crate::object::{Fetched, KvObject, PutContext};
use crate::KvStore;

use async_trait::async_trait;

/// Given the sibling values under one key, picks the index of the winner.
pub type SiblingResolver = Arc<dyn Fn(&[Bytes]) -> usize + Send + Sync>;

/// Deterministic default policy: keep the lexicographically smallest
/// serialized value.
pub fn smallest_value_resolver() -> SiblingResolver {
    Arc::new(|siblings| {
        siblings
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(i, _)| i)
            .unwrap_or(0)
    })
}

#[derive(Clone)]
struct Stored {
    value: Bytes,
    indexes: Vec<(String, String)>,
}

struct Entry {
    version: u64,
    siblings: Vec<Stored>,
}

#[derive(Default)]
struct Shard {
    keys: HashMap<Vec<u8>, Entry>,
}

pub struct MemoryKvStore {
    buckets: Mutex<HashMap<String, Shard>>,
    resolver: SiblingResolver,
    fail_fetches: AtomicBool,
    fail_stores: AtomicBool,
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::with_resolver(smallest_value_resolver())
    }

    pub fn with_resolver(resolver: SiblingResolver) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            resolver,
            fail_fetches: AtomicBool::new(false),
            fail_stores: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent fetch fail with a connection error.
    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent store fail with a connection error.
    pub fn fail_stores(&self, fail: bool) {
        self.fail_stores.store(fail, Ordering::SeqCst);
    }

    /// Number of keys currently stored in `bucket`.
    pub fn key_count(&self, bucket: &str) -> usize {
        let buckets = self.buckets.lock().unwrap();
        buckets.get(bucket).map(|shard| shard.keys.len()).unwrap_or(0)
    }

    /// All keys of `bucket`, in unspecified order.
    pub fn keys(&self, bucket: &str) -> Vec<Vec<u8>> {
        let buckets = self.buckets.lock().unwrap();
        buckets
            .get(bucket)
            .map(|shard| shard.keys.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Resolved object at `(bucket, key)`, for assertions on values and
    /// secondary indexes.
    pub fn object_at(&self, bucket: &str, key: &[u8]) -> Option<KvObject> {
        let mut buckets = self.buckets.lock().unwrap();
        let entry = buckets.get_mut(bucket)?.keys.get_mut(key)?;
        let stored = Self::resolve(entry, &self.resolver, bucket, key);
        Some(KvObject {
            bucket: bucket.to_string(),
            key: Bytes::copy_from_slice(key),
            value: stored.value,
            indexes: stored.indexes,
            context: Some(version_context(entry.version)),
        })
    }

    fn resolve(entry: &mut Entry, resolver: &SiblingResolver, bucket: &str, key: &[u8]) -> Stored {
        if entry.siblings.len() > 1 {
            let values: Vec<Bytes> = entry.siblings.iter().map(|s| s.value.clone()).collect();
            let winner = resolver(&values).min(entry.siblings.len() - 1);
            tracing::warn!(
                bucket,
                key = %HexKey(key),
                siblings = entry.siblings.len(),
                winner,
                "resolving siblings"
            );
            let kept = entry.siblings[winner].clone();
            entry.siblings = vec![kept];
        }
        entry.siblings[0].clone()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn fetch(&self, bucket: &str, key: &[u8]) -> Result<Fetched> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(KvError::Connection("injected fetch failure".to_string()));
        }
        let mut buckets = self.buckets.lock().unwrap();
        let shard = match buckets.get_mut(bucket) {
            Some(shard) => shard,
            None => {
                return Ok(Fetched {
                    object: None,
                    context: version_context(0),
                })
            }
        };
        match shard.keys.get_mut(key) {
            Some(entry) => {
                let stored = Self::resolve(entry, &self.resolver, bucket, key);
                let context = version_context(entry.version);
                Ok(Fetched {
                    object: Some(KvObject {
                        bucket: bucket.to_string(),
                        key: Bytes::copy_from_slice(key),
                        value: stored.value,
                        indexes: stored.indexes,
                        context: Some(context.clone()),
                    }),
                    context,
                })
            }
            None => Ok(Fetched {
                object: None,
                context: version_context(0),
            }),
        }
    }

    async fn store(&self, object: KvObject) -> Result<()> {
        if self.fail_stores.load(Ordering::SeqCst) {
            return Err(KvError::Connection("injected store failure".to_string()));
        }
        let mut buckets = self.buckets.lock().unwrap();
        let shard = buckets.entry(object.bucket.clone()).or_default();
        let stored = Stored {
            value: object.value,
            indexes: object.indexes,
        };
        match shard.keys.get_mut(object.key.as_ref()) {
            Some(entry) => {
                let current = version_context(entry.version);
                if object.context.as_ref() == Some(&current) {
                    entry.siblings = vec![stored];
                } else {
                    // Concurrent or context-free overwrite: keep both until
                    // the next fetch resolves.
                    entry.siblings.push(stored);
                }
                entry.version += 1;
            }
            None => {
                shard.keys.insert(
                    object.key.to_vec(),
                    Entry {
                        version: 1,
                        siblings: vec![stored],
                    },
                );
            }
        }
        Ok(())
    }
}

fn version_context(version: u64) -> PutContext {
    PutContext::new(version.to_le_bytes().to_vec())
}

struct HexKey<'a>(&'a [u8]);

impl std::fmt::Display for HexKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
