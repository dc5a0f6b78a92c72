use bytes::Bytes;

/// Opaque causal token returned by a fetch and threaded into the next store
/// of the same key. Skipping it loses sibling-merge semantics on concurrent
/// updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutContext(Bytes);

impl PutContext {
    pub fn new(token: impl Into<Bytes>) -> Self {
        Self(token.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A value under `(bucket, key)` together with its secondary indexes and,
/// when it came out of a fetch, the causal context to write back with.
#[derive(Debug, Clone)]
pub struct KvObject {
    pub bucket: String,
    pub key: Bytes,
    pub value: Bytes,
    pub indexes: Vec<(String, String)>,
    pub context: Option<PutContext>,
}

impl KvObject {
    pub fn new(bucket: impl Into<String>, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            value: value.into(),
            indexes: Vec::new(),
            context: None,
        }
    }

    /// Attaches a secondary index pair.
    pub fn add_index(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.indexes.push((name.into(), value.into()));
    }

    /// Looks up a secondary index value by name.
    pub fn index(&self, name: &str) -> Option<&str> {
        self.indexes
            .iter()
            .find(|(index_name, _)| index_name == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn with_context(mut self, context: PutContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// Result of a fetch: the resolved object, if one exists, and the causal
/// context for a subsequent store.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub object: Option<KvObject>,
    pub context: PutContext,
}
