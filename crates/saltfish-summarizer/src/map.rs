//! Per-dataset summarizer registry backed by KV snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use prost::Message;

use saltfish_core::ids::id_to_str;
use saltfish_kv::{KvObject, KvStore};
use saltfish_proto::saltfish::{PutRecordsRequest, Schema};

use crate::record::RecordSummarizer;

/// Bucket holding summarizer snapshots, keyed by raw dataset id.
pub const SUMMARIZERS_BUCKET: &str = "summarizers";

/// Owns the per-dataset summarizers of one listener. Not internally
/// synchronized: the listener's serialized queue is the only caller.
///
/// Persistence is best-effort, the KV record history is the source of truth.
/// A snapshot that fails to load or store is logged and the state rebuilt or
/// re-persisted on a later batch.
pub struct SummarizerMap {
    kv: Arc<dyn KvStore>,
    schemas_bucket: String,
    summarizers_bucket: String,
    summarizers: HashMap<Vec<u8>, RecordSummarizer>,
}

impl SummarizerMap {
    pub fn new(kv: Arc<dyn KvStore>, schemas_bucket: impl Into<String>) -> Self {
        Self::with_buckets(kv, schemas_bucket, SUMMARIZERS_BUCKET)
    }

    pub fn with_buckets(
        kv: Arc<dyn KvStore>,
        schemas_bucket: impl Into<String>,
        summarizers_bucket: impl Into<String>,
    ) -> Self {
        Self {
            kv,
            schemas_bucket: schemas_bucket.into(),
            summarizers_bucket: summarizers_bucket.into(),
            summarizers: HashMap::new(),
        }
    }

    /// Consumes one published PutRecords payload.
    pub async fn push_request(&mut self, payload: &[u8]) {
        let request = match PutRecordsRequest::decode(payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "summarizer received an undecodable payload");
                return;
            }
        };
        self.apply(&request).await;
    }

    /// Folds one batch into the dataset's summarizer and persists the
    /// updated snapshot.
    pub async fn apply(&mut self, request: &PutRecordsRequest) {
        if !self.summarizers.contains_key(&request.dataset_id) {
            match self.load_summarizer(&request.dataset_id).await {
                Some(summarizer) => {
                    self.summarizers
                        .insert(request.dataset_id.clone(), summarizer);
                }
                None => {
                    tracing::warn!(
                        dataset_id = %id_to_str(&request.dataset_id),
                        "dropping batch, no summarizer state could be initialized"
                    );
                    return;
                }
            }
        }
        let summarizer = match self.summarizers.get_mut(&request.dataset_id) {
            Some(summarizer) => summarizer,
            None => return,
        };

        for tagged in &request.records {
            let Some(record) = &tagged.record else { continue };
            if let Err(e) = summarizer.push_record(record) {
                tracing::warn!(
                    dataset_id = %id_to_str(&request.dataset_id),
                    error = %e,
                    "skipping record that does not match the stored schema"
                );
            }
        }

        self.save_summarizer(&request.dataset_id).await;
    }

    /// Current JSON summary of a dataset, loading the snapshot on demand.
    pub async fn to_json(&mut self, dataset_id: &[u8]) -> Option<serde_json::Value> {
        if !self.summarizers.contains_key(dataset_id) {
            let summarizer = self.load_summarizer(dataset_id).await?;
            self.summarizers.insert(dataset_id.to_vec(), summarizer);
        }
        self.summarizers.get(dataset_id).map(|s| s.to_json())
    }

    async fn load_summarizer(&self, dataset_id: &[u8]) -> Option<RecordSummarizer> {
        match self.kv.fetch(&self.summarizers_bucket, dataset_id).await {
            Ok(fetched) => {
                if let Some(object) = fetched.object {
                    match RecordSummarizer::decode(&object.value) {
                        Ok(summarizer) => return Some(summarizer),
                        Err(e) => {
                            tracing::warn!(
                                dataset_id = %id_to_str(dataset_id),
                                error = %e,
                                "corrupt summarizer snapshot, reinitializing from schema"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    dataset_id = %id_to_str(dataset_id),
                    error = %e,
                    "could not fetch summarizer snapshot"
                );
                return None;
            }
        }
        self.fetch_schema(dataset_id).await.map(RecordSummarizer::new)
    }

    async fn fetch_schema(&self, dataset_id: &[u8]) -> Option<Schema> {
        match self.kv.fetch(&self.schemas_bucket, dataset_id).await {
            Ok(fetched) => match fetched.object {
                Some(object) => match Schema::decode(object.value.as_ref()) {
                    Ok(schema) => Some(schema),
                    Err(e) => {
                        tracing::warn!(
                            dataset_id = %id_to_str(dataset_id),
                            error = %e,
                            "schema snapshot is undecodable"
                        );
                        None
                    }
                },
                None => {
                    tracing::warn!(
                        bucket = %self.schemas_bucket,
                        dataset_id = %id_to_str(dataset_id),
                        "schema snapshot missing"
                    );
                    None
                }
            },
            Err(e) => {
                tracing::warn!(
                    dataset_id = %id_to_str(dataset_id),
                    error = %e,
                    "could not fetch schema snapshot"
                );
                None
            }
        }
    }

    async fn save_summarizer(&self, dataset_id: &[u8]) {
        let Some(summarizer) = self.summarizers.get(dataset_id) else {
            return;
        };
        let encoded = match summarizer.encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(
                    dataset_id = %id_to_str(dataset_id),
                    error = %e,
                    "could not encode summarizer snapshot"
                );
                return;
            }
        };

        // Fetch first to carry the causal context into the write; this task
        // is the only writer of the bucket.
        let context = match self.kv.fetch(&self.summarizers_bucket, dataset_id).await {
            Ok(fetched) => Some(fetched.context),
            Err(e) => {
                tracing::warn!(
                    dataset_id = %id_to_str(dataset_id),
                    error = %e,
                    "could not fetch snapshot context, storing without it"
                );
                None
            }
        };

        let mut object = KvObject::new(
            self.summarizers_bucket.clone(),
            dataset_id.to_vec(),
            encoded,
        );
        object.context = context;
        if let Err(e) = self.kv.store(object).await {
            tracing::warn!(
                dataset_id = %id_to_str(dataset_id),
                error = %e,
                "could not persist summarizer snapshot, dropping batch"
            );
        }
    }
}
