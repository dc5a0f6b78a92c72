//! Schema-driven summarizer for whole records.

use prost::Message;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use saltfish_core::validate::{check_record, feature_counts, RecordError};
use saltfish_proto::saltfish::{feature, Record, Schema};

use crate::histogram::CategoricalHistogramSummarizer;
use crate::moments::MomentsSummarizer;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot envelope is not decodable: {0}")]
    Envelope(#[from] bincode::Error),

    #[error("snapshot carries an undecodable schema: {0}")]
    Schema(#[from] prost::DecodeError),
}

/// One summarizer per feature of a dataset's schema, in schema order:
/// moments for numerical features, histograms for categorical ones. Text
/// features are not summarized.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSummarizer {
    schema: Schema,
    numericals: Vec<MomentsSummarizer>,
    categoricals: Vec<CategoricalHistogramSummarizer>,
}

/// Stable on-disk form: the prost-encoded schema plus the per-feature
/// states, wrapped in bincode.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    schema: Vec<u8>,
    numericals: Vec<MomentsSummarizer>,
    categoricals: Vec<CategoricalHistogramSummarizer>,
}

impl RecordSummarizer {
    pub fn new(schema: Schema) -> Self {
        let counts = feature_counts(&schema);
        Self {
            schema,
            numericals: vec![MomentsSummarizer::new(); counts.numericals],
            categoricals: vec![CategoricalHistogramSummarizer::new(); counts.categoricals],
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn numericals(&self) -> &[MomentsSummarizer] {
        &self.numericals
    }

    pub fn categoricals(&self) -> &[CategoricalHistogramSummarizer] {
        &self.categoricals
    }

    /// Folds one record into the summaries. Records that do not match the
    /// schema are rejected and leave the state untouched.
    pub fn push_record(&mut self, record: &Record) -> Result<(), RecordError> {
        check_record(&self.schema, record)?;
        for (summ, value) in self.numericals.iter_mut().zip(&record.numericals) {
            summ.push_value(*value);
        }
        for (summ, value) in self.categoricals.iter_mut().zip(&record.categoricals) {
            summ.push_value(value);
        }
        Ok(())
    }

    /// Per-feature summaries as a JSON array in schema order; text features
    /// yield null entries.
    pub fn to_json(&self) -> serde_json::Value {
        let mut entries = Vec::with_capacity(self.schema.features.len());
        let mut i_numerical = 0;
        let mut i_categorical = 0;
        for feat in &self.schema.features {
            match feature::Type::try_from(feat.feature_type) {
                Ok(feature::Type::Numerical) => {
                    entries.push(self.numericals[i_numerical].json_summary());
                    i_numerical += 1;
                }
                Ok(feature::Type::Categorical) => {
                    entries.push(self.categoricals[i_categorical].json_summary());
                    i_categorical += 1;
                }
                _ => entries.push(serde_json::Value::Null),
            }
        }
        serde_json::Value::Array(entries)
    }

    /// Serializes the full state into the stable snapshot form.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let snapshot = Snapshot {
            schema: self.schema.encode_to_vec(),
            numericals: self.numericals.clone(),
            categoricals: self.categoricals.clone(),
        };
        Ok(bincode::serialize(&snapshot)?)
    }

    /// Restores a summarizer from a snapshot produced by
    /// [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Snapshot = bincode::deserialize(bytes)?;
        Ok(Self {
            schema: Schema::decode(snapshot.schema.as_slice())?,
            numericals: snapshot.numericals,
            categoricals: snapshot.categoricals,
        })
    }
}
