//! Streaming record summaries.
//!
//! An optional consumer of the PutRecords listener stream: for every dataset
//! it maintains one streaming summary per feature — running mean/variance
//! for numerical features, value histograms for categorical ones — and
//! persists a snapshot to the KV store after each batch. The record history
//! in the KV store remains the source of truth; a crashed summarizer resumes
//! from its last snapshot.

pub mod histogram;
pub mod map;
pub mod moments;
pub mod quantile;
pub mod record;

pub use histogram::CategoricalHistogramSummarizer;
pub use map::{SummarizerMap, SUMMARIZERS_BUCKET};
pub use moments::MomentsSummarizer;
pub use quantile::ExactQuantileSummarizer;
pub use record::{RecordSummarizer, SnapshotError};
