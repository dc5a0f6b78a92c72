//! Saltfish core primitives.
//!
//! Everything here is I/O free: identifier generation and the process-wide
//! monotonic tick counter, static schema/record validation, and the fan-in
//! reply barrier used by the PutRecords scatter/gather.

pub mod ids;
pub mod sync;
pub mod validate;

pub use ids::{
    gen_dataset_id, gen_random_string, gen_random_u64, gen_record_id, id_to_str, monotonic_tick,
    record_id_to_u64, DATASET_ID_WIDTH, RECORD_ID_WIDTH,
};
pub use sync::ReplySync;
pub use validate::{
    check_record, feature_counts, schema_has_duplicates, schema_has_invalid_features,
    schema_to_str, FeatureCounts, RecordError,
};
