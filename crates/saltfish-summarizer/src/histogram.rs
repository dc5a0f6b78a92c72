//! Value histograms for categorical features.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Summarizes one categorical feature as a `value → count` map. The empty
/// string marks a missing value and is counted separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalHistogramSummarizer {
    num_values: u64,
    num_missing: u64,
    value_counts: HashMap<String, u64>,
}

impl CategoricalHistogramSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_value(&mut self, new_value: &str) {
        if new_value.is_empty() {
            self.num_missing += 1;
        } else {
            self.num_values += 1;
            *self.value_counts.entry(new_value.to_string()).or_insert(0) += 1;
        }
    }

    pub fn value_count(&self, value: &str) -> u64 {
        self.value_counts.get(value).copied().unwrap_or(0)
    }

    pub fn num_values(&self) -> u64 {
        self.num_values
    }

    pub fn num_missing(&self) -> u64 {
        self.num_missing
    }

    pub fn num_unique_values(&self) -> u64 {
        self.value_counts.len() as u64
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.value_counts.iter().map(|(value, count)| (value.as_str(), *count))
    }

    pub fn json_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "num_values": self.num_values,
            "num_unique_values": self.num_unique_values(),
            "num_missing": self.num_missing,
            "histogram": self.value_counts,
        })
    }
}
