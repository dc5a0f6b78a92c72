//! Streaming mean and variance via Welford's recurrence.

use serde::{Deserialize, Serialize};

/// Summarizes one numerical feature. NaN inputs count as missing values and
/// leave the moments untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MomentsSummarizer {
    mean: f64,
    m2: f64,
    num_values: u64,
    num_missing: u64,
}

impl MomentsSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_value(&mut self, new_value: f64) {
        if new_value.is_nan() {
            self.num_missing += 1;
        } else {
            self.num_values += 1;
            let delta = new_value - self.mean;
            self.mean += delta / self.num_values as f64;
            self.m2 += delta * (new_value - self.mean);
        }
    }

    /// NaN until a non-missing value has been seen.
    pub fn mean(&self) -> f64 {
        if self.num_values == 0 {
            f64::NAN
        } else {
            self.mean
        }
    }

    /// Sample variance `m2 / (n - 1)`; NaN with fewer than two values.
    pub fn variance(&self) -> f64 {
        if self.num_values == 0 {
            f64::NAN
        } else {
            self.m2 / (self.num_values as f64 - 1.0)
        }
    }

    pub fn num_values(&self) -> u64 {
        self.num_values
    }

    pub fn num_missing(&self) -> u64 {
        self.num_missing
    }

    /// Statistic name → value map; non-finite statistics render as null.
    pub fn json_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "mean": self.mean(),
            "variance": self.variance(),
            "num_values": self.num_values,
            "num_missing": self.num_missing,
        })
    }
}
