//! Exact streaming quantiles.

use serde::{Deserialize, Serialize};

const FUZZ: f64 = 4.0 * f64::EPSILON;

/// Summarizes one numerical feature by keeping every non-missing value,
/// answering exact quantile queries over the observed distribution. NaN
/// inputs are skipped.
///
/// Values are sorted lazily on the first query after an insertion, so query
/// methods take `&mut self`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExactQuantileSummarizer {
    values: Vec<f64>,
    sorted: bool,
    min: f64,
    max: f64,
}

impl Default for ExactQuantileSummarizer {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            sorted: true,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl ExactQuantileSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_value(&mut self, new_value: f64) {
        if new_value.is_nan() {
            return;
        }
        self.values.push(new_value);
        if new_value < self.min {
            self.min = new_value;
        }
        if new_value > self.max {
            self.max = new_value;
        } else {
            self.sorted = false;
        }
    }

    pub fn num_values(&self) -> u64 {
        self.values.len() as u64
    }

    /// NaN until a non-missing value has been seen.
    pub fn min(&self) -> f64 {
        if self.values.is_empty() {
            f64::NAN
        } else {
            self.min
        }
    }

    /// NaN until a non-missing value has been seen.
    pub fn max(&self) -> f64 {
        if self.values.is_empty() {
            f64::NAN
        } else {
            self.max
        }
    }

    /// The `phi`-quantile of the observed values, interpolating between
    /// order statistics (R's "type 5" definition). Out-of-range `phi`
    /// clamps to ∓∞; an empty summarizer answers NaN.
    pub fn quantile_at(&mut self, phi: f64) -> f64 {
        if phi < 0.0 {
            tracing::warn!(phi, "quantile requested below 0");
            return f64::NEG_INFINITY;
        } else if phi > 1.0 {
            tracing::warn!(phi, "quantile requested above 1");
            return f64::INFINITY;
        } else if self.values.is_empty() {
            return f64::NAN;
        }

        self.ensure_sorted();
        self.quantile_sorted(phi)
    }

    /// `num_splits` quantiles at evenly spaced probabilities, min and max
    /// included as the endpoints.
    pub fn quantiles_at_splits(&mut self, num_splits: u32) -> Vec<f64> {
        if self.values.is_empty() {
            return vec![f64::NAN; num_splits as usize];
        } else if self.values.len() == 1 {
            return vec![self.values[0]; num_splits as usize];
        } else if num_splits == 0 {
            return Vec::new();
        } else if num_splits == 1 {
            return vec![self.min];
        }

        self.ensure_sorted();

        let step = 1.0 / f64::from(num_splits - 1);
        let mut quantiles = Vec::with_capacity(num_splits as usize);
        quantiles.push(self.min);
        let mut phi = step;
        for _ in 0..num_splits - 2 {
            quantiles.push(self.quantile_sorted(phi));
            phi += step;
        }
        quantiles.push(self.max);
        quantiles
    }

    pub fn json_summary(&mut self) -> serde_json::Value {
        serde_json::json!({
            "quantiles": self.quantiles_at_splits(5),
        })
    }

    fn ensure_sorted(&mut self) {
        if !self.sorted {
            self.values.sort_by(f64::total_cmp);
            self.sorted = true;
        }
    }

    fn quantile_sorted(&self, phi: f64) -> f64 {
        let n = self.values.len();
        let index = phi * n as f64 + 0.5;
        let floor_index = (index + FUZZ).floor();
        let frac_index = index - floor_index;

        let mut int_index = floor_index as usize;
        if int_index == 0 {
            return self.min;
        }
        int_index -= 1;

        if frac_index.abs() <= FUZZ || int_index + 1 >= n {
            return self.values[int_index.min(n - 1)];
        }
        self.values[int_index] * (1.0 - frac_index) + self.values[int_index + 1] * frac_index
    }
}
