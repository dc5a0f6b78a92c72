//! Static schema and record checks.
//!
//! Pure functions over the wire types, no I/O. A schema is valid when its
//! feature names are unique and no feature carries the INVALID type; a
//! record matches a schema when each of its three value sequences has
//! exactly as many entries as the schema has features of that type.

use std::collections::HashSet;
use std::fmt;

use saltfish_proto::saltfish::{feature, Feature, Record, Schema};
use thiserror::Error;

/// Why a record does not match its dataset's schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("dataset unusable as its schema contains an invalid feature (feature_name={name})")]
    InvalidFeature { name: String },

    #[error("dataset schema contains a feature type unsupported by saltfish")]
    UnsupportedFeature,

    #[error("record contains {got} numerical features (expected {expected})")]
    NumericalArity { got: usize, expected: usize },

    #[error("record contains {got} categorical features (expected {expected})")]
    CategoricalArity { got: usize, expected: usize },

    #[error("record contains {got} text features (expected {expected})")]
    TextArity { got: usize, expected: usize },
}

/// Number of features of each type in a schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureCounts {
    pub numericals: usize,
    pub categoricals: usize,
    pub texts: usize,
}

/// Counts features per type; INVALID and unknown types are not counted.
pub fn feature_counts(schema: &Schema) -> FeatureCounts {
    let mut counts = FeatureCounts::default();
    for feat in &schema.features {
        match feature::Type::try_from(feat.feature_type) {
            Ok(feature::Type::Numerical) => counts.numericals += 1,
            Ok(feature::Type::Categorical) => counts.categoricals += 1,
            Ok(feature::Type::Text) => counts.texts += 1,
            Ok(feature::Type::Invalid) | Err(_) => {}
        }
    }
    counts
}

/// True when two features share a name.
pub fn schema_has_duplicates(schema: &Schema) -> bool {
    let mut names = HashSet::with_capacity(schema.features.len());
    schema.features.iter().any(|feat| !names.insert(&feat.name))
}

/// True when any feature has the INVALID type (or one this build does not
/// know about).
pub fn schema_has_invalid_features(schema: &Schema) -> bool {
    schema
        .features
        .iter()
        .any(|feat| !matches!(
            feature::Type::try_from(feat.feature_type),
            Ok(feature::Type::Numerical)
                | Ok(feature::Type::Categorical)
                | Ok(feature::Type::Text)
        ))
}

/// Validates one record against a schema.
pub fn check_record(schema: &Schema, record: &Record) -> Result<(), RecordError> {
    for feat in &schema.features {
        match feature::Type::try_from(feat.feature_type) {
            Ok(feature::Type::Invalid) => {
                return Err(RecordError::InvalidFeature {
                    name: feat.name.clone(),
                })
            }
            Err(_) => return Err(RecordError::UnsupportedFeature),
            Ok(_) => {}
        }
    }
    let expected = feature_counts(schema);
    if record.numericals.len() != expected.numericals {
        return Err(RecordError::NumericalArity {
            got: record.numericals.len(),
            expected: expected.numericals,
        });
    }
    if record.categoricals.len() != expected.categoricals {
        return Err(RecordError::CategoricalArity {
            got: record.categoricals.len(),
            expected: expected.categoricals,
        });
    }
    if record.texts.len() != expected.texts {
        return Err(RecordError::TextArity {
            got: record.texts.len(),
            expected: expected.texts,
        });
    }
    Ok(())
}

/// Compact single-line rendering of a schema for log lines, e.g.
/// `[("sepal_len":NUMERICAL), ("species":CATEGORICAL)]`.
pub fn schema_to_str(schema: &Schema) -> String {
    struct Display<'a>(&'a Schema);

    impl fmt::Display for Display<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "[")?;
            for (i, feat) in self.0.features.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                let kind = feature::Type::try_from(feat.feature_type)
                    .map(|t| t.as_str_name())
                    .unwrap_or("UNKNOWN");
                write!(f, "(\"{}\":{})", feat.name, kind)?;
            }
            write!(f, "]")
        }
    }

    Display(schema).to_string()
}

/// Convenience constructor used across the test suites.
pub fn make_feature(name: &str, kind: feature::Type) -> Feature {
    Feature {
        name: name.to_string(),
        feature_type: kind as i32,
    }
}
