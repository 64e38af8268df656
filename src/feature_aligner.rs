//! Feature alignment for model inference.
//!
//! Turns a raw record (form entry or spreadsheet row) into the exact ordered
//! vector the classifier was fit on. Text cells are one-hot expanded into
//! `<column>_<value>` indicators, numeric cells pass through under their own
//! name, and every expected column the expansion did not produce is zero.

use crate::error::SchemaError;
use crate::types::record::{Cell, RawRecord};
use crate::types::transaction::{Transaction, REQUIRED_COLUMNS};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{trace, warn};

/// A categorical value that produced no indicator the model knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnseenCategory {
    pub column: String,
    pub value: String,
}

/// Model-ready features, ordered exactly as the model expects.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    names: Arc<[String]>,
    values: Vec<f64>,
    unseen: Vec<UnseenCategory>,
}

impl FeatureVector {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a named feature.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Values as `f32`, the tensor element type the ONNX export takes.
    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|&v| v as f32).collect()
    }

    /// Categorical values that were treated as "none of the known categories".
    pub fn unseen_categories(&self) -> &[UnseenCategory] {
        &self.unseen
    }

    /// Copy of this vector with one position replaced.
    pub fn with_value(&self, index: usize, value: f64) -> Self {
        let mut values = self.values.clone();
        values[index] = value;
        Self {
            names: Arc::clone(&self.names),
            values,
            unseen: self.unseen.clone(),
        }
    }
}

/// Aligns raw records to the feature order shipped with the model.
pub struct FeatureAligner {
    names: Arc<[String]>,
    index: HashMap<String, usize>,
}

impl FeatureAligner {
    /// Create an aligner for the model's ordered feature names.
    pub fn new<I, S>(expected_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Arc<[String]> = expected_names.into_iter().map(Into::into).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { names, index }
    }

    /// Align a raw record.
    ///
    /// Fails with [`SchemaError::MissingFields`] when a required raw column is
    /// absent or empty; the check runs before any expansion.
    pub fn align(&self, record: &RawRecord) -> Result<FeatureVector, SchemaError> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|column| record.get(column).map_or(true, Cell::is_empty))
            .map(|column| column.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::MissingFields(missing));
        }

        let mut values = vec![0.0; self.names.len()];
        let mut unseen = Vec::new();

        for (column, cell) in record.fields() {
            let (name, value) = match cell {
                Cell::Number(v) => (column.to_string(), *v),
                Cell::Bool(b) => (column.to_string(), if *b { 1.0 } else { 0.0 }),
                Cell::Text(text) => (format!("{column}_{text}"), 1.0),
                Cell::Empty => continue,
            };

            match self.index.get(&name) {
                Some(&i) => values[i] = value,
                None => match cell {
                    Cell::Text(text) if self.has_indicators(column) => {
                        warn!(
                            column = %column,
                            value = %text,
                            "Unseen category; all of its indicator columns resolve to 0"
                        );
                        unseen.push(UnseenCategory {
                            column: column.to_string(),
                            value: text.clone(),
                        });
                    }
                    _ => trace!(column = %name, "Dropping column the model does not expect"),
                },
            }
        }

        Ok(FeatureVector {
            names: Arc::clone(&self.names),
            values,
            unseen,
        })
    }

    /// Align a validated form transaction.
    pub fn align_transaction(&self, tx: &Transaction) -> Result<FeatureVector, SchemaError> {
        self.align(&tx.to_record())
    }

    /// Required raw columns absent from a header row, in required order.
    pub fn missing_columns<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
        REQUIRED_COLUMNS
            .iter()
            .filter(|required| !headers.iter().any(|h| h.as_ref() == **required))
            .map(|required| required.to_string())
            .collect()
    }

    /// Whether the model knows any one-hot indicator for this raw column.
    fn has_indicators(&self, column: &str) -> bool {
        let prefix = format!("{column}_");
        self.names.iter().any(|name| name.starts_with(&prefix))
    }

    pub fn expected_names(&self) -> &[String] {
        &self.names
    }

    pub fn feature_count(&self) -> usize {
        self.names.len()
    }
}
