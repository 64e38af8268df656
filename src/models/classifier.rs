//! Binary classifier interface

use crate::feature_aligner::FeatureVector;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decision threshold used when a caller asks for a bare label.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Displayed decision for one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Legitimate,
    Fraud,
}

impl Label {
    /// Fraud iff the probability is strictly above the threshold.
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability > threshold {
            Label::Fraud
        } else {
            Label::Legitimate
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Legitimate => f.write_str("legitimate"),
            Label::Fraud => f.write_str("fraud"),
        }
    }
}

/// A pre-trained fraud classifier.
pub trait Classifier: Send + Sync {
    /// Probability of the fraud class, in [0, 1].
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64>;

    /// Hard label at the default threshold.
    fn predict(&self, features: &FeatureVector) -> Result<Label> {
        let probability = self.predict_proba(features)?;
        Ok(Label::from_probability(probability, DEFAULT_THRESHOLD))
    }

    /// Model name for logs
    fn name(&self) -> &str;
}
