//! Shared fixtures for unit tests

use crate::feature_aligner::{FeatureAligner, FeatureVector};
use crate::models::classifier::Classifier;
use crate::types::record::RawRecord;
use anyhow::Result;

/// Feature order of the PaySim-trained model.
pub(crate) fn paysim_names() -> Vec<&'static str> {
    vec![
        "step",
        "amount",
        "oldbalanceOrg",
        "newbalanceOrig",
        "oldbalanceDest",
        "newbalanceDest",
        "type_CASH_IN",
        "type_CASH_OUT",
        "type_DEBIT",
        "type_PAYMENT",
        "type_TRANSFER",
    ]
}

pub(crate) fn paysim_aligner() -> FeatureAligner {
    FeatureAligner::new(paysim_names())
}

/// Complete record that drains the sender account.
pub(crate) fn record(kind: &str, amount: f64) -> RawRecord {
    RawRecord::new()
        .with("type", kind)
        .with("amount", amount)
        .with("oldbalanceOrg", amount)
        .with("newbalanceOrig", 0.0)
        .with("oldbalanceDest", 0.0)
        .with("newbalanceDest", amount)
}

/// Classifier whose probability is a plain function of the features.
pub(crate) struct ScriptedClassifier {
    score: Box<dyn Fn(&FeatureVector) -> f64 + Send + Sync>,
}

impl ScriptedClassifier {
    pub(crate) fn new(score: impl Fn(&FeatureVector) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            score: Box::new(score),
        }
    }

    pub(crate) fn constant(probability: f64) -> Self {
        Self::new(move |_| probability)
    }

    /// Fraud score driven by the amount: anything above `limit` scores 0.9.
    pub(crate) fn amount_above(limit: f64) -> Self {
        Self::new(move |f| {
            if f.get("amount").unwrap_or(0.0) > limit {
                0.9
            } else {
                0.1
            }
        })
    }
}

impl Classifier for ScriptedClassifier {
    fn predict_proba(&self, features: &FeatureVector) -> Result<f64> {
        Ok((self.score)(features))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
