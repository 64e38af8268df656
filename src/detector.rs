//! Classification and explanation around a pre-trained model

use crate::config::DetectionConfig;
use crate::feature_aligner::{FeatureVector, UnseenCategory};
use crate::models::classifier::{Classifier, Label};
use crate::models::explainer::{Contribution, Explainer};
use crate::types::alert::{FraudAlert, RiskLevel, RiskLevelThresholds};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

/// Outcome of classifying one feature vector
#[derive(Debug, Clone)]
pub struct Assessment {
    /// Probability of the fraud class (0.0 - 1.0)
    pub probability: f64,
    pub label: Label,
    pub risk_level: RiskLevel,
    /// Ranked contributions, present only for explained fraud verdicts
    pub contributions: Vec<Contribution>,
    /// Categorical values the model never saw during training
    pub unseen_categories: Vec<UnseenCategory>,
}

impl Assessment {
    pub fn is_fraud(&self) -> bool {
        self.label == Label::Fraud
    }

    /// One sentence per contribution
    pub fn explanation(&self) -> Vec<String> {
        self.contributions.iter().map(Contribution::sentence).collect()
    }

    /// Convert to an alert for the given source description
    pub fn to_alert(&self, source: String, features: &FeatureVector) -> FraudAlert {
        let transaction_type = features
            .iter()
            .find(|(name, value)| name.starts_with("type_") && *value == 1.0)
            .map(|(name, _)| name.trim_start_matches("type_").to_string())
            .or_else(|| {
                self.unseen_categories
                    .iter()
                    .find(|u| u.column == "type")
                    .map(|u| u.value.clone())
            })
            .unwrap_or_default();

        FraudAlert::new(source, self.probability, self.risk_level)
            .with_transaction_details(transaction_type, features.get("amount").unwrap_or(0.0))
            .with_triggered_features(self.contributions.iter().map(Contribution::tag).collect())
    }
}

/// Applies the decision threshold and, for fraud, asks the explainer why
pub struct Detector {
    classifier: Arc<dyn Classifier>,
    explainer: Option<Arc<dyn Explainer>>,
    threshold: f64,
    explain_features: usize,
    risk_levels: RiskLevelThresholds,
}

impl Detector {
    /// Detector without explanations
    pub fn new(classifier: Arc<dyn Classifier>, config: &DetectionConfig) -> Self {
        Self {
            classifier,
            explainer: None,
            threshold: config.threshold,
            explain_features: config.explain_features,
            risk_levels: config.risk_levels.clone(),
        }
    }

    pub fn with_explainer(mut self, explainer: Arc<dyn Explainer>) -> Self {
        self.explainer = Some(explainer);
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn model_name(&self) -> &str {
        self.classifier.name()
    }

    /// Classify one vector; fraud verdicts are explained when an explainer is set.
    pub fn assess(&self, features: &FeatureVector) -> Result<Assessment> {
        let probability = self
            .classifier
            .predict_proba(features)
            .with_context(|| format!("Model {} failed to score transaction", self.classifier.name()))?;
        let label = Label::from_probability(probability, self.threshold);

        let contributions = match (&self.explainer, label) {
            (Some(explainer), Label::Fraud) => explainer
                .explain(self.classifier.as_ref(), features, self.explain_features)
                .context("Failed to explain fraud verdict")?,
            _ => Vec::new(),
        };

        debug!(
            probability = probability,
            label = %label,
            contributions = contributions.len(),
            "Transaction assessed"
        );

        Ok(Assessment {
            probability,
            label,
            risk_level: RiskLevel::from_score(probability, &self.risk_levels),
            contributions,
            unseen_categories: features.unseen_categories().to_vec(),
        })
    }
}
