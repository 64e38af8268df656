//! Local explanations for single predictions.
//!
//! The shipped explainer is occlusion based: every non-zero feature is reset
//! to a baseline, the row is re-scored, and the drop in fraud probability is
//! that feature's contribution. Contributions are ranked by magnitude.

use crate::feature_aligner::FeatureVector;
use crate::models::classifier::Classifier;
use anyhow::Result;
use serde::Serialize;

/// Number of contributions reported per explanation
pub const DEFAULT_EXPLAINED_FEATURES: usize = 5;

/// One feature's signed contribution to the fraud class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub feature: String,
    /// Feature value in the explained row
    pub value: f64,
    /// Positive pushes towards fraud
    pub weight: f64,
}

impl Contribution {
    /// Human readable sentence for the dashboard
    pub fn sentence(&self) -> String {
        let v = self.value;
        match self.feature.as_str() {
            "step" => format!("The transaction occurred very early (step = {v:.2}), which is unusual."),
            "amount" => format!("A high amount ({v:.2}) was transferred, which may be suspicious."),
            "oldbalanceOrg" => {
                format!("The sender's balance before transaction was {v:.2}, which raised suspicion.")
            }
            "newbalanceOrig" => {
                format!("After the transaction, the sender's new balance is {v:.2}, which is very low.")
            }
            "oldbalanceDest" => format!(
                "The recipient's account had a high initial balance ({v:.2}), which is common in fraud cases."
            ),
            other => format!("The feature {other} had a value of {v:.2}, influencing the decision."),
        }
    }

    /// Compact `name:+0.12` form used in alerts
    pub fn tag(&self) -> String {
        format!("{}:{:+.2}", self.feature, self.weight)
    }
}

/// Ranks the features behind one prediction.
pub trait Explainer: Send + Sync {
    fn explain(
        &self,
        classifier: &dyn Classifier,
        features: &FeatureVector,
        max_features: usize,
    ) -> Result<Vec<Contribution>>;
}

/// Perturbs one feature at a time towards a baseline value.
pub struct OcclusionExplainer {
    baseline: f64,
}

impl OcclusionExplainer {
    pub fn new() -> Self {
        Self { baseline: 0.0 }
    }
}

impl Default for OcclusionExplainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Explainer for OcclusionExplainer {
    fn explain(
        &self,
        classifier: &dyn Classifier,
        features: &FeatureVector,
        max_features: usize,
    ) -> Result<Vec<Contribution>> {
        let reference = classifier.predict_proba(features)?;

        let mut contributions = Vec::new();
        for (index, (name, value)) in features.iter().enumerate() {
            if value == self.baseline {
                continue;
            }
            let occluded = classifier.predict_proba(&features.with_value(index, self.baseline))?;
            let weight = reference - occluded;
            if weight != 0.0 {
                contributions.push(Contribution {
                    feature: name.to_string(),
                    value,
                    weight,
                });
            }
        }

        contributions.sort_by(|a, b| b.weight.abs().total_cmp(&a.weight.abs()));
        contributions.truncate(max_features);
        Ok(contributions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{paysim_aligner, record, ScriptedClassifier};

    #[test]
    fn test_sentences_for_known_and_unknown_features() {
        let c = |feature: &str, value: f64| Contribution {
            feature: feature.to_string(),
            value,
            weight: 0.1,
        };

        assert_eq!(
            c("amount", 9000.0).sentence(),
            "A high amount (9000.00) was transferred, which may be suspicious."
        );
        assert_eq!(
            c("step", 1.0).sentence(),
            "The transaction occurred very early (step = 1.00), which is unusual."
        );
        assert_eq!(
            c("newbalanceOrig", 0.0).sentence(),
            "After the transaction, the sender's new balance is 0.00, which is very low."
        );
        assert_eq!(
            c("type_TRANSFER", 1.0).sentence(),
            "The feature type_TRANSFER had a value of 1.00, influencing the decision."
        );
    }

    #[test]
    fn test_occlusion_ranks_by_magnitude() {
        // amount adds 0.6, a TRANSFER adds 0.2, a drained sender subtracts 0.05
        let classifier = ScriptedClassifier::new(|f| {
            let mut p = 0.1;
            if f.get("amount").unwrap_or(0.0) > 1000.0 {
                p += 0.6;
            }
            if f.get("type_TRANSFER") == Some(1.0) {
                p += 0.2;
            }
            if f.get("oldbalanceOrg").unwrap_or(0.0) > 0.0 {
                p -= 0.05;
            }
            p
        });
        let features = paysim_aligner()
            .align(&record("TRANSFER", 5000.0))
            .unwrap();

        let contributions = OcclusionExplainer::new()
            .explain(&classifier, &features, 5)
            .unwrap();

        let names: Vec<&str> = contributions.iter().map(|c| c.feature.as_str()).collect();
        assert_eq!(names, vec!["amount", "type_TRANSFER", "oldbalanceOrg"]);
        assert!((contributions[0].weight - 0.6).abs() < 1e-9);
        assert!((contributions[2].weight + 0.05).abs() < 1e-9);
        assert_eq!(contributions[0].value, 5000.0);
    }

    #[test]
    fn test_explanation_is_capped() {
        let classifier = ScriptedClassifier::new(|f| f.values().iter().sum::<f64>() / 1e6);
        let features = paysim_aligner()
            .align(&record("CASH_OUT", 100.0).with("step", 3.0))
            .unwrap();

        let contributions = OcclusionExplainer::new()
            .explain(&classifier, &features, 2)
            .unwrap();

        assert_eq!(contributions.len(), 2);
    }

    #[test]
    fn test_tag_format() {
        let c = Contribution {
            feature: "amount".to_string(),
            value: 10.0,
            weight: 0.314,
        };
        assert_eq!(c.tag(), "amount:+0.31");
    }
}
