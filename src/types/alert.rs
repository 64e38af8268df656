//! Fraud alert data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Determine risk level from a fraud probability and thresholds
    pub fn from_score(score: f64, thresholds: &RiskLevelThresholds) -> Self {
        if score >= thresholds.critical {
            RiskLevel::Critical
        } else if score >= thresholds.high {
            RiskLevel::High
        } else if score >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Configurable risk level thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLevelThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 0.5,
            high: 0.7,
            critical: 0.9,
        }
    }
}

/// Alert raised when a transaction is labelled fraudulent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAlert {
    /// Unique alert identifier
    pub alert_id: String,

    /// Where the transaction came from, e.g. `manual entry` or `sheet.xlsx row 4`
    pub source: String,

    /// Transaction kind as entered
    pub transaction_type: String,

    pub amount: f64,

    /// Fraud probability reported by the classifier (0.0 - 1.0)
    pub fraud_probability: f64,

    pub risk_level: RiskLevel,

    /// Features that contributed most to the decision, as `name:weight`
    pub triggered_features: Vec<String>,

    /// Alert generation timestamp
    pub timestamp: DateTime<Utc>,
}

impl FraudAlert {
    /// Create a new fraud alert
    pub fn new(source: String, fraud_probability: f64, risk_level: RiskLevel) -> Self {
        Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            source,
            transaction_type: String::new(),
            amount: 0.0,
            fraud_probability,
            risk_level,
            triggered_features: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Add transaction details to the alert
    pub fn with_transaction_details(mut self, transaction_type: String, amount: f64) -> Self {
        self.transaction_type = transaction_type;
        self.amount = amount;
        self
    }

    /// Add triggered features to the alert
    pub fn with_triggered_features(mut self, features: Vec<String>) -> Self {
        self.triggered_features = features;
        self
    }
}
