//! Fraud Dashboard Library
//!
//! Scores payment transactions with a pre-trained classifier, either one at
//! a time from form input or by polling a spreadsheet, and explains and
//! announces the ones flagged as fraud.

pub mod alerting;
pub mod config;
pub mod detector;
pub mod error;
pub mod feature_aligner;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod producer;
pub mod report;
pub mod spreadsheet;
pub mod types;

#[cfg(test)]
mod testing;

pub use alerting::AlertDispatcher;
pub use config::AppConfig;
pub use detector::{Assessment, Detector};
pub use error::{MonitorError, SchemaError, ValidationError};
pub use feature_aligner::{FeatureAligner, FeatureVector};
pub use models::{Classifier, ModelBundle, OnnxClassifier};
pub use monitor::{Monitor, MonitorSession};
pub use producer::AlertProducer;
pub use types::{alert::FraudAlert, transaction::Transaction};
