//! Error types surfaced to the dashboard user.

use std::path::PathBuf;
use thiserror::Error;

/// A record or spreadsheet does not carry the columns the aligner needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// Input problems the user has to correct before a prediction can run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Please select a transaction type!")]
    MissingTransactionType,

    #[error("Please fill in all the required fields! (missing: {})", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Unknown transaction type `{0}` (expected one of CASH_IN, CASH_OUT, PAYMENT, TRANSFER)")]
    UnknownTransactionType(String),

    #[error("{field} must be at least {minimum:.2}, got {value}")]
    OutOfRange {
        field: &'static str,
        minimum: f64,
        value: f64,
    },
}

/// Failures that abort the monitoring loop.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Failed to read spreadsheet {}: {source:#}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Classification failed for row {row}: {source:#}")]
    Classification {
        row: usize,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message_names_each_column() {
        let err = SchemaError::MissingColumns(vec!["newbalanceDest".to_string()]);
        assert_eq!(err.to_string(), "Missing required columns: newbalanceDest");

        let err = SchemaError::MissingColumns(vec!["amount".to_string(), "type".to_string()]);
        assert_eq!(err.to_string(), "Missing required columns: amount, type");
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::MissingTransactionType.to_string(),
            "Please select a transaction type!"
        );
        let err = ValidationError::OutOfRange {
            field: "amount",
            minimum: 0.01,
            value: 0.0,
        };
        assert_eq!(err.to_string(), "amount must be at least 0.01, got 0");
    }
}
