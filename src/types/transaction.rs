//! Transaction data structures for mobile-money fraud detection

use crate::error::ValidationError;
use crate::types::record::RawRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw columns every transaction record must carry, in display order.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "type",
    "amount",
    "oldbalanceOrg",
    "newbalanceOrig",
    "oldbalanceDest",
    "newbalanceDest",
];

/// Smallest amount the form accepts.
pub const MIN_AMOUNT: f64 = 0.01;

/// Transaction kinds the model was trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    CashIn,
    CashOut,
    Payment,
    Transfer,
}

impl TransactionType {
    pub const ALL: [TransactionType; 4] = [
        TransactionType::CashIn,
        TransactionType::CashOut,
        TransactionType::Payment,
        TransactionType::Transfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::CashIn => "CASH_IN",
            TransactionType::CashOut => "CASH_OUT",
            TransactionType::Payment => "PAYMENT",
            TransactionType::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        TransactionType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownTransactionType(s.to_string()))
    }
}

/// A validated transaction as entered through the form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,

    pub amount: f64,

    /// Sender balance before the transaction
    #[serde(rename = "oldbalanceOrg")]
    pub old_balance_org: f64,

    /// Sender balance after the transaction
    #[serde(rename = "newbalanceOrig")]
    pub new_balance_orig: f64,

    /// Recipient balance before the transaction
    #[serde(rename = "oldbalanceDest")]
    pub old_balance_dest: f64,

    /// Recipient balance after the transaction
    #[serde(rename = "newbalanceDest")]
    pub new_balance_dest: f64,
}

impl Transaction {
    pub fn new(
        kind: TransactionType,
        amount: f64,
        old_balance_org: f64,
        new_balance_orig: f64,
        old_balance_dest: f64,
        new_balance_dest: f64,
    ) -> Self {
        Self {
            kind,
            amount,
            old_balance_org,
            new_balance_orig,
            old_balance_dest,
            new_balance_dest,
        }
    }

    /// Record with the raw column names, ready for feature alignment.
    pub fn to_record(&self) -> RawRecord {
        RawRecord::new()
            .with("type", self.kind.as_str())
            .with("amount", self.amount)
            .with("oldbalanceOrg", self.old_balance_org)
            .with("newbalanceOrig", self.new_balance_orig)
            .with("oldbalanceDest", self.old_balance_dest)
            .with("newbalanceDest", self.new_balance_dest)
    }
}

/// Unvalidated form input; every field may still be unset.
#[derive(Debug, Clone, Default)]
pub struct TransactionForm {
    pub kind: Option<String>,
    pub amount: Option<f64>,
    pub old_balance_org: Option<f64>,
    pub new_balance_orig: Option<f64>,
    pub old_balance_dest: Option<f64>,
    pub new_balance_dest: Option<f64>,
}

impl TransactionForm {
    /// Validate the form in the order the user sees the warnings:
    /// type first, then missing fields, then value ranges.
    pub fn validate(&self) -> Result<Transaction, ValidationError> {
        let kind = self
            .kind
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ValidationError::MissingTransactionType)?;

        let fields = [
            ("amount", self.amount),
            ("oldbalanceOrg", self.old_balance_org),
            ("newbalanceOrig", self.new_balance_orig),
            ("oldbalanceDest", self.old_balance_dest),
            ("newbalanceDest", self.new_balance_dest),
        ];
        let missing: Vec<&'static str> = fields
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let kind: TransactionType = kind.parse()?;

        let mut values = [0.0; 5];
        for (slot, (name, value)) in values.iter_mut().zip(fields) {
            let value = value.unwrap_or_default();
            let minimum = if name == "amount" { MIN_AMOUNT } else { 0.0 };
            if !value.is_finite() || value < minimum {
                return Err(ValidationError::OutOfRange {
                    field: name,
                    minimum,
                    value,
                });
            }
            *slot = value;
        }

        let [amount, old_org, new_orig, old_dest, new_dest] = values;
        Ok(Transaction::new(
            kind, amount, old_org, new_orig, old_dest, new_dest,
        ))
    }
}
