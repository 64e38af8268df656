//! Type definitions for the fraud dashboard

pub mod alert;
pub mod record;
pub mod transaction;

pub use alert::{FraudAlert, RiskLevel};
pub use record::{Cell, RawRecord};
pub use transaction::{Transaction, TransactionForm, TransactionType, REQUIRED_COLUMNS};
