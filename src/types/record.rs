//! Raw, untyped records as they come out of the form or a spreadsheet row

use std::fmt;

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Bool(bool),
    Empty,
}

impl Cell {
    /// Interpret a textual cell (e.g. from CSV) the way a dataframe reader would:
    /// blanks and NaN are empty, numerics become numbers, `true`/`false` become booleans.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            if value.is_nan() {
                return Cell::Empty;
            }
            return Cell::Number(value);
        }
        match trimmed {
            "true" | "True" | "TRUE" => Cell::Bool(true),
            "false" | "False" | "FALSE" => Cell::Bool(false),
            _ => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(v) => write!(f, "{v:.2}"),
            Cell::Text(s) => f.write_str(s),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Empty => f.write_str(""),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

/// Ordered column/cell pairs for one transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, Cell)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, cell: impl Into<Cell>) -> Self {
        self.insert(column, cell);
        self
    }

    /// Insert or replace a column.
    pub fn insert(&mut self, column: impl Into<String>, cell: impl Into<Cell>) {
        let column = column.into();
        let cell = cell.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = cell,
            None => self.fields.push((column, cell)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.fields.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for RawRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, cell)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {cell}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse(" 9000.5 "), Cell::Number(9000.5));
        assert_eq!(Cell::parse("CASH_OUT"), Cell::Text("CASH_OUT".to_string()));
        assert_eq!(Cell::parse(""), Cell::Empty);
        assert_eq!(Cell::parse("NaN"), Cell::Empty);
        assert_eq!(Cell::parse("True"), Cell::Bool(true));
    }

    #[test]
    fn test_insert_replaces_existing_column() {
        let mut record = RawRecord::new().with("amount", 10.0).with("type", "PAYMENT");
        record.insert("amount", 20.0);

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("amount"), Some(&Cell::Number(20.0)));
        assert_eq!(record.to_string(), "{amount: 20.00, type: PAYMENT}");
    }
}
