//! Spreadsheet loading for the monitoring loop.
//!
//! Workbooks (`xlsx`, `xlsm`, `xls`, `ods`) are read from their first sheet;
//! `csv` files are read directly. The first row is the header.

use crate::types::record::{Cell, RawRecord};
use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

/// Header plus every data row of one sheet
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    headers: Vec<String>,
    rows: Vec<RawRecord>,
}

impl Sheet {
    /// Build a sheet from a header and positional rows; short rows are padded with empty cells.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|cells| {
                let mut cells = cells.into_iter();
                let mut record = RawRecord::new();
                for header in &headers {
                    record.insert(header.clone(), cells.next().unwrap_or(Cell::Empty));
                }
                record
            })
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[RawRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The last `n` rows
    pub fn tail(&self, n: usize) -> &[RawRecord] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }
}

/// Read the whole spreadsheet from the start.
pub fn load_sheet(path: &Path) -> Result<Sheet> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => read_csv(path),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path),
        other => anyhow::bail!("Unsupported spreadsheet format `.{other}` for {}", path.display()),
    }
}

fn read_csv(path: &Path) -> Result<Sheet> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to parse CSV row {}", i + 1))?;
        rows.push(record.iter().map(Cell::parse).collect());
    }

    Ok(Sheet::from_rows(headers, rows))
}

fn read_workbook(path: &Path) -> Result<Sheet> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook {}", path.display()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow::anyhow!("Workbook {} has no sheets", path.display()))?
        .context("Failed to read first sheet")?;

    let mut row_iter = range.rows();
    let headers: Vec<String> = match row_iter.next() {
        Some(header) => header.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => return Ok(Sheet::default()),
    };

    let rows = row_iter
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect();

    Ok(Sheet::from_rows(headers, rows))
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) => Cell::parse(s),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
        Data::Empty => Cell::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("transactions.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_csv_rows_are_typed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "step,type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,oldbalanceDest,newbalanceDest\n\
             1,PAYMENT,9839.64,C1231006815,170136.0,160296.36,0.0,0.0\n\
             1,TRANSFER,181.0,C1305486145,181.0,0.0,0.0,\n",
        );

        let sheet = load_sheet(&path).unwrap();

        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.headers()[1], "type");
        let first = &sheet.rows()[0];
        assert_eq!(first.get("type"), Some(&Cell::Text("PAYMENT".to_string())));
        assert_eq!(first.get("amount"), Some(&Cell::Number(9839.64)));
        assert_eq!(sheet.rows()[1].get("newbalanceDest"), Some(&Cell::Empty));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "type,amount,oldbalanceOrg\nPAYMENT,10\n");

        let sheet = load_sheet(&path).unwrap();
        assert_eq!(sheet.rows()[0].get("oldbalanceOrg"), Some(&Cell::Empty));
    }

    #[test]
    fn test_tail_returns_last_rows() {
        let rows = (0..7).map(|i| vec![Cell::Number(i as f64)]).collect();
        let sheet = Sheet::from_rows(vec!["step".to_string()], rows);

        let tail: Vec<f64> = sheet
            .tail(5)
            .iter()
            .filter_map(|r| r.get("step").and_then(Cell::as_number))
            .collect();
        assert_eq!(tail, vec![2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(sheet.tail(50).len(), 7);
    }

    fn write_workbook(path: &Path, rows: &[Vec<&str>]) {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let date = rust_xlsxwriter::Format::new().set_num_format("yyyy-mm-dd");
        let worksheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                match (r, *value) {
                    (0, header) => worksheet.write_string(r, c, header),
                    (_, "@date") => worksheet.write_number_with_format(r, c, 45000.0, &date),
                    (_, v) => match v.parse::<f64>() {
                        Ok(n) => worksheet.write_number(r, c, n),
                        Err(_) => worksheet.write_string(r, c, v),
                    },
                }
                .unwrap();
            }
        }
        workbook.save(path).unwrap();
    }

    #[test]
    fn test_xlsx_rows_are_typed_and_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.xlsx");
        write_workbook(
            &path,
            &[
                vec![" type ", "amount", "oldbalanceOrg", "newbalanceOrig", "booked"],
                vec!["CASH_OUT", "9000", "9000", "0", "@date"],
                vec!["PAYMENT", "12.5"],
            ],
        );

        let sheet = load_sheet(&path).unwrap();

        assert_eq!(sheet.headers()[0], "type");
        assert_eq!(sheet.len(), 2);
        let first = &sheet.rows()[0];
        assert_eq!(first.get("type"), Some(&Cell::Text("CASH_OUT".to_string())));
        assert_eq!(first.get("amount"), Some(&Cell::Number(9000.0)));
        assert_eq!(first.get("newbalanceOrig"), Some(&Cell::Number(0.0)));
        // Dates come through as their serial number
        assert_eq!(first.get("booked"), Some(&Cell::Number(45000.0)));

        let short = &sheet.rows()[1];
        assert_eq!(short.get("amount"), Some(&Cell::Number(12.5)));
        assert_eq!(short.get("oldbalanceOrg"), Some(&Cell::Empty));
        assert_eq!(short.get("booked"), Some(&Cell::Empty));
    }

    #[test]
    fn test_empty_workbook_has_no_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");
        write_workbook(&path, &[]);

        let sheet = load_sheet(&path).unwrap();
        assert!(sheet.is_empty());
        assert!(sheet.headers().is_empty());
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_sheet(Path::new("transactions.json")).unwrap_err();
        assert!(err.to_string().contains("Unsupported spreadsheet format"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_sheet(&dir.path().join("absent.xlsx")).is_err());
        assert!(load_sheet(&dir.path().join("absent.csv")).is_err());
    }
}
