//! Plain-text rendering of verdicts and monitor progress for the terminal

use crate::detector::Assessment;
use crate::monitor::MonitorEvent;
use crate::types::record::RawRecord;
use crate::types::transaction::REQUIRED_COLUMNS;

pub const FRAUD_BANNER: &str = "FRAUDULENT TRANSACTION DETECTED!";
pub const LEGITIMATE_BANNER: &str = "Transaction is Legitimate.";

/// Shown before monitoring starts
pub fn upload_requirements() -> String {
    let mut out = String::from(
        "File Upload Requirements\n\
         The spreadsheet must contain the following columns:\n",
    );
    for (column, meaning) in REQUIRED_COLUMNS.iter().zip([
        "Transaction Type: CASH_IN, CASH_OUT, PAYMENT, TRANSFER",
        "Transaction Amount",
        "Old Balance of Sender",
        "New Balance of Sender",
        "Old Balance of Receiver",
        "New Balance of Receiver",
    ]) {
        out.push_str(&format!("  - {column} ({meaning})\n"));
    }
    out.push_str("Files missing any of these columns are rejected.");
    out
}

/// Full verdict for one transaction, explanation included
pub fn render_assessment(assessment: &Assessment) -> Vec<String> {
    let mut lines = vec![format!(
        "Risk Score (Probability of Fraud): {:.2}",
        assessment.probability
    )];

    for unseen in &assessment.unseen_categories {
        lines.push(format!(
            "Note: {} `{}` was not seen during training; every {} indicator was set to 0.",
            unseen.column, unseen.value, unseen.column
        ));
    }

    if !assessment.is_fraud() {
        lines.push(LEGITIMATE_BANNER.to_string());
        return lines;
    }

    lines.push(FRAUD_BANNER.to_string());
    let explanation = assessment.explanation();
    if explanation.is_empty() {
        lines.push("No significant factors reduced fraud probability.".to_string());
    } else {
        lines.push("This transaction was flagged as fraudulent because:".to_string());
        lines.extend(explanation.into_iter().map(|s| format!("  - {s}")));
    }
    lines
}

/// Aligned table of records, header taken from the first row
pub fn render_table(rows: &[RawRecord]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };
    let columns: Vec<&str> = first.fields().map(|(name, _)| name).collect();

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| r.get(c).map(ToString::to_string).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|row| row[i].len())
                .chain(std::iter::once(c.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: Vec<&str>| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{v:>w$}", w = *w))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut out = vec![line(columns.clone())];
    out.extend(cells.iter().map(|row| line(row.iter().map(String::as_str).collect())));
    out.join("\n")
}

/// Terminal lines for one monitor event
pub fn render_event(event: &MonitorEvent) -> Vec<String> {
    match event {
        MonitorEvent::Started { path } => {
            vec![format!("Monitoring {} ...", path.display())]
        }
        MonitorEvent::LatestRows { rows, total } => vec![
            format!("Latest Transactions Being Monitored ({} of {}):", rows.len(), total),
            render_table(rows),
        ],
        MonitorEvent::Processing { row, record } => {
            vec![format!("Processing Transaction {row}: {record}")]
        }
        MonitorEvent::Verdict { row, assessment } => {
            let mut lines = vec![format!("Transaction {row}:")];
            lines.extend(render_assessment(assessment));
            lines
        }
        MonitorEvent::Stopped(report) => vec![format!(
            "Monitoring stopped after {} pass(es): {} rows classified, {} flagged as fraud.",
            report.passes, report.metrics.rows_classified, report.metrics.fraud_flagged
        )],
        MonitorEvent::Failed(message) => vec![format!("Error occurred: {message}")],
    }
}
