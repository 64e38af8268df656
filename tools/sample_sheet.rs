//! Sample Spreadsheet Writer
//!
//! Appends PaySim-style transactions to a CSV file so the monitor has
//! something to watch. With a delay, rows trickle in one at a time.
//!
//! Usage: sample-sheet [PATH] [COUNT] [FRAUD_RATE] [DELAY_MS]

use rand::Rng;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Row layout of the PaySim export the dashboard reads
#[derive(Debug, Clone, Serialize)]
struct SheetRow {
    step: u32,
    #[serde(rename = "type")]
    kind: &'static str,
    amount: f64,
    #[serde(rename = "nameOrig")]
    name_orig: String,
    #[serde(rename = "oldbalanceOrg")]
    old_balance_org: f64,
    #[serde(rename = "newbalanceOrig")]
    new_balance_orig: f64,
    #[serde(rename = "nameDest")]
    name_dest: String,
    #[serde(rename = "oldbalanceDest")]
    old_balance_dest: f64,
    #[serde(rename = "newbalanceDest")]
    new_balance_dest: f64,
}

struct RowGenerator {
    rng: rand::rngs::ThreadRng,
    step: u32,
}

impl RowGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            step: 1,
        }
    }

    /// Ordinary payment or deposit with consistent balances
    fn generate_legitimate(&mut self) -> SheetRow {
        self.advance();
        let kind = self.random_choice(&["PAYMENT", "CASH_IN", "DEBIT", "CASH_OUT", "TRANSFER"]);
        let amount = round2(self.rng.gen_range(10.0..5_000.0));
        let old_balance_org = round2(amount + self.rng.gen_range(0.0..50_000.0));
        let old_balance_dest = round2(self.rng.gen_range(0.0..100_000.0));

        let (new_balance_orig, new_balance_dest) = if kind == "CASH_IN" {
            (old_balance_org + amount, (old_balance_dest - amount).max(0.0))
        } else {
            (old_balance_org - amount, old_balance_dest + amount)
        };

        SheetRow {
            step: self.step,
            kind,
            amount,
            name_orig: format!("C{}", self.rng.gen_range(100_000_000u64..999_999_999)),
            old_balance_org,
            new_balance_orig: round2(new_balance_orig),
            name_dest: self.destination(kind),
            old_balance_dest,
            new_balance_dest: round2(new_balance_dest),
        }
    }

    /// Account drained by a transfer or cash-out into an empty account
    fn generate_suspicious(&mut self) -> SheetRow {
        self.advance();
        let kind = self.random_choice(&["TRANSFER", "CASH_OUT"]);
        let amount = round2(self.rng.gen_range(100_000.0..2_000_000.0));

        SheetRow {
            step: self.step,
            kind,
            amount,
            name_orig: format!("C{}", self.rng.gen_range(100_000_000u64..999_999_999)),
            old_balance_org: amount,
            new_balance_orig: 0.0,
            name_dest: self.destination(kind),
            old_balance_dest: 0.0,
            new_balance_dest: 0.0,
        }
    }

    fn advance(&mut self) {
        if self.rng.gen_bool(0.2) {
            self.step += 1;
        }
    }

    fn destination(&mut self, kind: &str) -> String {
        let prefix = if kind == "PAYMENT" { 'M' } else { 'C' };
        format!("{prefix}{}", self.rng.gen_range(100_000_000u64..999_999_999))
    }

    fn random_choice(&mut self, choices: &[&'static str]) -> &'static str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_sheet=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let path = args.get(1).map(|s| s.as_str()).unwrap_or("transactions.csv");
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(20);
    let fraud_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0);

    info!(
        path = %path,
        count = count,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let mut write_header = !Path::new(path).exists();
    let mut generator = RowGenerator::new();
    let mut rng = rand::thread_rng();

    let mut legitimate_count = 0;
    let mut suspicious_count = 0;

    for i in 0..count {
        let row = if rng.gen_bool(fraud_rate) {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            legitimate_count += 1;
            generator.generate_legitimate()
        };

        // Reopen per row so a watching monitor sees each append
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(&row)?;
        writer.flush()?;
        write_header = false;

        if (i + 1) % 10 == 0 {
            info!(
                "Wrote {}/{} rows ({} legitimate, {} suspicious)",
                i + 1,
                count,
                legitimate_count,
                suspicious_count
            );
        }

        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    info!(
        "Completed! Wrote {} rows to {} ({} legitimate, {} suspicious)",
        count, path, legitimate_count, suspicious_count
    );

    Ok(())
}
