//! Counters and timing statistics for a monitoring run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the monitoring loop
pub struct MonitorMetrics {
    /// Rows classified
    rows_classified: AtomicU64,
    /// Rows labelled fraud
    fraud_flagged: AtomicU64,
    /// Rows whose categorical value the model never saw
    unseen_categories: AtomicU64,
    /// Alerts that reached at least one channel
    alerts_delivered: AtomicU64,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Fraud probability distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub rows_classified: u64,
    pub fraud_flagged: u64,
    pub unseen_categories: u64,
    pub alerts_delivered: u64,
    pub score_distribution: [u64; 10],
}

impl MonitorMetrics {
    pub fn new() -> Self {
        Self {
            rows_classified: AtomicU64::new(0),
            fraud_flagged: AtomicU64::new(0),
            unseen_categories: AtomicU64::new(0),
            alerts_delivered: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a classified row
    pub fn record_row(&self, processing_time: Duration, probability: f64) {
        self.rows_classified.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let bucket = (probability.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    pub fn record_fraud(&self) {
        self.fraud_flagged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unseen_category(&self) {
        self.unseen_categories.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert_delivered(&self) {
        self.alerts_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rows_classified: self.rows_classified.load(Ordering::Relaxed),
            fraud_flagged: self.fraud_flagged.load(Ordering::Relaxed),
            unseen_categories: self.unseen_categories.load(Ordering::Relaxed),
            alerts_delivered: self.alerts_delivered.load(Ordering::Relaxed),
            score_distribution: self.score_buckets.read().map(|b| *b).unwrap_or_default(),
        }
    }

    /// Get processing time statistics
    pub fn processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p99_us: sorted[((count as f64 * 0.99) as usize).min(count - 1)],
            max_us: sorted[count - 1],
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let fraud_rate = if snapshot.rows_classified > 0 {
            (snapshot.fraud_flagged as f64 / snapshot.rows_classified as f64) * 100.0
        } else {
            0.0
        };
        let processing = self.processing_stats();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              FRAUD MONITOR - RUN SUMMARY                     ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Rows Classified: {:>8}  │  Elapsed: {:>8.1}s              ║",
            snapshot.rows_classified,
            self.start_time.elapsed().as_secs_f64()
        );
        info!(
            "║ Fraud Flagged:   {:>8}  │  Fraud Rate: {:>6.1}%            ║",
            snapshot.fraud_flagged, fraud_rate
        );
        info!(
            "║ Unseen Types:    {:>8}  │  Alerts Delivered: {:>6}        ║",
            snapshot.unseen_categories, snapshot.alerts_delivered
        );
        info!(
            "║ Processing Time (μs): mean={:>6} p50={:>6} p99={:>6}         ║",
            processing.mean_us, processing.p50_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Fraud Probability Distribution:                              ║");
        let total: u64 = snapshot.score_distribution.iter().sum();
        for (i, &count) in snapshot.score_distribution.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}
