//! Spreadsheet monitoring loop.
//!
//! Each pass re-reads the spreadsheet from the start, checks the header,
//! previews the latest rows and classifies the rows not processed yet,
//! pausing one poll interval after every row. The session cursor makes
//! repeat passes skip rows already announced unless `reprocess_all` is set.
//! The loop ends on cancellation, after `max_passes`, or on the first error.

use crate::alerting::AlertDispatcher;
use crate::config::MonitorConfig;
use crate::detector::{Assessment, Detector};
use crate::error::{MonitorError, SchemaError};
use crate::feature_aligner::FeatureAligner;
use crate::metrics::{MetricsSnapshot, MonitorMetrics};
use crate::spreadsheet::{load_sheet, Sheet};
use crate::types::record::RawRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Caller-owned state for one monitored spreadsheet
#[derive(Debug, Clone)]
pub struct MonitorSession {
    path: PathBuf,
    /// Rows already processed
    cursor: usize,
    passes: u64,
}

impl MonitorSession {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cursor: 0,
            passes: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }
}

/// Loop tuning
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub preview_rows: usize,
    pub reprocess_all: bool,
    /// Stop after this many passes in one run; unbounded when unset
    pub max_passes: Option<u64>,
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            preview_rows: config.preview_rows,
            reprocess_all: config.reprocess_all,
            max_passes: None,
        }
    }
}

/// Progress reported to the presenter
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Started { path: PathBuf },
    /// The newest rows of the sheet at the start of a pass that has work to do
    LatestRows { rows: Vec<RawRecord>, total: usize },
    /// A row is about to be classified; `row` is 1-based
    Processing { row: usize, record: RawRecord },
    Verdict { row: usize, assessment: Assessment },
    Stopped(MonitorReport),
    /// The run aborted; carries the user-facing message
    Failed(String),
}

/// Why a run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    PassLimit,
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct MonitorReport {
    pub reason: StopReason,
    pub passes: u64,
    pub metrics: MetricsSnapshot,
}

/// Polls a spreadsheet and classifies its rows
pub struct Monitor {
    aligner: Arc<FeatureAligner>,
    detector: Arc<Detector>,
    alerts: Arc<AlertDispatcher>,
    settings: MonitorSettings,
    metrics: Arc<MonitorMetrics>,
    events: Option<UnboundedSender<MonitorEvent>>,
}

impl Monitor {
    pub fn new(
        aligner: Arc<FeatureAligner>,
        detector: Arc<Detector>,
        alerts: Arc<AlertDispatcher>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            aligner,
            detector,
            alerts,
            settings,
            metrics: Arc::new(MonitorMetrics::new()),
            events: None,
        }
    }

    /// Send progress events to a presenter
    pub fn with_events(mut self, events: UnboundedSender<MonitorEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn metrics(&self) -> Arc<MonitorMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until cancelled, the pass limit is reached, or an error occurs.
    pub async fn run(
        &self,
        session: &mut MonitorSession,
        cancel: CancellationToken,
    ) -> Result<MonitorReport, MonitorError> {
        info!(
            path = %session.path.display(),
            poll_interval_secs = self.settings.poll_interval.as_secs_f64(),
            reprocess_all = self.settings.reprocess_all,
            "Monitoring started"
        );

        self.emit(MonitorEvent::Started {
            path: session.path.clone(),
        });

        let result = self.poll(session, &cancel).await;
        self.metrics.print_summary();

        match result {
            Ok(reason) => {
                info!(reason = ?reason, passes = session.passes, "Monitoring stopped");
                let report = MonitorReport {
                    reason,
                    passes: session.passes,
                    metrics: self.metrics.snapshot(),
                };
                self.emit(MonitorEvent::Stopped(report.clone()));
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Monitoring aborted");
                self.emit(MonitorEvent::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn poll(
        &self,
        session: &mut MonitorSession,
        cancel: &CancellationToken,
    ) -> Result<StopReason, MonitorError> {
        let mut passes_this_run = 0;

        loop {
            if cancel.is_cancelled() {
                return Ok(StopReason::Cancelled);
            }
            if self.settings.max_passes.is_some_and(|max| passes_this_run >= max) {
                return Ok(StopReason::PassLimit);
            }

            let sheet = self.read_sheet(&session.path).await?;

            let missing = FeatureAligner::missing_columns(sheet.headers());
            if !missing.is_empty() {
                return Err(SchemaError::MissingColumns(missing).into());
            }

            passes_this_run += 1;
            session.passes += 1;

            if sheet.len() < session.cursor {
                warn!(
                    rows = sheet.len(),
                    cursor = session.cursor,
                    "Spreadsheet shrank since the last pass, starting over"
                );
                session.cursor = 0;
            }
            let start = if self.settings.reprocess_all { 0 } else { session.cursor };

            if start >= sheet.len() {
                if sheet.is_empty() {
                    debug!("Spreadsheet has no data rows yet");
                } else {
                    debug!(rows = sheet.len(), "No new rows");
                }
                if !self.pause(cancel).await {
                    return Ok(StopReason::Cancelled);
                }
                continue;
            }

            self.emit(MonitorEvent::LatestRows {
                rows: sheet.tail(self.settings.preview_rows).to_vec(),
                total: sheet.len(),
            });

            for (index, record) in sheet.rows().iter().enumerate().skip(start) {
                let row = index + 1;
                self.emit(MonitorEvent::Processing {
                    row,
                    record: record.clone(),
                });

                let assessment = self.process_row(session.path(), row, record).await?;
                session.cursor = session.cursor.max(row);
                self.emit(MonitorEvent::Verdict { row, assessment });

                if !self.pause(cancel).await {
                    return Ok(StopReason::Cancelled);
                }
            }
        }
    }

    async fn process_row(
        &self,
        path: &Path,
        row: usize,
        record: &RawRecord,
    ) -> Result<Assessment, MonitorError> {
        let started = Instant::now();

        let features = self.aligner.align(record)?;

        // Scoring plus the explainer's re-runs is CPU bound
        let detector = Arc::clone(&self.detector);
        let (assessment, features) = tokio::task::spawn_blocking(move || {
            detector.assess(&features).map(|assessment| (assessment, features))
        })
        .await
        .map_err(|e| MonitorError::Classification {
            row,
            source: anyhow::Error::new(e).context("Scoring task failed"),
        })?
        .map_err(|source| MonitorError::Classification { row, source })?;

        self.metrics.record_row(started.elapsed(), assessment.probability);
        if !assessment.unseen_categories.is_empty() {
            self.metrics.record_unseen_category();
        }

        if assessment.is_fraud() {
            self.metrics.record_fraud();
            let source = format!("{} row {}", path.display(), row);
            let alert = assessment.to_alert(source, &features);
            info!(
                row = row,
                fraud_probability = assessment.probability,
                risk_level = assessment.risk_level.as_str(),
                "Fraudulent transaction detected"
            );
            if self.alerts.dispatch(&alert).await > 0 {
                self.metrics.record_alert_delivered();
            }
        } else {
            debug!(
                row = row,
                fraud_probability = assessment.probability,
                "Transaction is legitimate"
            );
        }

        Ok(assessment)
    }

    /// Parse the whole file on the blocking pool
    async fn read_sheet(&self, path: &Path) -> Result<Sheet, MonitorError> {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || load_sheet(&owned))
            .await
            .map_err(|e| anyhow::Error::new(e).context("Spreadsheet reader task failed"))
            .and_then(|result| result)
            .map_err(|source| MonitorError::Read {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Sleep one poll interval; false when cancelled first
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.settings.poll_interval) => true,
        }
    }

    fn emit(&self, event: MonitorEvent) {
        if let Some(events) = &self.events {
            // A closed receiver only means nobody is watching
            let _ = events.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionConfig;
    use crate::testing::{paysim_aligner, ScriptedClassifier};
    use crate::types::record::Cell;
    use std::io::Write;
    use tokio::sync::mpsc;

    const HEADER: &str = "step,type,amount,oldbalanceOrg,newbalanceOrig,oldbalanceDest,newbalanceDest";

    fn row(step: usize, amount: f64) -> String {
        format!("{step},TRANSFER,{amount},{amount},0.0,0.0,{amount}")
    }

    fn write_sheet(path: &Path, header: &str, rows: &[String]) {
        let mut file = std::fs::File::create(path).unwrap();
        writeln!(file, "{header}").unwrap();
        for r in rows {
            writeln!(file, "{r}").unwrap();
        }
    }

    fn append_rows(path: &Path, rows: &[String]) {
        let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        for r in rows {
            writeln!(file, "{r}").unwrap();
        }
    }

    fn settings(max_passes: Option<u64>, reprocess_all: bool) -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_secs(5),
            preview_rows: 5,
            reprocess_all,
            max_passes,
        }
    }

    fn monitor(settings: MonitorSettings) -> (Monitor, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let detector = Detector::new(
            Arc::new(ScriptedClassifier::amount_above(1000.0)),
            &DetectionConfig::default(),
        );
        let monitor = Monitor::new(
            Arc::new(paysim_aligner()),
            Arc::new(detector),
            Arc::new(AlertDispatcher::disabled()),
            settings,
        )
        .with_events(tx);
        (monitor, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<MonitorEvent>) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn verdict_rows(events: &[MonitorEvent]) -> Vec<usize> {
        events
            .iter()
            .filter_map(|e| match e {
                MonitorEvent::Verdict { row, .. } => Some(*row),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_seven_rows_preview_five_and_classify_all_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        let rows: Vec<String> = (1..=7).map(|i| row(i, i as f64 * 500.0)).collect();
        write_sheet(&path, HEADER, &rows);

        let (monitor, mut rx) = monitor(settings(Some(1), false));
        let mut session = MonitorSession::new(&path);

        let started = tokio::time::Instant::now();
        let report = monitor.run(&mut session, CancellationToken::new()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.reason, StopReason::PassLimit);
        assert_eq!(report.metrics.rows_classified, 7);
        // 1500.0 and up are above the scripted limit
        assert_eq!(report.metrics.fraud_flagged, 5);
        assert_eq!(elapsed, Duration::from_secs(35));
        assert_eq!(session.cursor(), 7);

        let events = drain(&mut rx);
        assert!(matches!(&events[0], MonitorEvent::Started { .. }));
        assert!(matches!(events.last(), Some(MonitorEvent::Stopped(_))));
        match &events[1] {
            MonitorEvent::LatestRows { rows, total } => {
                assert_eq!(*total, 7);
                let steps: Vec<f64> = rows
                    .iter()
                    .filter_map(|r| r.get("step").and_then(Cell::as_number))
                    .collect();
                assert_eq!(steps, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
            }
            other => panic!("expected preview first, got {other:?}"),
        }
        assert_eq!(verdict_rows(&events), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_column_fails_before_any_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        write_sheet(
            &path,
            "step,type,amount,oldbalanceOrg,newbalanceOrig,oldbalanceDest",
            &["1,TRANSFER,10.0,10.0,0.0,0.0".to_string()],
        );

        let (monitor, mut rx) = monitor(settings(None, false));
        let mut session = MonitorSession::new(&path);

        let err = monitor.run(&mut session, CancellationToken::new()).await.unwrap_err();

        assert!(matches!(
            &err,
            MonitorError::Schema(SchemaError::MissingColumns(cols)) if cols == &vec!["newbalanceDest".to_string()]
        ));
        assert_eq!(err.to_string(), "Missing required columns: newbalanceDest");
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], MonitorEvent::Started { .. }));
        assert!(
            matches!(&events[1], MonitorEvent::Failed(message) if message == "Missing required columns: newbalanceDest")
        );
        assert_eq!(monitor.metrics().snapshot().rows_classified, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_file_is_not_reprocessed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        let rows: Vec<String> = (1..=3).map(|i| row(i, 2000.0)).collect();
        write_sheet(&path, HEADER, &rows);

        let (monitor, mut rx) = monitor(settings(Some(3), false));
        let mut session = MonitorSession::new(&path);
        let report = monitor.run(&mut session, CancellationToken::new()).await.unwrap();

        assert_eq!(report.passes, 3);
        assert_eq!(report.metrics.rows_classified, 3);
        assert_eq!(verdict_rows(&drain(&mut rx)), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reprocess_all_replays_every_pass() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        let rows: Vec<String> = (1..=3).map(|i| row(i, 2000.0)).collect();
        write_sheet(&path, HEADER, &rows);

        let (monitor, mut rx) = monitor(settings(Some(2), true));
        let mut session = MonitorSession::new(&path);
        let report = monitor.run(&mut session, CancellationToken::new()).await.unwrap();

        assert_eq!(report.metrics.rows_classified, 6);
        assert_eq!(report.metrics.fraud_flagged, 6);
        assert_eq!(verdict_rows(&drain(&mut rx)), vec![1, 2, 3, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_appended_rows_are_picked_up_by_the_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        write_sheet(&path, HEADER, &[row(1, 10.0), row(2, 20.0)]);

        let (monitor, mut rx) = monitor(settings(Some(1), false));
        let mut session = MonitorSession::new(&path);
        monitor.run(&mut session, CancellationToken::new()).await.unwrap();
        assert_eq!(verdict_rows(&drain(&mut rx)), vec![1, 2]);

        append_rows(&path, &[row(3, 30.0), row(4, 40.0)]);
        monitor.run(&mut session, CancellationToken::new()).await.unwrap();

        assert_eq!(verdict_rows(&drain(&mut rx)), vec![3, 4]);
        assert_eq!(session.cursor(), 4);
        assert_eq!(session.passes(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shrunk_file_resets_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        write_sheet(&path, HEADER, &[row(1, 10.0), row(2, 20.0), row(3, 30.0)]);

        let (monitor, mut rx) = monitor(settings(Some(1), false));
        let mut session = MonitorSession::new(&path);
        monitor.run(&mut session, CancellationToken::new()).await.unwrap();
        drain(&mut rx);

        write_sheet(&path, HEADER, &[row(1, 5000.0)]);
        monitor.run(&mut session, CancellationToken::new()).await.unwrap();

        assert_eq!(verdict_rows(&drain(&mut rx)), vec![1]);
        assert_eq!(session.cursor(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_the_pause() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        write_sheet(&path, HEADER, &[row(1, 10.0), row(2, 20.0), row(3, 30.0)]);

        let (monitor, mut rx) = monitor(MonitorSettings {
            poll_interval: Duration::from_secs(60),
            ..settings(None, false)
        });
        let mut session = MonitorSession::new(&path);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            trigger.cancel();
        });

        let report = monitor.run(&mut session, cancel).await.unwrap();

        assert_eq!(report.reason, StopReason::Cancelled);
        assert_eq!(report.metrics.rows_classified, 1);
        assert_eq!(verdict_rows(&drain(&mut rx)), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_file_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let (monitor, _rx) = monitor(settings(None, false));
        let mut session = MonitorSession::new(dir.path().join("absent.xlsx"));

        let err = monitor.run(&mut session, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, MonitorError::Read { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_row_with_empty_required_cell_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        write_sheet(
            &path,
            HEADER,
            &[row(1, 10.0), "2,TRANSFER,,10.0,0.0,0.0,10.0".to_string()],
        );

        let (monitor, mut rx) = monitor(settings(None, false));
        let mut session = MonitorSession::new(&path);

        let err = monitor.run(&mut session, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, MonitorError::Schema(SchemaError::MissingFields(_))));
        assert_eq!(verdict_rows(&drain(&mut rx)), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unseen_type_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.csv");
        write_sheet(&path, HEADER, &["1,REVERSAL,10.0,10.0,0.0,0.0,10.0".to_string()]);

        let (monitor, _rx) = monitor(settings(Some(1), false));
        let mut session = MonitorSession::new(&path);
        let report = monitor.run(&mut session, CancellationToken::new()).await.unwrap();

        assert_eq!(report.metrics.unseen_categories, 1);
    }
}
