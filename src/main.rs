//! Fraud Dashboard - Main Entry Point
//!
//! `predict` checks one transaction entered on the command line;
//! `monitor` polls a spreadsheet and classifies its rows as they arrive.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use fraud_dashboard::{
    alerting::AlertDispatcher,
    config::{AppConfig, ConfigSource, LoggingConfig, DEFAULT_CONFIG_PATH},
    detector::Detector,
    feature_aligner::FeatureAligner,
    models::{Classifier, ModelBundle, OcclusionExplainer, OnnxClassifier},
    monitor::{Monitor, MonitorSession, MonitorSettings},
    report,
    types::TransactionForm,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "fraud-dashboard", version, about = "Fraud Detection System")]
struct Cli {
    /// Configuration file; defaults apply when it does not exist
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a single transaction
    Predict(PredictArgs),
    /// Poll a spreadsheet and classify its rows
    Monitor(MonitorArgs),
}

#[derive(Args)]
struct PredictArgs {
    /// CASH_IN, CASH_OUT, PAYMENT or TRANSFER
    #[arg(long = "type")]
    kind: Option<String>,
    #[arg(long)]
    amount: Option<f64>,
    #[arg(long = "old-balance-org")]
    old_balance_org: Option<f64>,
    #[arg(long = "new-balance-orig")]
    new_balance_orig: Option<f64>,
    #[arg(long = "old-balance-dest")]
    old_balance_dest: Option<f64>,
    #[arg(long = "new-balance-dest")]
    new_balance_dest: Option<f64>,
    /// Override detection.threshold
    #[arg(long)]
    threshold: Option<f64>,
}

#[derive(Args)]
struct MonitorArgs {
    /// Spreadsheet to monitor (.xlsx, .xls, .ods or .csv)
    file: PathBuf,
    /// Override monitor.poll_interval_secs
    #[arg(long)]
    interval_secs: Option<u64>,
    /// Re-announce every row on every pass
    #[arg(long)]
    reprocess_all: bool,
    /// Stop after this many passes
    #[arg(long)]
    max_passes: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let (mut config, source) = AppConfig::load_or_default(&cli.config)?;
    if let Command::Predict(PredictArgs {
        threshold: Some(threshold),
        ..
    }) = &cli.command
    {
        config.detection.threshold = *threshold;
    }
    config.validate()?;

    init_logging(&config.logging)?;
    info!("Starting Fraud Dashboard");
    match &source {
        ConfigSource::File(path) => info!(path = %path.display(), "Configuration loaded"),
        ConfigSource::Defaults(path) => {
            info!(path = %path.display(), "No configuration file, using defaults")
        }
    }
    info!(
        "Detection threshold: {:.2}, explanations: {}",
        config.detection.threshold, config.detection.explain
    );

    // The model is loaded once and passed down explicitly
    let bundle = ModelBundle::load(&config.model.bundle_path)?;
    let aligner = Arc::new(FeatureAligner::new(bundle.feature_names.clone()));
    let classifier: Arc<dyn Classifier> =
        Arc::new(OnnxClassifier::from_bundle(&bundle, config.model.onnx_threads)?);
    info!(
        "Classifier {} ready ({} features)",
        classifier.name(),
        aligner.feature_count()
    );

    let mut detector = Detector::new(classifier, &config.detection);
    if config.detection.explain {
        detector = detector.with_explainer(Arc::new(OcclusionExplainer::new()));
    }
    let detector = Arc::new(detector);
    let alerts = Arc::new(AlertDispatcher::from_config(&config.alerts).await?);

    match cli.command {
        Command::Predict(args) => predict(args, &aligner, &detector, &alerts).await,
        Command::Monitor(args) => monitor(args, &config, aligner, detector, alerts).await,
    }
}

async fn predict(
    args: PredictArgs,
    aligner: &FeatureAligner,
    detector: &Detector,
    alerts: &AlertDispatcher,
) -> Result<ExitCode> {
    let form = TransactionForm {
        kind: args.kind,
        amount: args.amount,
        old_balance_org: args.old_balance_org,
        new_balance_orig: args.new_balance_orig,
        old_balance_dest: args.old_balance_dest,
        new_balance_dest: args.new_balance_dest,
    };

    let transaction = match form.validate() {
        Ok(tx) => tx,
        Err(e) => {
            warn!(error = %e, "Rejected form input");
            eprintln!("⚠ {e}");
            return Ok(ExitCode::from(2));
        }
    };

    let features = aligner.align_transaction(&transaction)?;
    let assessment = detector.assess(&features)?;

    for line in report::render_assessment(&assessment) {
        println!("{line}");
    }

    if assessment.is_fraud() {
        let alert = assessment.to_alert("manual entry".to_string(), &features);
        alerts.dispatch(&alert).await;
    }

    Ok(ExitCode::SUCCESS)
}

async fn monitor(
    args: MonitorArgs,
    config: &AppConfig,
    aligner: Arc<FeatureAligner>,
    detector: Arc<Detector>,
    alerts: Arc<AlertDispatcher>,
) -> Result<ExitCode> {
    println!("{}\n", report::upload_requirements());

    let mut settings = MonitorSettings::from(&config.monitor);
    if let Some(secs) = args.interval_secs {
        settings.poll_interval = std::time::Duration::from_secs(secs);
    }
    settings.reprocess_all |= args.reprocess_all;
    settings.max_passes = args.max_passes;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let monitor = Monitor::new(aligner, detector, alerts, settings).with_events(events_tx);
    let mut session = MonitorSession::new(args.file);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping monitor");
            ctrl_c.cancel();
        }
    });

    println!("Real-time monitoring started...");
    let task = tokio::spawn(async move { monitor.run(&mut session, cancel).await });

    // The sender lives in the monitor, so this ends when the task finishes
    while let Some(event) = events_rx.recv().await {
        for line in report::render_event(&event) {
            println!("{line}");
        }
    }

    match task.await? {
        Ok(report) => {
            info!(
                reason = ?report.reason,
                passes = report.passes,
                rows = report.metrics.rows_classified,
                fraud = report.metrics.fraud_flagged,
                "Monitoring finished"
            );
            Ok(ExitCode::SUCCESS)
        }
        // The Failed event already printed the message
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(format!("fraud_dashboard={}", config.level))
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
