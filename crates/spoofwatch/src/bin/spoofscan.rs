use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::Parser;
use serde::Deserialize;
use spoofwatch::config::{self, Config};
use spoofwatch::detect::{Alert, Detector};
use spoofwatch::eval::precision_recall_f1;
use spoofwatch::method::build_methods;
use spoofwatch::source::{LogSource, PcapSource};

/// Scan recorded captures for GNSS spoofing
///
/// Replays a pcap file or a sentence log through the configured detection
/// methods and prints one line per alert. With --dataset the input is a JSON
/// index of labelled captures and the output is precision/recall/F1.
#[derive(Debug, Parser)]
#[clap(version, verbatim_doc_comment)]
struct Args {
    #[clap(short, long, default_value_t = tracing::Level::INFO)]
    log_level: tracing::Level,

    /// Path to the detector configuration (JSON)
    #[clap(short, long)]
    config: PathBuf,

    /// The capture to scan, or the dataset index with --dataset
    input: PathBuf,

    /// Input capture format
    #[clap(short, long, value_enum, default_value = "auto")]
    format: Format,

    /// Alert when a method's indicator exceeds this value
    #[clap(short, long, default_value_t = 0.1)]
    threshold: f64,

    /// Treat the input as a JSON array of {"filename", "label"} entries and
    /// score the detector over it
    #[clap(long)]
    dataset: bool,

    /// Print the methods' calibration parameters after scanning
    #[clap(long, conflicts_with = "dataset")]
    calibrate: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, clap::ValueEnum)]
enum Format {
    /// Decide by file extension
    Auto,
    Pcap,
    Log,
}

impl Format {
    fn resolve(self, input: &Path) -> Format {
        if self != Format::Auto {
            return self;
        }
        match input.extension().and_then(|e| e.to_str()) {
            Some("pcap" | "cap") => Format::Pcap,
            _ => Format::Log,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DatasetEntry {
    filename: String,
    label: String,
}

fn main() -> eyre::Result<()> {
    let use_color = std::io::stderr().is_terminal();
    if use_color {
        color_eyre::install()?;
    }

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(args.log_level.into())
        .with_env_var("SPOOF_LOG")
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(use_color)
        .with_writer(std::io::stderr)
        .init();

    let config = config::load_config(&args.config)?;

    if args.dataset {
        return score_dataset(&config, &args);
    }

    let alerts = scan_capture(&config, &args.input, &args, false)?;
    tracing::info!("{alerts} alerts over {:?}", args.input);
    Ok(())
}

/// Run one capture through a fresh detector; returns the alert count
fn scan_capture(
    config: &Config,
    input: &Path,
    args: &Args,
    quiet: bool,
) -> eyre::Result<usize> {
    let methods = build_methods(config)?;
    let alerts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&alerts);
    let mut detector = Detector::new(
        config.device_ids.iter().cloned(),
        methods,
        args.threshold,
        Box::new(move |alert| {
            counter.fetch_add(1, Ordering::Relaxed);
            if !quiet {
                print_alert(&alert);
            }
        }),
    );

    match args.format.resolve(input) {
        Format::Pcap => PcapSource::new(input).run(&mut detector)?,
        Format::Log | Format::Auto => LogSource::new(input).run(&mut detector)?,
    }

    if args.calibrate {
        let parameters = detector.calibration_parameters();
        println!("{}", serde_json::to_string_pretty(&parameters)?);
    }
    Ok(alerts.load(Ordering::Relaxed))
}

fn print_alert(alert: &Alert<'_>) {
    let time = alert
        .state
        .update_time
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    let sentence = alert.state.last_sentence.as_deref().unwrap_or_default();
    println!(
        "{time} {} {} {:.3} {sentence}",
        alert.device_id, alert.method, alert.spoofing_indicator
    );
}

/// Score the detector over a labelled dataset index
fn score_dataset(config: &Config, args: &Args) -> eyre::Result<()> {
    let text = std::fs::read_to_string(&args.input)?;
    let entries: Vec<DatasetEntry> = serde_json::from_str(&text)?;
    let base = args.input.parent().unwrap_or_else(|| Path::new("."));

    let mut true_positives = 0;
    let mut false_positives = 0;
    let mut false_negatives = 0;
    for entry in &entries {
        let path = base.join(&entry.filename);
        let alerts = scan_capture(config, &path, args, true)?;
        let spoofed = alerts > 0;
        tracing::info!(
            "{:?}: {} alerts, labelled {:?}",
            entry.filename,
            alerts,
            entry.label
        );
        match (spoofed, entry.label.as_str()) {
            (true, "spoofed") => true_positives += 1,
            (true, _) => false_positives += 1,
            (false, "spoofed") => false_negatives += 1,
            (false, _) => {}
        }
    }

    let (precision, recall, f1) =
        precision_recall_f1(true_positives, false_positives, false_negatives);
    println!("precision: {}", format_score(precision));
    println!("recall: {}", format_score(recall));
    println!("f1: {}", format_score(f1));
    Ok(())
}

fn format_score(score: Option<f64>) -> String {
    match score {
        Some(value) => format!("{value:.3}"),
        None => "undefined".to_string(),
    }
}
