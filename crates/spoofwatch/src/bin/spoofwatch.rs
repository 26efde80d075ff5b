use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use spoofwatch::config;
use spoofwatch::detect::{Alert, Detector, Handler, Recorder};
use spoofwatch::method::build_methods;
use spoofwatch::source::{DEFAULT_BAUD_RATE, SerialSource, UdpSource};

/// Watch live NMEA streams for GNSS spoofing
///
/// Listens on a UDP socket and/or serial ports and prints one line per
/// alert. With --record the sentences are captured to a replayable log file
/// instead of being analyzed.
#[derive(Debug, Parser)]
#[clap(version, verbatim_doc_comment)]
struct Args {
    #[clap(short, long, default_value_t = tracing::Level::INFO)]
    log_level: tracing::Level,

    /// Path to the detector configuration (JSON)
    #[clap(short, long, required_unless_present = "record", conflicts_with = "record")]
    config: Option<PathBuf>,

    /// Listen for NMEA-over-UDP datagrams, e.g. 0.0.0.0:10110
    #[clap(short, long)]
    udp: Option<String>,

    /// Read sentences from this serial port; may be given multiple times
    #[clap(short, long)]
    serial: Vec<String>,

    /// Serial line speed
    #[clap(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud_rate: u32,

    /// Capture sentences to this log file instead of detecting
    #[clap(long)]
    record: Option<PathBuf>,

    /// Alert when a method's indicator exceeds this value
    #[clap(short, long, default_value_t = 0.1)]
    threshold: f64,
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

    if args.udp.is_none() && args.serial.is_empty() {
        eyre::bail!("Nothing to listen to; pass --udp and/or --serial");
    }

    if let Some(path) = &args.record {
        tracing::info!("Recording sentences to {path:?}");
        return run_sources(&args, Recorder::create(path)?);
    }

    let config_path = args.config.as_ref().expect("clap enforces --config without --record");
    let config = config::load_config(config_path)?;
    let methods = build_methods(&config)?;
    let detector = Detector::new(
        config.device_ids.iter().cloned(),
        methods,
        args.threshold,
        Box::new(print_alert),
    );
    run_sources(&args, detector)
}

fn print_alert(alert: Alert<'_>) {
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

/// Start every configured source against one shared handler and block
fn run_sources<H>(args: &Args, handler: H) -> eyre::Result<()>
where
    H: Handler + Send + 'static,
{
    let shared = Arc::new(Mutex::new(handler));

    let mut workers = Vec::new();
    if !args.serial.is_empty() {
        let source = SerialSource::new(args.serial.clone()).with_baud_rate(args.baud_rate);
        workers.extend(source.spawn(Arc::clone(&shared))?);
        tracing::info!("Listening on serial ports {:?}", args.serial);
    }

    if let Some(address) = &args.udp {
        tracing::info!("Listening for UDP datagrams on {address}");
        let source = UdpSource::bind(address.as_str())?;
        let mut handler = Arc::clone(&shared);
        source.run(&mut handler)?;
    }

    for worker in workers {
        if worker.join().is_err() {
            tracing::error!("A serial worker panicked");
        }
    }
    Ok(())
}
