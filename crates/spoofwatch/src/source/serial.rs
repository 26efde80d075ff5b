//! Serial-attached receivers, one worker thread per port

use std::io::{BufRead, BufReader, ErrorKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::Utc;
use eyre::WrapErr;

use crate::detect::Handler;

pub const DEFAULT_BAUD_RATE: u32 = 9600;

pub struct SerialSource {
    ports: Vec<String>,
    baud_rate: u32,
    running: Arc<AtomicBool>,
}

impl SerialSource {
    pub fn new(ports: Vec<String>) -> Self {
        Self {
            ports,
            baud_rate: DEFAULT_BAUD_RATE,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Clearing the returned flag winds down every worker
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Open every configured port and spawn one reader thread per port
    ///
    /// The handler is cloned per worker; sharing one detector across ports is
    /// a matter of passing an `Arc<Mutex<_>>`.
    pub fn spawn<H>(&self, handler: H) -> eyre::Result<Vec<JoinHandle<()>>>
    where
        H: Handler + Clone + Send + 'static,
    {
        let mut workers = Vec::with_capacity(self.ports.len());
        for port in &self.ports {
            let connection = serialport::new(port.as_str(), self.baud_rate)
                .timeout(Duration::from_millis(100))
                .open()
                .wrap_err_with(|| format!("Failed to open serial port {port:?}"))?;
            let running = Arc::clone(&self.running);
            let port = port.clone();
            let mut handler = handler.clone();
            workers.push(std::thread::spawn(move || {
                read_sentences(connection, &port, &running, &mut handler);
            }));
        }
        Ok(workers)
    }
}

fn read_sentences(
    connection: Box<dyn serialport::SerialPort>,
    port: &str,
    running: &AtomicBool,
    handler: &mut impl Handler,
) {
    let mut reader = BufReader::new(connection);
    let mut buffer = Vec::new();
    while running.load(Ordering::Relaxed) {
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => continue,
            Ok(_) if buffer.ends_with(b"\n") => {
                // Decode errors are dropped, trailing whitespace stripped
                let sentence = String::from_utf8_lossy(&buffer);
                let sentence = sentence.trim_end();
                if !sentence.is_empty() {
                    handler.handle(port, Utc::now(), sentence);
                }
                buffer.clear();
            }
            // Partial line, keep accumulating
            Ok(_) => continue,
            Err(error)
                if matches!(
                    error.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(error) => {
                tracing::error!("Serial port {port:?} failed: {error}");
                break;
            }
        }
    }
}
